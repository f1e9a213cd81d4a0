//! Lead identity and primary-contact selection.

use sha2::{Digest, Sha256};

/// Titles in decreasing order of preference for the primary contact.
pub const TITLE_PRIORITY: &[&str] = &[
    "Managing Partner",
    "Founder",
    "Owner",
    "Principal",
    "Partner",
    "Attorney",
    "Practice Manager",
    "Office Manager",
    "Intake Coordinator",
];

/// SHA-256 hex digest of the lower-cased, trimmed `name|address|phone` tuple.
///
/// Used as the dedup fallback when a lead has no external place id. Two
/// businesses that share all three fields are treated as the same lead.
#[must_use]
pub fn identity_hash(name: &str, address: Option<&str>, phone: Option<&str>) -> String {
    let key = [name, address.unwrap_or(""), phone.unwrap_or("")]
        .iter()
        .map(|part| part.trim().to_lowercase())
        .collect::<Vec<_>>()
        .join("|");

    format!("{:x}", Sha256::digest(key.as_bytes()))
}

/// Position of `title` in [`TITLE_PRIORITY`]; unknown or absent titles rank last.
#[must_use]
pub fn title_rank(title: Option<&str>) -> usize {
    let Some(title) = title.map(str::trim).filter(|t| !t.is_empty()) else {
        return TITLE_PRIORITY.len();
    };
    TITLE_PRIORITY
        .iter()
        .position(|known| known.eq_ignore_ascii_case(title))
        .unwrap_or(TITLE_PRIORITY.len())
}

/// Pick the contact with the best-ranked title.
///
/// Ties keep discovery order, so the first contact seen wins among equals.
pub fn choose_primary_contact<'a, T, F>(contacts: &'a [T], title_of: F) -> Option<&'a T>
where
    F: Fn(&T) -> Option<&str>,
{
    // min_by_key returns the first of several equal minima.
    contacts.iter().min_by_key(|c| title_rank(title_of(c)))
}
