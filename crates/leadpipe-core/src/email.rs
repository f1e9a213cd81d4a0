//! Email candidate generation for the verification stage.

pub const MAX_EMAIL_CANDIDATES: usize = 6;

/// Extract the bare host of a website URL, lower-cased with `www.` removed.
///
/// Returns `None` for blank input or input without a plausible host.
#[must_use]
pub fn website_domain(website: &str) -> Option<String> {
    let trimmed = website.trim();
    let without_scheme = trimmed
        .split_once("://")
        .map_or(trimmed, |(_, rest)| rest);
    let host = without_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default();
    // Drop userinfo and port.
    let host = host.rsplit('@').next().unwrap_or_default();
    let host = host.split(':').next().unwrap_or_default().to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);

    if host.is_empty() || !host.contains('.') {
        return None;
    }
    Some(host.to_string())
}

/// Split a display name into `(first, last)`.
///
/// Middle names are ignored; a single-word name has no last name.
#[must_use]
pub fn split_full_name(full_name: &str) -> (Option<String>, Option<String>) {
    let parts: Vec<&str> = full_name.split_whitespace().collect();
    match parts.as_slice() {
        [] => (None, None),
        [only] => (Some((*only).to_string()), None),
        [first, .., last] => (Some((*first).to_string()), Some((*last).to_string())),
    }
}

fn local_part(name: &str) -> String {
    name.chars()
        .filter(char::is_ascii_alphanumeric)
        .collect::<String>()
        .to_ascii_lowercase()
}

/// Ordered, de-duplicated addresses to try for one contact.
///
/// The stored address (if any) always comes first. When `generate` is set
/// and both a name and a domain are known, the common patterns
/// `first.last`, `firstlast`, `flast` and `first` follow. At most
/// [`MAX_EMAIL_CANDIDATES`] are returned.
#[must_use]
pub fn build_email_candidates(
    stored: Option<&str>,
    first_name: Option<&str>,
    last_name: Option<&str>,
    domain: Option<&str>,
    generate: bool,
) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut push = |email: String| {
        if !email.is_empty() && !out.contains(&email) {
            out.push(email);
        }
    };

    if let Some(stored) = stored.map(str::trim).filter(|s| s.contains('@')) {
        push(stored.to_lowercase());
    }

    if generate {
        let first = first_name.map(local_part).filter(|s| !s.is_empty());
        let last = last_name.map(local_part).filter(|s| !s.is_empty());
        if let (Some(first), Some(domain)) = (first, domain) {
            if let Some(last) = last {
                let initial = &first[..1];
                push(format!("{first}.{last}@{domain}"));
                push(format!("{first}{last}@{domain}"));
                push(format!("{initial}{last}@{domain}"));
            }
            push(format!("{first}@{domain}"));
        }
    }

    out.truncate(MAX_EMAIL_CANDIDATES);
    out
}
