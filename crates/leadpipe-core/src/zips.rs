//! US state codes and the state → ZIP grouping that fills zip-sweep plans
//! given only a state.

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

pub const US_STATE_CODES: [&str; 50] = [
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "FL", "GA", "HI", "ID", "IL", "IN", "IA", "KS",
    "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH", "NJ", "NM", "NY",
    "NC", "ND", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT", "VT", "VA", "WA", "WV",
    "WI", "WY",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("state must be a 2-letter US code, got '{0}'")]
pub struct InvalidStateCode(pub String);

/// Trims and uppercases `raw`, accepting only the 50 state codes.
///
/// # Errors
///
/// Returns [`InvalidStateCode`] for anything else.
pub fn parse_state_code(raw: &str) -> Result<&'static str, InvalidStateCode> {
    let wanted = raw.trim().to_ascii_uppercase();
    US_STATE_CODES
        .iter()
        .copied()
        .find(|code| *code == wanted)
        .ok_or_else(|| InvalidStateCode(raw.trim().to_string()))
}

fn is_five_digit_zip(zip: &str) -> bool {
    zip.len() == 5 && zip.bytes().all(|b| b.is_ascii_digit())
}

/// Groups `(zip, state)` pairs by state.
///
/// Only five-digit ZIPs in a known state survive. Each state's list is
/// sorted and free of duplicates.
pub fn group_zips_by_state<'a, I>(records: I) -> BTreeMap<&'static str, Vec<String>>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut by_state: BTreeMap<&'static str, BTreeSet<String>> = BTreeMap::new();
    for (zip, state) in records {
        let zip = zip.trim();
        if !is_five_digit_zip(zip) {
            continue;
        }
        let Ok(state) = parse_state_code(state) else {
            continue;
        };
        by_state.entry(state).or_default().insert(zip.to_string());
    }

    by_state
        .into_iter()
        .map(|(state, zips)| (state, zips.into_iter().collect()))
        .collect()
}
