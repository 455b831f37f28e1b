//! Address canonicalization.
//!
//! The appraiser's search form and its result rows use USPS-style short
//! tokens ("TER", "SW", "STE"). Free-text input is mapped onto that form
//! before searching and before any comparison against page text.

use serde::{Deserialize, Serialize};

const STREET_SUFFIXES: &[(&str, &str)] = &[
    ("Alley", "Aly"),
    ("Avenue", "Ave"),
    ("Boulevard", "Blvd"),
    ("Circle", "Cir"),
    ("Court", "Ct"),
    ("Cove", "Cv"),
    ("Crossing", "Xing"),
    ("Drive", "Dr"),
    ("Expressway", "Expy"),
    ("Highway", "Hwy"),
    ("Lane", "Ln"),
    ("Parkway", "Pkwy"),
    ("Place", "Pl"),
    ("Plaza", "Plz"),
    ("Point", "Pt"),
    ("Road", "Rd"),
    ("Square", "Sq"),
    ("Street", "St"),
    ("Terrace", "Ter"),
    ("Trail", "Trl"),
    ("Way", "Way"),
    ("Loop", "Loop"),
    ("Run", "Run"),
];

const DIRECTIONALS: &[(&str, &str)] = &[
    ("North", "N"),
    ("South", "S"),
    ("East", "E"),
    ("West", "W"),
    ("Northeast", "NE"),
    ("Northwest", "NW"),
    ("Southeast", "SE"),
    ("Southwest", "SW"),
];

const UNIT_DESIGNATORS: &[(&str, &str)] = &[
    ("Apartment", "Apt"),
    ("Building", "Bldg"),
    ("Floor", "Fl"),
    ("Room", "Rm"),
    ("Suite", "Ste"),
    ("Unit", "Unit"),
    ("Lot", "Lot"),
];

/// Which token map a canonical token came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Suffix,
    Directional,
    Unit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct NormalizedAddress {
    /// Street line in the site's token form, e.g. `4659 56th Ter E`.
    pub street: String,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    /// `street, city, ST zip` with absent parts omitted.
    pub full: String,
    /// Human-readable log of every token rewrite, e.g. `Terrace→Ter`.
    pub changes: Vec<String>,
}

fn lookup(map: &'static [(&'static str, &'static str)], token: &str) -> Option<&'static str> {
    map.iter()
        .find(|(long, short)| long.eq_ignore_ascii_case(token) || short.eq_ignore_ascii_case(token))
        .map(|(_, short)| *short)
}

/// Canonical short form of `token` if it belongs to one of the maps.
/// Matching is case-insensitive and accepts either the long or short form.
pub fn canonical_token(token: &str, allow_suffix: bool) -> Option<(&'static str, TokenKind)> {
    if let Some(short) = lookup(DIRECTIONALS, token) {
        return Some((short, TokenKind::Directional));
    }
    if allow_suffix {
        if let Some(short) = lookup(STREET_SUFFIXES, token) {
            return Some((short, TokenKind::Suffix));
        }
    }
    lookup(UNIT_DESIGNATORS, token).map(|short| (short, TokenKind::Unit))
}

pub fn is_house_number(token: &str) -> bool {
    let mut chars = token.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_digit())
        && token.chars().filter(|c| c.is_ascii_alphabetic()).count() <= 1
        && !is_ordinal(token)
}

/// `56th`, `1st`, `2nd`, `3rd`.
pub fn is_ordinal(token: &str) -> bool {
    let lower = token.to_ascii_lowercase();
    let digits = lower.trim_end_matches(|c: char| c.is_ascii_alphabetic());
    let tail = &lower[digits.len()..];
    !digits.is_empty()
        && digits.chars().all(|c| c.is_ascii_digit())
        && matches!(tail, "st" | "nd" | "rd" | "th")
}

fn clean_token(token: &str) -> &str {
    token.trim_matches(|c: char| c == '.' || c == ',' || c == ';')
}

/// Normalize the street line token-by-token.
///
/// The leading house number is never matched against the suffix map.
pub fn normalize_street(street: &str) -> (String, Vec<String>) {
    let mut out = Vec::new();
    let mut changes = Vec::new();

    for (i, raw) in street.split_whitespace().enumerate() {
        let token = clean_token(raw);
        if token.is_empty() {
            continue;
        }
        let leading_number = i == 0 && is_house_number(token);
        let canonical = if leading_number {
            None
        } else {
            canonical_token(token, true).map(|(short, _)| short)
        };
        match canonical {
            Some(short) if short != token => {
                changes.push(format!("{}→{}", token, short));
                out.push(short.to_string());
            }
            Some(short) => out.push(short.to_string()),
            None => out.push(token.to_string()),
        }
    }

    (out.join(" "), changes)
}

fn is_zip(token: &str) -> bool {
    let (head, tail) = token.split_once('-').unwrap_or((token, ""));
    head.len() == 5
        && head.chars().all(|c| c.is_ascii_digit())
        && (tail.is_empty() || (tail.len() == 4 && tail.chars().all(|c| c.is_ascii_digit())))
}

fn is_state_code(token: &str) -> bool {
    token.len() == 2 && token.chars().all(|c| c.is_ascii_alphabetic())
}

/// `Bradenton FL 34208` → city plus the trailing state and zip.
fn split_city_state_zip(segment: &str) -> (String, Option<String>, Option<String>) {
    let mut tokens: Vec<&str> = segment.split_whitespace().collect();
    let mut state = None;
    let mut zip = None;
    if tokens.len() > 1 && is_zip(tokens[tokens.len() - 1]) {
        zip = tokens.pop().map(str::to_string);
        if tokens.len() > 1 && is_state_code(tokens[tokens.len() - 1]) {
            state = tokens.pop().map(str::to_ascii_uppercase);
        }
    }
    (tokens.join(" "), state, zip)
}

/// `FL 34208`, `FL`, or `34208`.
fn parse_state_zip(segment: &str) -> Option<(Option<String>, Option<String>)> {
    let tokens: Vec<&str> = segment.split_whitespace().collect();
    match tokens.as_slice() {
        [s] if is_state_code(s) => Some((Some(s.to_ascii_uppercase()), None)),
        [z] if is_zip(z) => Some((None, Some(z.to_string()))),
        [s, z] if is_state_code(s) && is_zip(z) => {
            Some((Some(s.to_ascii_uppercase()), Some(z.to_string())))
        }
        _ => None,
    }
}

fn starts_with_unit(segment: &str) -> bool {
    segment.starts_with('#')
        || segment
            .split_whitespace()
            .next()
            .and_then(|t| lookup(UNIT_DESIGNATORS, clean_token(t)))
            .is_some()
}

fn collapse_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse and canonicalize a free-text address.
///
/// Segments are comma separated (`street, city, ST zip`); any of them may be
/// missing. Without commas a trailing `ST zip` pair is peeled off the street.
/// Normalizing an already-normalized address is a no-op.
pub fn normalize_address(raw: &str) -> NormalizedAddress {
    let segments: Vec<String> = raw
        .split(',')
        .map(collapse_ws)
        .filter(|s| !s.is_empty())
        .collect();

    let Some((first, rest)) = segments.split_first() else {
        return NormalizedAddress::default();
    };

    let mut street_raw = first.clone();
    let mut city: Option<String> = None;
    let mut state: Option<String> = None;
    let mut zip: Option<String> = None;

    if rest.is_empty() {
        let mut tokens: Vec<&str> = first.split_whitespace().collect();
        if tokens.len() > 2 && is_zip(tokens[tokens.len() - 1]) {
            zip = tokens.pop().map(str::to_string);
            if tokens.len() > 2 && is_state_code(tokens[tokens.len() - 1]) {
                state = tokens.pop().map(str::to_ascii_uppercase);
            }
            street_raw = tokens.join(" ");
        }
    }

    for segment in rest {
        if let Some((s, z)) = parse_state_zip(segment) {
            state = state.or(s);
            zip = zip.or(z);
        } else if city.is_none() && starts_with_unit(segment) {
            street_raw = format!("{} {}", street_raw, segment);
        } else if city.is_none() {
            let (name, s, z) = split_city_state_zip(segment);
            state = state.or(s);
            zip = zip.or(z);
            city = Some(name);
        }
        // extra segments such as a country name are dropped
    }

    let (street, changes) = normalize_street(&street_raw);

    let state_zip = match (&state, &zip) {
        (Some(s), Some(z)) => Some(format!("{} {}", s, z)),
        (Some(s), None) => Some(s.clone()),
        (None, Some(z)) => Some(z.clone()),
        (None, None) => None,
    };
    let full = [Some(street.clone()), city.clone(), state_zip]
        .into_iter()
        .flatten()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(", ");

    NormalizedAddress {
        street,
        city,
        state,
        zip,
        full,
        changes,
    }
}
