//! Result matching.
//!
//! A candidate (result row, detail page, search snippet) is only accepted
//! when its text contains the searched house number as a whole token AND at
//! least one street-name word. Anything else is reported as unconfirmed.

use crate::features::address::{canonical_token, is_house_number, NormalizedAddress, TokenKind};
use crate::parsers::ResultRow;
use std::collections::HashSet;
use tracing::{debug, info};

/// The parts of an address used for overlap matching.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AddressKey {
    pub street_number: Option<String>,
    /// Significant street-name words, uppercase, first one is the primary.
    pub name_words: Vec<String>,
}

/// Uppercase tokens with every map token reduced to its short form, so
/// `TERRACE` and `Ter` compare equal.
pub fn match_tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| match canonical_token(t, true) {
            Some((short, _)) => short.to_ascii_uppercase(),
            None => t.to_ascii_uppercase(),
        })
        .collect()
}

impl AddressKey {
    pub fn from_address(address: &NormalizedAddress) -> Self {
        let tokens: Vec<&str> = address.street.split_whitespace().collect();
        let mut street_number = None;
        let mut name_words = Vec::new();
        let mut suffixes = Vec::new();
        let mut after_unit = false;

        for (i, token) in tokens.iter().enumerate() {
            if i == 0 && is_house_number(token) {
                street_number = Some(token.to_ascii_uppercase());
                continue;
            }
            if token.starts_with('#') {
                after_unit = true;
                continue;
            }
            match canonical_token(token, true) {
                Some((_, TokenKind::Unit)) => {
                    after_unit = true;
                }
                Some((short, TokenKind::Suffix)) => {
                    suffixes.push(short.to_ascii_uppercase());
                }
                Some((_, TokenKind::Directional)) => {}
                None if after_unit => {}
                None => name_words.push(token.to_ascii_uppercase()),
            }
        }

        if name_words.is_empty() {
            name_words = suffixes;
        }

        Self {
            street_number,
            name_words,
        }
    }

    pub fn is_usable(&self) -> bool {
        self.street_number.is_some() && !self.name_words.is_empty()
    }

    /// True when `text` contains the house number and a street-name word.
    pub fn matches_text(&self, text: &str) -> bool {
        let Some(number) = self.street_number.as_deref() else {
            return false;
        };
        let tokens: HashSet<String> = match_tokens(text).into_iter().collect();
        tokens.contains(number) && self.name_words.iter().any(|w| tokens.contains(w))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedRow {
    pub row: ResultRow,
    /// False when no row passed the overlap test and the first row was
    /// returned as a bare candidate. Callers treat that as "not found".
    pub confirmed: bool,
}

/// Pick the result row for the searched address.
pub fn select_match(rows: &[ResultRow], address: &NormalizedAddress) -> Option<MatchedRow> {
    let key = AddressKey::from_address(address);
    debug!(
        "matching {} rows against number={:?} words={:?}",
        rows.len(),
        key.street_number,
        key.name_words
    );

    if let Some(row) = rows.iter().find(|r| key.matches_text(&r.row_text)) {
        info!("confirmed result row: {}", row.row_text);
        return Some(MatchedRow {
            row: row.clone(),
            confirmed: true,
        });
    }

    rows.first().map(|row| {
        info!("no result row matched {:?}; first row left unconfirmed", address.street);
        MatchedRow {
            row: row.clone(),
            confirmed: false,
        }
    })
}
