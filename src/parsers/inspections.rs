use super::{data_rows, is_header_row, parse_date};
use crate::types::Inspection;
use regex::Regex;
use std::sync::LazyLock;

static RESULT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(pass(ed)?|fail(ed)?|approved|disapproved|denied|partial|cancell?ed|complete(d)?|open|closed|final|pending)$",
    )
    .expect("inspection result regex")
});

const HEADER_WORDS: &[&str] = &[
    "date",
    "inspection date",
    "type",
    "inspection type",
    "inspection",
    "result",
    "results",
    "status",
    "notes",
    "comments",
    "description",
    "inspector",
    "permit",
    "permit #",
];

/// Inspection rows: the first date-shaped cell is the date, a known
/// outcome word is the result, the first other text cell is the type and
/// any remaining text becomes notes.
pub fn parse_inspections(html: &str) -> Vec<Inspection> {
    let mut out = Vec::new();

    for cells in data_rows(html) {
        if is_header_row(&cells, HEADER_WORDS) {
            continue;
        }
        let mut date = None;
        let mut result = None;
        let mut inspection_type = None;
        let mut notes: Vec<String> = Vec::new();

        for cell in cells.iter().filter(|c| !c.is_empty()) {
            if date.is_none() {
                if let Some(d) = parse_date(cell) {
                    date = Some(d);
                    continue;
                }
            }
            if result.is_none() && RESULT_RE.is_match(cell) {
                result = Some(cell.to_ascii_uppercase());
                continue;
            }
            if !cell.chars().any(|c| c.is_ascii_alphabetic()) {
                continue;
            }
            if inspection_type.is_none() {
                inspection_type = Some(cell.clone());
            } else {
                notes.push(cell.clone());
            }
        }

        if date.is_none() && inspection_type.is_none() {
            continue;
        }
        out.push(Inspection {
            date,
            inspection_type,
            result,
            notes: (!notes.is_empty()).then(|| notes.join("; ")),
        });
    }

    out.sort_by(|a, b| b.date.cmp(&a.date));
    out
}
