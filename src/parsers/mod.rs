//! HTML section parsers.
//!
//! Every parser here is a total function over an HTML fragment: empty,
//! truncated or unrelated markup yields an empty result, never an error.

pub mod building;
pub mod columns;
pub mod features;
pub mod inspections;
pub mod labels;
pub mod land;
pub mod owner;
pub mod results;
pub mod sales;
pub mod valuations;

use crate::types::{Extras, PropertyRecord, Section};
use chrono::NaiveDate;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

pub use results::{classify_page, parse_result_rows, PageKind};

/// One candidate row from the search results table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRow {
    pub row_text: String,
    pub parcel_id: Option<String>,
    /// Absolute link to the row's detail page.
    pub href: Option<String>,
}

static MONEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\(?-?\$?\s*(\d{1,3}(?:,\d{3})+|\d+)(\.\d+)?\)?$").expect("money regex")
});

/// Collapse runs of whitespace (including `&nbsp;`) and trim.
pub fn clean_text(s: &str) -> String {
    s.split(|c: char| c.is_whitespace() || c == '\u{a0}')
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn element_text(el: &ElementRef<'_>) -> String {
    clean_text(&el.text().collect::<Vec<_>>().join(" "))
}

/// `$1,234.50`, `1234`, `(250.00)`. Rejects anything with letters.
pub fn parse_money(s: &str) -> Option<f64> {
    let t = clean_text(s).replace(' ', "");
    let caps = MONEY_RE.captures(&t)?;
    let whole = caps.get(1)?.as_str().replace(',', "");
    let frac = caps.get(2).map(|m| m.as_str()).unwrap_or("");
    let value: f64 = format!("{}{}", whole, frac).parse().ok()?;
    let negative = t.starts_with('(') || t.starts_with('-');
    Some(if negative { -value } else { value })
}

pub fn parse_count(s: &str) -> Option<u32> {
    let t = clean_text(s).replace(',', "");
    let digits: String = t.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// Leading decimal number, ignoring thousands separators and a trailing unit.
pub fn parse_number(s: &str) -> Option<f64> {
    let t = clean_text(s).replace(',', "");
    let num: String = t
        .trim_start_matches('$')
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if num.is_empty() || num == "." {
        return None;
    }
    num.parse().ok()
}

/// A plausible four-digit year, nothing else in the cell.
pub fn parse_year(s: &str) -> Option<i32> {
    let t = clean_text(s);
    if t.len() != 4 || !t.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let year: i32 = t.parse().ok()?;
    (1700..=2100).contains(&year).then_some(year)
}

pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let t = clean_text(s);
    let head = t.split_whitespace().next()?;
    // %Y also accepts "21", so two-digit years must take the %y formats
    let mut parts = head.split(|c| c == '/' || c == '-');
    let first = parts.next().unwrap_or_default();
    let short_year = first.len() != 4 && parts.last().is_some_and(|y| y.len() == 2);
    let formats: &[&str] = if short_year {
        &["%m/%d/%y", "%m-%d-%y"]
    } else {
        &["%m/%d/%Y", "%Y-%m-%d", "%m-%d-%Y"]
    };
    formats
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(head, fmt).ok())
}

pub fn parse_flag(s: &str) -> Option<bool> {
    let t = clean_text(s).to_ascii_lowercase();
    match t.as_str() {
        "y" | "yes" | "true" | "x" | "1" => Some(true),
        "n" | "no" | "false" | "none" | "0" => Some(false),
        _ if t.is_empty() => None,
        _ => parse_count(&t).map(|n| n > 0),
    }
}

pub fn non_empty(s: String) -> Option<String> {
    let s = clean_text(&s);
    (!s.is_empty() && s != "-" && !s.eq_ignore_ascii_case("n/a")).then_some(s)
}

/// Visible text of a page, scripts and styles excluded.
pub fn document_text(html: &str) -> String {
    let doc = Html::parse_document(html);
    let Ok(body) = Selector::parse("body") else {
        return String::new();
    };
    let root = doc.select(&body).next().unwrap_or_else(|| doc.root_element());
    let mut parts = Vec::new();
    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let in_script = node
            .parent()
            .and_then(|p| p.value().as_element().map(|e| matches!(e.name(), "script" | "style")))
            .unwrap_or(false);
        if !in_script {
            parts.push(&**text);
        }
    }
    clean_text(&parts.join(" "))
}

/// Data rows (`tr` with at least one `td`) as cleaned cell text.
pub fn data_rows(html: &str) -> Vec<Vec<String>> {
    let doc = Html::parse_fragment(html);
    let (Ok(tr), Ok(td)) = (Selector::parse("tr"), Selector::parse("td")) else {
        return Vec::new();
    };
    doc.select(&tr)
        .map(|row| row.select(&td).map(|c| element_text(&c)).collect::<Vec<_>>())
        .filter(|cells| !cells.is_empty() && cells.iter().any(|c| !c.is_empty()))
        .collect()
}

/// A `<td>` row that only repeats column names (sites that skip `<th>`).
pub fn is_header_row(cells: &[String], words: &[&str]) -> bool {
    let mut named = cells
        .iter()
        .map(|c| clean_text(c).trim_end_matches(':').trim().to_string())
        .filter(|c| !c.is_empty())
        .peekable();
    named.peek().is_some() && named.all(|c| words.iter().any(|w| w.eq_ignore_ascii_case(&c)))
}

/// Parse one revealed section into `record`. Returns whether anything was
/// found; `false` means the section is simply omitted.
pub fn apply_section(record: &mut PropertyRecord, section: Section, html: &str) -> bool {
    match section {
        Section::Owner => {
            let owner = owner::parse_owner(html);
            if owner.is_empty() {
                return false;
            }
            owner.apply(record);
            true
        }
        Section::Valuations => {
            let rows = valuations::parse_valuations(html);
            if rows.is_empty() {
                return false;
            }
            record.valuations = Some(rows);
            true
        }
        Section::Sales => {
            let rows = sales::parse_sales(html);
            if rows.is_empty() {
                return false;
            }
            record.sales_history = Some(rows);
            true
        }
        Section::Building => match building::parse_building(html) {
            Some(b) => {
                record.building = Some(b);
                true
            }
            None => false,
        },
        Section::Land => match land::parse_land(html) {
            Some(l) => {
                record.land = Some(l);
                true
            }
            None => false,
        },
        Section::Features => {
            let rows = features::parse_features(html);
            if rows.is_empty() {
                return false;
            }
            let extras = record.extras.get_or_insert_with(Extras::default);
            extras.feature_tags = features::feature_tags(&rows);
            extras.features = rows;
            true
        }
        Section::Inspections => {
            let rows = inspections::parse_inspections(html);
            if rows.is_empty() {
                return false;
            }
            record
                .extras
                .get_or_insert_with(Extras::default)
                .inspections = rows;
            true
        }
    }
}
