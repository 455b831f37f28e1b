//! Extra-features rows (pools, docks, fences, ...).
//!
//! Column order differs between parcels, so each cell is sniffed by shape
//! instead of read by position.

use super::{data_rows, is_header_row, parse_money, parse_year};
use crate::types::ExtraFeature;
use regex::Regex;
use std::sync::LazyLock;

static UNITS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\d[\d,]*(\.\d+)?\s*(sf|lf|sy|ea|ut|units?|sq\s?ft)?$").expect("units regex")
});
static DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,2}[/-]\d{1,2}[/-]\d{2,4}$").expect("date regex"));

const TAGS: &[(&str, &str)] = &[
    ("POOL", "pool"),
    ("SPA", "spa"),
    ("DOCK", "dock"),
    ("BOAT", "boat_lift"),
    ("SEAWALL", "seawall"),
    ("FENCE", "fence"),
    ("PATIO", "patio"),
    ("SCREEN", "screen_enclosure"),
    ("SHED", "shed"),
    ("CARPORT", "carport"),
    ("GARAGE", "garage"),
    ("FIREPLACE", "fireplace"),
    ("SOLAR", "solar"),
];

const HEADER_WORDS: &[&str] = &[
    "description",
    "code",
    "feature",
    "year",
    "year built",
    "yr blt",
    "units",
    "unit type",
    "qty",
    "quantity",
    "area",
    "value",
    "amount",
    "type",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellShape {
    Year,
    Currency,
    Quantity,
    Date,
    Text,
    Blank,
}

fn shape(cell: &str) -> CellShape {
    let t = cell.trim();
    if t.is_empty() || t == "-" {
        CellShape::Blank
    } else if parse_year(t).is_some() {
        CellShape::Year
    } else if t.contains('$') && parse_money(t).is_some() {
        CellShape::Currency
    } else if DATE_RE.is_match(t) {
        CellShape::Date
    } else if UNITS_RE.is_match(t) {
        CellShape::Quantity
    } else {
        CellShape::Text
    }
}

pub fn parse_features(html: &str) -> Vec<ExtraFeature> {
    let mut out = Vec::new();

    for cells in data_rows(html) {
        if is_header_row(&cells, HEADER_WORDS) {
            continue;
        }
        let shapes: Vec<CellShape> = cells.iter().map(|c| shape(c)).collect();
        let find = |want: CellShape| shapes.iter().position(|s| *s == want);

        let Some(desc_idx) = find(CellShape::Text) else {
            continue;
        };
        let description = cells[desc_idx].clone();
        if description.chars().filter(|c| c.is_ascii_alphabetic()).count() < 2 {
            continue;
        }

        let year_built = find(CellShape::Year).and_then(|i| parse_year(&cells[i]));
        let quantities: Vec<usize> = shapes
            .iter()
            .enumerate()
            .filter(|(_, s)| **s == CellShape::Quantity)
            .map(|(i, _)| i)
            .collect();

        // value: last currency cell, else the last bare number when there are two or more
        let value_idx = shapes
            .iter()
            .rposition(|s| *s == CellShape::Currency)
            .or_else(|| (quantities.len() >= 2).then(|| quantities[quantities.len() - 1]));
        let units = quantities
            .iter()
            .find(|i| Some(**i) != value_idx)
            .map(|i| cells[*i].clone());

        out.push(ExtraFeature {
            description,
            year_built,
            units,
            value: value_idx.and_then(|i| parse_money(&cells[i])),
        });
    }

    out
}

/// Normalized amenity tags, sorted and unique.
pub fn feature_tags(features: &[ExtraFeature]) -> Vec<String> {
    let mut tags: Vec<String> = features
        .iter()
        .flat_map(|f| {
            let upper = f.description.to_ascii_uppercase();
            TAGS.iter()
                .filter(move |(needle, _)| upper.contains(needle))
                .map(|(_, tag)| tag.to_string())
                .collect::<Vec<_>>()
        })
        .collect();
    tags.sort();
    tags.dedup();
    tags
}
