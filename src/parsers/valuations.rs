use super::columns::{cell, ValuationColumns, CURRENT_VALUATION_COLUMNS};
use super::{data_rows, parse_money, parse_year};
use crate::types::Valuation;
use std::collections::HashSet;
use tracing::debug;

pub fn parse_valuations(html: &str) -> Vec<Valuation> {
    parse_valuations_with(html, &CURRENT_VALUATION_COLUMNS)
}

/// Rows whose year cell is not a 4-digit year are dropped, so a shifted
/// layout yields nothing instead of misattributed values.
pub fn parse_valuations_with(html: &str, cols: &ValuationColumns) -> Vec<Valuation> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    let mut rejected = 0usize;

    for cells in data_rows(html) {
        if cells.len() < cols.min_cells {
            continue;
        }
        let Some(year) = cells.get(cols.year).and_then(|c| parse_year(c)) else {
            rejected += 1;
            continue;
        };
        if !seen.insert(year) {
            continue;
        }
        let money = |idx: Option<usize>| cell(&cells, idx).and_then(parse_money);
        let row = Valuation {
            year,
            land_value: money(cols.land),
            building_value: money(cols.building),
            total_value: money(cols.total),
            assessed_value: money(cols.assessed),
            taxable_value: money(cols.taxable),
            ad_valorem_tax: money(cols.ad_valorem_tax),
            non_ad_valorem_tax: money(cols.non_ad_valorem_tax),
            total_tax: money(cols.total_tax),
        };
        out.push(row);
    }

    if rejected > 0 {
        debug!(
            "valuations ({}): {} rows without a year cell skipped",
            cols.version, rejected
        );
    }
    out.sort_by(|a, b| b.year.cmp(&a.year));
    out
}
