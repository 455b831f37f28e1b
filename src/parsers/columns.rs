//! Positional column maps for the valuation and sales tables.
//!
//! The site's tables carry no reusable header text, so cells are read by
//! index. When the site re-arranges a table, add a new map here and point
//! the `CURRENT` constant at it.

/// Valuation table: one row per tax-roll year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValuationColumns {
    pub version: &'static str,
    pub year: usize,
    pub land: Option<usize>,
    pub building: Option<usize>,
    pub total: Option<usize>,
    pub assessed: Option<usize>,
    pub taxable: Option<usize>,
    pub ad_valorem_tax: Option<usize>,
    pub non_ad_valorem_tax: Option<usize>,
    pub total_tax: Option<usize>,
    /// Rows with fewer cells than this are skipped.
    pub min_cells: usize,
}

pub const VALUATION_COLUMNS_V1: ValuationColumns = ValuationColumns {
    version: "v1",
    year: 0,
    land: Some(1),
    building: Some(2),
    total: Some(3),
    assessed: Some(4),
    taxable: Some(5),
    ad_valorem_tax: Some(6),
    non_ad_valorem_tax: Some(7),
    total_tax: Some(8),
    min_cells: 4,
};

pub const CURRENT_VALUATION_COLUMNS: ValuationColumns = VALUATION_COLUMNS_V1;

/// Sales table: one row per recorded transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SalesColumns {
    pub version: &'static str,
    pub date: usize,
    pub book_page: Option<usize>,
    pub instrument_type: Option<usize>,
    pub vacant_or_improved: Option<usize>,
    pub qualification_code: Option<usize>,
    pub price: Option<usize>,
    pub grantee: Option<usize>,
    pub min_cells: usize,
}

pub const SALES_COLUMNS_V1: SalesColumns = SalesColumns {
    version: "v1",
    date: 0,
    book_page: Some(1),
    instrument_type: Some(2),
    vacant_or_improved: Some(3),
    qualification_code: Some(4),
    price: Some(5),
    grantee: Some(6),
    min_cells: 2,
};

pub const CURRENT_SALES_COLUMNS: SalesColumns = SALES_COLUMNS_V1;

/// Cell text at an optional column index; blank cells read as absent.
pub fn cell(cells: &[String], idx: Option<usize>) -> Option<&str> {
    idx.and_then(|i| cells.get(i))
        .map(String::as_str)
        .filter(|s| !s.trim().is_empty())
}
