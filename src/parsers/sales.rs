use super::columns::{cell, SalesColumns, CURRENT_SALES_COLUMNS};
use super::{data_rows, non_empty, parse_date, parse_money};
use crate::types::Sale;
use std::collections::HashSet;

pub fn parse_sales(html: &str) -> Vec<Sale> {
    parse_sales_with(html, &CURRENT_SALES_COLUMNS)
}

/// Rows with neither a parseable date nor a price are skipped.
pub fn parse_sales_with(html: &str, cols: &SalesColumns) -> Vec<Sale> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for cells in data_rows(html) {
        if cells.len() < cols.min_cells {
            continue;
        }
        let date = cells.get(cols.date).and_then(|c| parse_date(c));
        let price = cell(&cells, cols.price).and_then(parse_money);
        if date.is_none() && price.is_none() {
            continue;
        }
        let text = |idx: Option<usize>| cell(&cells, idx).and_then(|s| non_empty(s.to_string()));
        let sale = Sale {
            date,
            book_page: text(cols.book_page),
            instrument_type: text(cols.instrument_type),
            vacant_or_improved: text(cols.vacant_or_improved),
            qualification_code: text(cols.qualification_code),
            price,
            grantee: text(cols.grantee),
        };
        if let Some(key) = sale.natural_key() {
            if !seen.insert(key) {
                continue;
            }
        }
        out.push(sale);
    }

    // newest first, undated rows last
    out.sort_by(|a, b| b.date.cmp(&a.date));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn positional_rows_sorted_by_date() {
        let html = r#"
            <table>
              <tr><th>Date</th><th>Book/Page</th><th>Instrument</th><th>V/I</th><th>Qual</th><th>Price</th><th>Grantee</th></tr>
              <tr><td>06/01/2015</td><td>2590/4411</td><td>WD</td><td>I</td><td>01</td><td>$189,900</td><td>DOE JANE</td></tr>
              <tr><td>03/15/2021</td><td>2890/1234</td><td>WD</td><td>I</td><td>01</td><td>$325,000</td><td>SMITH JOHN</td></tr>
              <tr><td></td><td></td><td></td><td></td><td></td><td></td><td>NOTE ROW</td></tr>
              <tr><td>03/15/2021</td><td>2890/1234</td><td>WD</td><td>I</td><td>01</td><td>$325,000</td><td>SMITH JOHN</td></tr>
            </table>"#;
        let sales = parse_sales(html);
        assert_eq!(sales.len(), 2);
        assert_eq!(sales[0].date, NaiveDate::from_ymd_opt(2021, 3, 15));
        assert_eq!(sales[0].price, Some(325_000.0));
        assert_eq!(sales[0].grantee.as_deref(), Some("SMITH JOHN"));
        assert_eq!(sales[1].book_page.as_deref(), Some("2590/4411"));
        assert_eq!(sales[1].instrument_type.as_deref(), Some("WD"));
    }

    #[test]
    fn price_only_rows_are_kept() {
        let html = "<table><tr><td>unknown</td><td>100/2</td><td>QC</td><td>V</td><td>11</td><td>$100</td></tr></table>";
        let sales = parse_sales(html);
        assert_eq!(sales.len(), 1);
        assert_eq!(sales[0].date, None);
        assert_eq!(sales[0].natural_key().as_deref(), Some("ref:100/2"));
    }
}
