//! Search-results page: row extraction and page classification.

use super::{element_text, ResultRow};
use crate::scraping::selectors::SiteProfile;
use scraper::{Html, Selector};
use url::Url;

/// What the search submission landed on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageKind {
    /// The site skipped the list because exactly one parcel matched.
    DirectDetail { parcel_id: String },
    Results(Vec<ResultRow>),
    NoResults,
    Unrecognized,
}

pub fn parse_result_rows(html: &str, page_url: &str, site: &SiteProfile) -> Vec<ResultRow> {
    let doc = Html::parse_document(html);
    let (Ok(row_sel), Ok(link_sel)) = (
        Selector::parse(&site.results_rows),
        Selector::parse("a[href]"),
    ) else {
        return Vec::new();
    };
    let base = Url::parse(page_url).ok();

    doc.select(&row_sel)
        .filter_map(|row| {
            let row_text = element_text(&row);
            if row_text.is_empty() {
                return None;
            }
            let href = row
                .select(&link_sel)
                .filter_map(|a| a.value().attr("href"))
                .find(|h| !h.starts_with('#') && !h.starts_with("javascript:"))
                .map(|h| match base.as_ref().and_then(|b| b.join(h).ok()) {
                    Some(abs) => abs.to_string(),
                    None => h.to_string(),
                });
            let parcel_id = href
                .as_deref()
                .and_then(|h| site.parcel_from_url(h))
                .or_else(|| {
                    site.parcel_pattern
                        .find(&row_text)
                        .map(|m| m.as_str().to_string())
                });
            Some(ResultRow {
                row_text,
                parcel_id,
                href,
            })
        })
        .collect()
}

/// Classify the page reached after submitting the search form.
pub fn classify_page(url: &str, html: &str, site: &SiteProfile) -> PageKind {
    if let Some(parcel_id) = site.parcel_from_url(url) {
        return PageKind::DirectDetail { parcel_id };
    }

    let rows = parse_result_rows(html, url, site);
    if !rows.is_empty() {
        return PageKind::Results(rows);
    }

    if site.says_no_results(html) {
        return PageKind::NoResults;
    }

    PageKind::Unrecognized
}
