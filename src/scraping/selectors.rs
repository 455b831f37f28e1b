//! Target-site coupling.
//!
//! Every form field id, button selector, tab id, table id and URL parameter
//! the driver relies on lives in [`SiteProfile`]. When the appraiser's site
//! changes its markup, this is the only table that needs editing.

use crate::types::Section;
use regex::Regex;
use std::sync::LazyLock;
use url::Url;

/// How one data section is revealed and read on the detail page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionSpec {
    pub section: Section,
    /// Tab control to click. `None` for sections rendered without a tab.
    pub tab: Option<String>,
    /// Container whose outer HTML is handed to the section parser.
    pub content: String,
    /// Present once the asynchronous table load has finished.
    pub populated: String,
}

impl SectionSpec {
    fn tabbed(section: Section, tab: &str, content: &str) -> Self {
        Self {
            section,
            tab: Some(tab.to_string()),
            content: content.to_string(),
            populated: format!("{} td", content),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SiteProfile {
    pub name: String,
    pub layout_version: String,
    pub base_url: String,
    /// Registrable domain used to scope semantic-index queries.
    pub domain: String,
    pub search_path: String,
    pub detail_path: String,

    pub owner_field: String,
    pub parcel_field: String,
    pub address_field: String,
    pub zip_field: Option<String>,
    /// The form rejects empty owner / parcel fields.
    pub wildcard: String,
    pub submit: String,

    /// Query parameter carrying the parcel id on a detail URL.
    pub parcel_param: String,
    pub parcel_pattern: Regex,
    pub results_rows: String,
    pub no_results_phrases: Vec<String>,

    pub sections: Vec<SectionSpec>,
    /// Class the site puts on the selected tab.
    pub active_tab_class: String,
}

impl SiteProfile {
    /// Manatee County Property Appraiser, tabbed detail layout.
    pub fn manatee() -> Self {
        Self {
            name: "manatee-pao".to_string(),
            layout_version: "tabs-2024".to_string(),
            base_url: "https://www.manateepao.gov".to_string(),
            domain: "manateepao.gov".to_string(),
            search_path: "/search/".to_string(),
            detail_path: "/parcel/".to_string(),
            owner_field: "#OwnerName".to_string(),
            parcel_field: "#ParcelId".to_string(),
            address_field: "#Address".to_string(),
            zip_field: Some("#Zip".to_string()),
            wildcard: "*".to_string(),
            submit: "#btnSearch".to_string(),
            parcel_param: "parid".to_string(),
            parcel_pattern: default_parcel_pattern(),
            results_rows: "#resultsTable tbody tr".to_string(),
            no_results_phrases: vec![
                "no records found".to_string(),
                "no results".to_string(),
                "did not return any".to_string(),
                "0 records".to_string(),
            ],
            sections: vec![
                SectionSpec {
                    section: Section::Owner,
                    tab: None,
                    content: "#ownerContent".to_string(),
                    populated: "#ownerContent".to_string(),
                },
                SectionSpec::tabbed(Section::Valuations, "#valuesTab", "#tableValue"),
                SectionSpec::tabbed(Section::Sales, "#salesTab", "#tableSales"),
                SectionSpec::tabbed(Section::Building, "#buildingsTab", "#tableBuildings"),
                SectionSpec::tabbed(Section::Land, "#landTab", "#tableLand"),
                SectionSpec::tabbed(Section::Features, "#featuresTab", "#tableFeatures"),
                SectionSpec::tabbed(Section::Inspections, "#inspectionsTab", "#tableInspections"),
            ],
            active_tab_class: "active".to_string(),
        }
    }

    /// Same selectors against another origin (staging mirror, local fixture).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        if let Some(host) = Url::parse(&self.base_url).ok().and_then(|u| u.host_str().map(String::from)) {
            self.domain = host.trim_start_matches("www.").to_string();
        }
        self
    }

    pub fn search_url(&self) -> String {
        format!("{}{}", self.base_url, self.search_path)
    }

    pub fn detail_url(&self, parcel_id: &str) -> String {
        match Url::parse(&self.base_url).and_then(|b| b.join(&self.detail_path)) {
            Ok(mut url) => {
                url.query_pairs_mut().append_pair(&self.parcel_param, parcel_id);
                url.to_string()
            }
            Err(_) => format!(
                "{}{}?{}={}",
                self.base_url, self.detail_path, self.parcel_param, parcel_id
            ),
        }
    }

    /// Parcel id from a detail URL's query string.
    pub fn parcel_from_url(&self, url: &str) -> Option<String> {
        let parsed = Url::parse(url).ok()?;
        parsed
            .query_pairs()
            .find(|(k, _)| k.eq_ignore_ascii_case(&self.parcel_param))
            .map(|(_, v)| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Whole-word match of any no-results phrase, so "0 records" does not
    /// fire on "10 records found".
    pub fn says_no_results(&self, html: &str) -> bool {
        let alternatives: Vec<String> = self
            .no_results_phrases
            .iter()
            .map(|p| regex::escape(p))
            .collect();
        if alternatives.is_empty() {
            return false;
        }
        match Regex::new(&format!(r"(?i)\b(?:{})\b", alternatives.join("|"))) {
            Ok(re) => re.is_match(html),
            Err(_) => false,
        }
    }
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self::manatee()
    }
}

// ASCII boundaries: scraped text often glues accented words to the number
static PARCEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?-u:\b)[0-9]{10}(?-u:\b)").expect("parcel pattern"));

/// Ten-digit parcel number as printed on the site.
pub fn default_parcel_pattern() -> Regex {
    PARCEL_RE.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_urls_round_trip_the_parcel() {
        let site = SiteProfile::manatee();
        let url = site.detail_url("5678901234");
        assert_eq!(url, "https://www.manateepao.gov/parcel/?parid=5678901234");
        assert_eq!(site.parcel_from_url(&url).as_deref(), Some("5678901234"));
        assert_eq!(site.parcel_from_url("https://www.manateepao.gov/search/"), None);
        assert_eq!(site.parcel_from_url("https://x.test/p?PARID=%20"), None);
    }

    #[test]
    fn base_url_override_rescopes_domain() {
        let site = SiteProfile::manatee().with_base_url("http://pao.example.test/");
        assert_eq!(site.search_url(), "http://pao.example.test/search/");
        assert_eq!(site.domain, "pao.example.test");
        let tab_of = |section: Section| {
            site.sections
                .iter()
                .find(|s| s.section == section)
                .and_then(|s| s.tab.clone())
        };
        assert!(tab_of(Section::Sales).is_some());
        assert!(tab_of(Section::Owner).is_none());
    }

    #[test]
    fn no_results_phrases_match_whole_words() {
        let site = SiteProfile::manatee();
        assert!(site.says_no_results("<p>Search returned 0 records.</p>"));
        assert!(site.says_no_results("<div>NO RESULTS</div>"));
        assert!(!site.says_no_results("<p>10 records found</p>"));
        assert!(!site.says_no_results("<p>Maintenance</p>"));
    }

    #[test]
    fn parcel_pattern_ignores_neighbouring_letters() {
        let re = default_parcel_pattern();
        assert_eq!(re.find("é5813100059ü").map(|m| m.as_str()), Some("5813100059"));
        assert!(re.find("58131000591").is_none());
        assert!(re.find("ab5813100059").is_none());
    }
}
