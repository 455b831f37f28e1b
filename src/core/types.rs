use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct LookupRequest {
    pub address: String,
}

/// Response returned for every lookup that did not fail outright.
///
/// `detail_url == None` means "no confident match". Callers must not treat
/// that as a transient failure.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LookupResponse {
    pub detail_url: Option<String>,
    pub record: PropertyRecord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_found_reason: Option<String>,
    pub debug: DebugTrace,
}

impl LookupResponse {
    pub fn found(&self) -> bool {
        self.detail_url.is_some()
    }
}

// ───────────────────────────────────────────────────────────────────────────
// Property record
// ───────────────────────────────────────────────────────────────────────────

/// Typed property record assembled from one or more extraction passes.
///
/// The summary scalars (`year_built` through `tax_amount`) are derived from
/// the nested groups by [`crate::features::merge::derive_summary`]; the
/// nested groups are the authoritative data. Every group is optional and
/// `None` means "not observed".
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PropertyRecord {
    pub parcel_id: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub owner_name: Option<String>,
    pub owner_type: Option<String>,
    pub property_type: Option<String>,

    pub year_built: Option<i32>,
    pub bedrooms: Option<u32>,
    pub bathrooms: Option<f32>,
    pub living_area_sqft: Option<u32>,
    pub lot_size_sqft: Option<f64>,
    pub assessed_value: Option<f64>,
    pub market_value: Option<f64>,
    pub last_sale_price: Option<f64>,
    pub last_sale_date: Option<NaiveDate>,
    pub tax_amount: Option<f64>,

    pub basic_info: Option<BasicInfo>,
    pub building: Option<BuildingInfo>,
    pub land: Option<LandInfo>,
    pub valuations: Option<Vec<Valuation>>,
    pub sales_history: Option<Vec<Sale>>,
    pub community: Option<CommunityInfo>,
    pub listing_metrics: Option<ListingMetrics>,
    pub extras: Option<Extras>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BasicInfo {
    pub situs_address: Option<String>,
    pub mailing_address: Option<String>,
    pub jurisdiction: Option<String>,
    pub tax_district: Option<String>,
    pub subdivision: Option<String>,
    pub neighborhood: Option<String>,
    pub legal_description: Option<String>,
    pub land_use: Option<String>,
    pub section_township_range: Option<String>,
    pub homestead: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BuildingInfo {
    pub building_type: Option<String>,
    pub year_built: Option<i32>,
    pub effective_year_built: Option<i32>,
    pub living_area_sqft: Option<u32>,
    pub gross_area_sqft: Option<u32>,
    pub stories: Option<f32>,
    pub units: Option<u32>,
    pub bedrooms: Option<u32>,
    pub full_baths: Option<u32>,
    pub half_baths: Option<u32>,
    pub construction: Option<String>,
    pub exterior: Option<String>,
    pub roof: Option<String>,
    pub heating: Option<String>,
    pub cooling: Option<String>,
    pub quality: Option<String>,
    pub pool: Option<bool>,
    pub fireplace: Option<bool>,
}

impl BuildingInfo {
    /// Full baths count as one, half baths as one half.
    pub fn bathrooms(&self) -> Option<f32> {
        match (self.full_baths, self.half_baths) {
            (None, None) => None,
            (full, half) => {
                Some(full.unwrap_or(0) as f32 + 0.5 * half.unwrap_or(0) as f32)
            }
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LandInfo {
    pub lot_size_sqft: Option<f64>,
    pub acreage: Option<f64>,
    pub land_use_code: Option<String>,
    pub land_use_description: Option<String>,
    pub road_type: Option<String>,
    pub frontage_ft: Option<f64>,
    pub depth_ft: Option<f64>,
    pub zoning: Option<String>,
}

/// One tax-roll year. Unique per `year` within a record.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Valuation {
    pub year: i32,
    pub land_value: Option<f64>,
    pub building_value: Option<f64>,
    pub total_value: Option<f64>,
    pub assessed_value: Option<f64>,
    pub taxable_value: Option<f64>,
    pub ad_valorem_tax: Option<f64>,
    pub non_ad_valorem_tax: Option<f64>,
    pub total_tax: Option<f64>,
}

impl Valuation {
    /// Best available tax figure for the year.
    pub fn tax_amount(&self) -> Option<f64> {
        self.total_tax.or(match (self.ad_valorem_tax, self.non_ad_valorem_tax) {
            (None, None) => None,
            (a, b) => Some(a.unwrap_or(0.0) + b.unwrap_or(0.0)),
        })
    }
}

/// One recorded transfer. Unique per date within a record.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Sale {
    pub date: Option<NaiveDate>,
    pub book_page: Option<String>,
    pub instrument_type: Option<String>,
    pub vacant_or_improved: Option<String>,
    pub qualification_code: Option<String>,
    pub price: Option<f64>,
    pub grantee: Option<String>,
}

impl Sale {
    /// Natural key used for de-duplication: the sale date, or the recording
    /// reference for undated rows.
    pub fn natural_key(&self) -> Option<String> {
        self.date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .or_else(|| self.book_page.as_ref().map(|b| format!("ref:{}", b)))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CommunityInfo {
    pub community_name: Option<String>,
    pub hoa_name: Option<String>,
    pub hoa_fee: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ListingMetrics {
    pub price_per_sqft: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Extras {
    pub features: Vec<ExtraFeature>,
    pub feature_tags: Vec<String>,
    pub inspections: Vec<Inspection>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExtraFeature {
    pub description: String,
    pub year_built: Option<i32>,
    pub units: Option<String>,
    pub value: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Inspection {
    pub date: Option<NaiveDate>,
    pub inspection_type: Option<String>,
    pub result: Option<String>,
    pub notes: Option<String>,
}

// ───────────────────────────────────────────────────────────────────────────
// Debug trace
// ───────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    Owner,
    Valuations,
    Sales,
    Building,
    Land,
    Features,
    Inspections,
}

impl Section {
    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Owner => "owner",
            Section::Valuations => "valuations",
            Section::Sales => "sales",
            Section::Building => "building",
            Section::Land => "land",
            Section::Features => "features",
            Section::Inspections => "inspections",
        }
    }
}

/// How the detail page was reached.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MatchPath {
    DirectRedirect,
    ResultsList,
    Fallback,
    None,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TraceStep {
    pub step: String,
    pub detail: String,
    pub elapsed_ms: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SectionTrace {
    pub section: Section,
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub html_chars: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DebugTrace {
    pub request_id: String,
    pub input_address: String,
    pub normalized_address: String,
    pub normalization_changes: Vec<String>,
    pub match_path: MatchPath,
    pub match_confirmed: bool,
    pub fallback_attempted: bool,
    pub steps: Vec<TraceStep>,
    pub sections: Vec<SectionTrace>,
    pub warnings: Vec<String>,
    pub total_duration_ms: u64,
}

impl DebugTrace {
    pub fn new(input_address: &str) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            input_address: input_address.to_string(),
            normalized_address: String::new(),
            normalization_changes: Vec::new(),
            match_path: MatchPath::None,
            match_confirmed: false,
            fallback_attempted: false,
            steps: Vec::new(),
            sections: Vec::new(),
            warnings: Vec::new(),
            total_duration_ms: 0,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub transient: bool,
}
