//! Owner / basic-info section.

use super::labels::LabelScanner;
use super::{non_empty, parse_flag, parse_money};
use crate::types::{BasicInfo, CommunityInfo, PropertyRecord};

const OWNER: &[&str] = &["owner", "owner name", "owner(s)", "owners", "owner name(s)"];
const PARCEL: &[&str] = &["parcel id", "parcel", "parcel number", "parcel no", "account", "pin"];
const SITUS: &[&str] = &[
    "situs address",
    "situs",
    "site address",
    "property address",
    "location address",
];
const MAILING: &[&str] = &["mailing address", "mailing", "owner address"];
const JURISDICTION: &[&str] = &["jurisdiction", "municipality"];
const TAX_DISTRICT: &[&str] = &["tax district", "taxing district", "district"];
const SUBDIVISION: &[&str] = &["subdivision", "subdivision name"];
const NEIGHBORHOOD: &[&str] = &["neighborhood", "neighborhood code"];
const LEGAL: &[&str] = &["legal description", "short legal", "legal"];
const LAND_USE: &[&str] = &["land use", "use code", "property use", "dor use code"];
const STR: &[&str] = &[
    "sec/twp/rge",
    "section/township/range",
    "sec-twp-rge",
    "s/t/r",
];
const HOMESTEAD: &[&str] = &["homestead", "homestead exemption"];
const COMMUNITY: &[&str] = &["community", "community name", "development"];
const HOA_NAME: &[&str] = &["hoa", "hoa name", "homeowners association"];
const HOA_FEE: &[&str] = &["hoa fee", "hoa dues", "association fee"];

/// Owner section contents before they are folded into a record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OwnerInfo {
    pub parcel_id: Option<String>,
    pub owner_name: Option<String>,
    pub owner_type: Option<String>,
    pub property_type: Option<String>,
    pub basic: Option<BasicInfo>,
    pub community: Option<CommunityInfo>,
}

impl OwnerInfo {
    pub fn is_empty(&self) -> bool {
        self.parcel_id.is_none()
            && self.owner_name.is_none()
            && self.basic.is_none()
            && self.community.is_none()
    }

    /// Fill the record's identity fields. Nothing already set is replaced.
    pub fn apply(self, record: &mut PropertyRecord) {
        record.parcel_id = record.parcel_id.take().or(self.parcel_id);
        record.owner_name = record.owner_name.take().or(self.owner_name);
        record.owner_type = record.owner_type.take().or(self.owner_type);
        record.property_type = record.property_type.take().or(self.property_type);
        record.basic_info = record.basic_info.take().or(self.basic);
        record.community = record.community.take().or(self.community);
    }
}

pub fn parse_owner(html: &str) -> OwnerInfo {
    let scan = LabelScanner::new(html);
    let get = |labels: &[&str]| scan.value(labels).and_then(non_empty);

    let basic = BasicInfo {
        situs_address: get(SITUS),
        mailing_address: get(MAILING),
        jurisdiction: get(JURISDICTION),
        tax_district: get(TAX_DISTRICT),
        subdivision: get(SUBDIVISION),
        neighborhood: get(NEIGHBORHOOD),
        legal_description: get(LEGAL),
        land_use: get(LAND_USE),
        section_township_range: get(STR),
        homestead: get(HOMESTEAD).and_then(|v| parse_flag(&v)),
    };
    let community = CommunityInfo {
        community_name: get(COMMUNITY),
        hoa_name: get(HOA_NAME),
        hoa_fee: get(HOA_FEE).and_then(|v| parse_money(&v)),
    };

    let owner_name = get(OWNER);
    let property_type = basic.land_use.as_deref().and_then(property_type_from_land_use);

    OwnerInfo {
        parcel_id: get(PARCEL).filter(|p| p.chars().any(|c| c.is_ascii_digit())),
        owner_type: owner_name.as_deref().map(|n| classify_owner(n).to_string()),
        owner_name,
        property_type,
        basic: (basic != BasicInfo::default()).then_some(basic),
        community: (community != CommunityInfo::default()).then_some(community),
    }
}

/// Corporate / Trust / Government / Individual from the owner name tokens.
pub fn classify_owner(name: &str) -> &'static str {
    let upper = name.to_ascii_uppercase();
    let tokens: Vec<&str> = upper
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();
    let has = |words: &[&str]| tokens.iter().any(|t| words.contains(t));

    if has(&["LLC", "INC", "CORP", "CORPORATION", "LP", "LLP", "LTD", "CO", "COMPANY"]) {
        "Corporate"
    } else if has(&["TRUST", "TRUSTEE", "TRUSTEES", "TR", "TRS"]) {
        "Trust"
    } else if upper.contains("COUNTY")
        || upper.contains("CITY OF")
        || upper.contains("STATE OF")
        || upper.contains("SCHOOL BOARD")
        || has(&["USA"])
    {
        "Government"
    } else {
        "Individual"
    }
}

/// Coarse property type from a land-use description such as
/// `0100 - SINGLE FAMILY RESIDENTIAL`.
pub fn property_type_from_land_use(land_use: &str) -> Option<String> {
    let upper = land_use.to_ascii_uppercase();
    let kinds: &[(&[&str], &str)] = &[
        (&["CONDO"], "Condominium"),
        (&["MOBILE", "MANUFACTURED"], "Mobile Home"),
        (&["SINGLE FAMILY"], "Single Family"),
        (&["DUPLEX", "TRIPLEX", "MULTI", "APARTMENT"], "Multi-Family"),
        (&["VACANT"], "Vacant Land"),
        (&["COMMERCIAL", "OFFICE", "RETAIL", "STORE", "RESTAURANT"], "Commercial"),
        (&["INDUSTRIAL", "WAREHOUSE", "MANUFACTURING"], "Industrial"),
        (&["AGRIC", "PASTURE", "GROVE", "TIMBER", "CROPLAND"], "Agricultural"),
    ];
    if let Some((_, kind)) = kinds
        .iter()
        .find(|(words, _)| words.iter().any(|w| upper.contains(w)))
    {
        return Some(kind.to_string());
    }

    let desc = land_use
        .split_once(" - ")
        .map(|(_, d)| d)
        .unwrap_or(land_use)
        .trim();
    (!desc.is_empty()).then(|| desc.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER_HTML: &str = r#"
        <div id="ownerContent">
          <div class="row"><div><strong>Ownership:</strong></div><div>SMITH JOHN A TRUSTEE</div></div>
          <table>
            <tr><th>Parcel ID</th><td>5678901234</td></tr>
            <tr><th>Situs Address</th><td>4659 56TH TER E</td></tr>
            <tr><th>Mailing Address</th><td>PO BOX 12, BRADENTON FL 34206</td></tr>
            <tr><th>Jurisdiction</th><td>UNINCORPORATED</td></tr>
            <tr><th>Land Use</th><td>0100 - SINGLE FAMILY RESIDENTIAL</td></tr>
            <tr><th>Homestead</th><td>Yes</td></tr>
            <tr><th>Subdivision</th><td>MEADOW LAKES</td></tr>
            <tr><th>HOA Fee</th><td>$450.00</td></tr>
          </table>
          <p>Owner: SMITH JOHN A TRUSTEE</p>
        </div>"#;

    #[test]
    fn parses_owner_block() {
        let info = parse_owner(OWNER_HTML);
        assert_eq!(info.parcel_id.as_deref(), Some("5678901234"));
        assert_eq!(info.owner_name.as_deref(), Some("SMITH JOHN A TRUSTEE"));
        assert_eq!(info.owner_type.as_deref(), Some("Trust"));
        assert_eq!(info.property_type.as_deref(), Some("Single Family"));
        let basic = info.basic.as_ref().unwrap();
        assert_eq!(basic.situs_address.as_deref(), Some("4659 56TH TER E"));
        assert_eq!(basic.jurisdiction.as_deref(), Some("UNINCORPORATED"));
        assert_eq!(basic.homestead, Some(true));
        assert_eq!(basic.subdivision.as_deref(), Some("MEADOW LAKES"));
        assert_eq!(info.community.as_ref().and_then(|c| c.hoa_fee), Some(450.0));
    }

    #[test]
    fn apply_keeps_existing_identity() {
        let mut record = PropertyRecord {
            parcel_id: Some("1111111111".into()),
            ..Default::default()
        };
        parse_owner(OWNER_HTML).apply(&mut record);
        assert_eq!(record.parcel_id.as_deref(), Some("1111111111"));
        assert_eq!(record.owner_type.as_deref(), Some("Trust"));
    }

    #[test]
    fn blank_hoa_stays_empty() {
        let info = parse_owner(
            "<div><b>Owner:</b> DOE JANE</div><div><b>HOA:</b></div><div><b>Jurisdiction:</b> UNINCORPORATED</div>",
        );
        assert_eq!(info.owner_name.as_deref(), Some("DOE JANE"));
        assert!(info.community.is_none());
        assert_eq!(
            info.basic.as_ref().and_then(|b| b.jurisdiction.as_deref()),
            Some("UNINCORPORATED")
        );
    }

    #[test]
    fn owner_classification() {
        assert_eq!(classify_owner("SUNCOAST HOLDINGS LLC"), "Corporate");
        assert_eq!(classify_owner("DOE FAMILY TRUST"), "Trust");
        assert_eq!(classify_owner("MANATEE COUNTY"), "Government");
        assert_eq!(classify_owner("CITY OF BRADENTON"), "Government");
        assert_eq!(classify_owner("DOE JANE"), "Individual");
    }

    #[test]
    fn land_use_mapping() {
        assert_eq!(
            property_type_from_land_use("0400 - CONDOMINIUM").as_deref(),
            Some("Condominium")
        );
        assert_eq!(
            property_type_from_land_use("7100 - CHURCHES").as_deref(),
            Some("CHURCHES")
        );
        assert_eq!(property_type_from_land_use("  "), None);
    }
}
