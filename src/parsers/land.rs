use super::labels::LabelScanner;
use super::{non_empty, parse_number};
use crate::types::LandInfo;

pub const SQFT_PER_ACRE: f64 = 43_560.0;

const LOT_SIZE: &[&str] = &["lot size", "lot area", "land area", "land sq ft", "lot sq ft", "square feet"];
const ACREAGE: &[&str] = &["acreage", "acres", "total acres", "land acres"];
const LAND_USE_CODE: &[&str] = &["land use code", "use code", "dor code"];
const LAND_USE: &[&str] = &["land use", "land use description", "use description"];
const ROAD: &[&str] = &["road type", "road surface", "road", "access"];
const FRONTAGE: &[&str] = &["frontage", "front ft", "front feet"];
const DEPTH: &[&str] = &["depth", "depth ft"];
const ZONING: &[&str] = &["zoning", "zone"];

/// `0100 - SINGLE FAMILY` → (`0100`, `SINGLE FAMILY`).
fn split_use_code(s: &str) -> Option<(String, String)> {
    let (code, desc) = s.split_once(" - ").or_else(|| s.split_once('-'))?;
    let code = code.trim();
    let desc = desc.trim();
    (!code.is_empty() && !desc.is_empty() && code.chars().all(|c| c.is_ascii_alphanumeric())
        && code.chars().any(|c| c.is_ascii_digit()))
        .then(|| (code.to_string(), desc.to_string()))
}

/// Lot size in square feet; values tagged as acres are converted.
fn lot_size_from(raw: &str) -> Option<f64> {
    let n = parse_number(raw)?;
    let lower = raw.to_ascii_lowercase();
    if lower.contains("ac") {
        Some(n * SQFT_PER_ACRE)
    } else {
        Some(n)
    }
}

pub fn parse_land(html: &str) -> Option<LandInfo> {
    let scan = LabelScanner::new(html);
    let get = |labels: &[&str]| scan.value(labels).and_then(non_empty);

    let mut land_use_code = get(LAND_USE_CODE);
    let mut land_use_description = get(LAND_USE);
    let split = land_use_description.as_deref().and_then(split_use_code);
    if let Some((code, desc)) = split {
        land_use_code = land_use_code.or(Some(code));
        land_use_description = Some(desc);
    }

    let acreage = get(ACREAGE).and_then(|v| parse_number(&v));
    let lot_size_sqft = get(LOT_SIZE)
        .and_then(|v| lot_size_from(&v))
        .or_else(|| acreage.map(|a| (a * SQFT_PER_ACRE).round()));

    let info = LandInfo {
        lot_size_sqft,
        acreage,
        land_use_code,
        land_use_description,
        road_type: get(ROAD),
        frontage_ft: get(FRONTAGE).and_then(|v| parse_number(&v)),
        depth_ft: get(DEPTH).and_then(|v| parse_number(&v)),
        zoning: get(ZONING),
    };

    (info != LandInfo::default()).then_some(info)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_land_rows() {
        let html = r#"
            <table id="landTable">
              <tr><th>Land Use</th><th>Road Type</th><th>Frontage</th><th>Depth</th><th>Lot Size</th></tr>
              <tr><td>0100 - SINGLE FAMILY</td><td>PAVED</td><td>80</td><td>125</td><td>10,000 SF</td></tr>
            </table>"#;
        let land = parse_land(html).unwrap();
        assert_eq!(land.land_use_code.as_deref(), Some("0100"));
        assert_eq!(land.land_use_description.as_deref(), Some("SINGLE FAMILY"));
        assert_eq!(land.road_type.as_deref(), Some("PAVED"));
        assert_eq!(land.frontage_ft, Some(80.0));
        assert_eq!(land.lot_size_sqft, Some(10_000.0));
        assert_eq!(land.acreage, None);
    }

    #[test]
    fn acreage_backfills_lot_size() {
        let land = parse_land("<div><b>Acreage:</b> 0.25</div>").unwrap();
        assert_eq!(land.acreage, Some(0.25));
        assert_eq!(land.lot_size_sqft, Some(10_890.0));

        let land = parse_land("<p>Lot Size: 1.5 AC</p>").unwrap();
        assert_eq!(land.lot_size_sqft, Some(65_340.0));
    }
}
