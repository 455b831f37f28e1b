use super::labels::LabelScanner;
use super::{non_empty, parse_count, parse_flag, parse_number, parse_year};
use crate::types::BuildingInfo;

const BUILDING_TYPE: &[&str] = &["building type", "bldg type", "structure type", "improvement type"];
const YEAR_BUILT: &[&str] = &["year built", "actual year built", "yr built", "ayb"];
const EFFECTIVE_YEAR: &[&str] = &["effective year built", "effective year", "eff year built", "eyb"];
const LIVING_AREA: &[&str] = &[
    "living area",
    "heated area",
    "living sq ft",
    "heated sq ft",
    "under air",
    "living area sqft",
];
const GROSS_AREA: &[&str] = &["gross area", "total area", "gross sq ft", "total sq ft"];
const STORIES: &[&str] = &["stories", "no. of stories", "floors"];
const UNITS: &[&str] = &["units", "living units", "no. of units"];
const ROOM_COUNTS: &[&str] = &[
    "bed/bath/half",
    "beds/baths/half baths",
    "bedrooms/baths/half baths",
    "bd/ba/hb",
    "rooms",
];
const BEDROOMS: &[&str] = &["bedrooms", "beds"];
const FULL_BATHS: &[&str] = &["full baths", "baths", "bathrooms"];
const HALF_BATHS: &[&str] = &["half baths", "half bathrooms"];
const CONSTRUCTION_EXTERIOR: &[&str] = &["construction/exterior", "const/ext", "frame/exterior wall"];
const CONSTRUCTION: &[&str] = &["construction", "construction type", "frame"];
const EXTERIOR: &[&str] = &["exterior", "exterior wall", "ext wall"];
const ROOF: &[&str] = &["roof", "roof cover", "roof structure"];
const HEATING: &[&str] = &["heating", "heat", "heat type"];
const COOLING: &[&str] = &["cooling", "air conditioning", "a/c"];
const QUALITY: &[&str] = &["quality", "grade", "quality grade"];
const POOL: &[&str] = &["pool"];
const FIREPLACE: &[&str] = &["fireplace", "fireplaces"];

/// `3/2/0` → (bedrooms, full baths, half baths). A missing trailing part
/// reads as absent.
pub fn parse_room_counts(s: &str) -> (Option<u32>, Option<u32>, Option<u32>) {
    let mut parts = s.split('/').map(|p| parse_count(p.trim()));
    let beds = parts.next().flatten();
    let full = parts.next().flatten();
    let half = parts.next().flatten();
    (beds, full, half)
}

/// `MASONRY/STUCCO` → (construction, exterior).
pub fn split_construction(s: &str) -> (Option<String>, Option<String>) {
    match s.split_once('/') {
        Some((a, b)) => (non_empty(a.to_string()), non_empty(b.to_string())),
        None => (non_empty(s.to_string()), None),
    }
}

pub fn parse_building(html: &str) -> Option<BuildingInfo> {
    let scan = LabelScanner::new(html);
    let get = |labels: &[&str]| scan.value(labels).and_then(non_empty);

    let (mut bedrooms, mut full_baths, mut half_baths) = get(ROOM_COUNTS)
        .map(|v| parse_room_counts(&v))
        .unwrap_or((None, None, None));
    bedrooms = bedrooms.or_else(|| get(BEDROOMS).and_then(|v| parse_count(&v)));
    full_baths = full_baths.or_else(|| get(FULL_BATHS).and_then(|v| parse_count(&v)));
    half_baths = half_baths.or_else(|| get(HALF_BATHS).and_then(|v| parse_count(&v)));

    let (mut construction, mut exterior) = get(CONSTRUCTION_EXTERIOR)
        .map(|v| split_construction(&v))
        .unwrap_or((None, None));
    construction = construction.or_else(|| get(CONSTRUCTION));
    exterior = exterior.or_else(|| get(EXTERIOR));

    let info = BuildingInfo {
        building_type: get(BUILDING_TYPE),
        year_built: get(YEAR_BUILT).and_then(|v| parse_year(&v)),
        effective_year_built: get(EFFECTIVE_YEAR).and_then(|v| parse_year(&v)),
        living_area_sqft: get(LIVING_AREA).and_then(|v| parse_count(&v)),
        gross_area_sqft: get(GROSS_AREA).and_then(|v| parse_count(&v)),
        stories: get(STORIES).and_then(|v| parse_number(&v)).map(|n| n as f32),
        units: get(UNITS).and_then(|v| parse_count(&v)),
        bedrooms,
        full_baths,
        half_baths,
        construction,
        exterior,
        roof: get(ROOF),
        heating: get(HEATING),
        cooling: get(COOLING),
        quality: get(QUALITY),
        pool: get(POOL).and_then(|v| parse_flag(&v)),
        fireplace: get(FIREPLACE).and_then(|v| parse_flag(&v)),
    };

    (info != BuildingInfo::default()).then_some(info)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_cells() {
        assert_eq!(parse_room_counts("3/2/0"), (Some(3), Some(2), Some(0)));
        assert_eq!(parse_room_counts("4/3"), (Some(4), Some(3), None));
        assert_eq!(parse_room_counts("n/a"), (None, None, None));
        assert_eq!(
            split_construction("MASONRY/STUCCO"),
            (Some("MASONRY".into()), Some("STUCCO".into()))
        );
        assert_eq!(split_construction("FRAME"), (Some("FRAME".into()), None));
    }

    #[test]
    fn parses_building_table() {
        let html = r#"
            <table id="bldgTable">
              <tr><th>Building Type</th><th>Year Built</th><th>Eff Year Built</th><th>Living Area</th><th>Stories</th></tr>
              <tr><td>SINGLE FAMILY</td><td>1987</td><td>1995</td><td>1,850</td><td>1</td></tr>
            </table>
            <table>
              <tr><th>Bed/Bath/Half</th><td>3/2/1</td></tr>
              <tr><th>Construction/Exterior</th><td>MASONRY/STUCCO</td></tr>
              <tr><th>Roof Cover</th><td>SHINGLE</td></tr>
              <tr><th>A/C</th><td>CENTRAL</td></tr>
              <tr><th>Pool</th><td>Y</td></tr>
            </table>"#;
        let b = parse_building(html).unwrap();
        assert_eq!(b.building_type.as_deref(), Some("SINGLE FAMILY"));
        assert_eq!(b.year_built, Some(1987));
        assert_eq!(b.effective_year_built, Some(1995));
        assert_eq!(b.living_area_sqft, Some(1850));
        assert_eq!(b.stories, Some(1.0));
        assert_eq!((b.bedrooms, b.full_baths, b.half_baths), (Some(3), Some(2), Some(1)));
        assert_eq!(b.bathrooms(), Some(2.5));
        assert_eq!(b.construction.as_deref(), Some("MASONRY"));
        assert_eq!(b.exterior.as_deref(), Some("STUCCO"));
        assert_eq!(b.roof.as_deref(), Some("SHINGLE"));
        assert_eq!(b.cooling.as_deref(), Some("CENTRAL"));
        assert_eq!(b.pool, Some(true));
        assert_eq!(b.fireplace, None);
    }
}
