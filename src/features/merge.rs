//! Merging extraction passes and deriving summary fields.
//!
//! The main pass is authoritative. Supplemental passes only fill fields the
//! main pass left unset and append list entries whose natural key (year for
//! valuations, date for sales) is not already present.

use crate::types::{
    BasicInfo, BuildingInfo, CommunityInfo, Extras, LandInfo, ListingMetrics, PropertyRecord,
    Sale, Valuation,
};
use std::collections::HashSet;
use tracing::debug;

/// Fill every `None` field of `$dst` from `$src`.
macro_rules! fill {
    ($dst:expr, $src:expr, [$($field:ident),+ $(,)?]) => {
        $(
            if $dst.$field.is_none() {
                $dst.$field = $src.$field;
            }
        )+
    };
}

fn fill_group<T>(dst: &mut Option<T>, src: Option<T>, merge: impl FnOnce(&mut T, T)) {
    let Some(src) = src else {
        return;
    };
    match dst {
        Some(d) => merge(d, src),
        None => *dst = Some(src),
    }
}

fn merge_basic(dst: &mut BasicInfo, src: BasicInfo) {
    fill!(dst, src, [
        situs_address, mailing_address, jurisdiction, tax_district, subdivision,
        neighborhood, legal_description, land_use, section_township_range, homestead,
    ]);
}

fn merge_building(dst: &mut BuildingInfo, src: BuildingInfo) {
    fill!(dst, src, [
        building_type, year_built, effective_year_built, living_area_sqft, gross_area_sqft,
        stories, units, bedrooms, full_baths, half_baths, construction, exterior, roof,
        heating, cooling, quality, pool, fireplace,
    ]);
}

fn merge_land(dst: &mut LandInfo, src: LandInfo) {
    fill!(dst, src, [
        lot_size_sqft, acreage, land_use_code, land_use_description, road_type,
        frontage_ft, depth_ft, zoning,
    ]);
}

fn merge_community(dst: &mut CommunityInfo, src: CommunityInfo) {
    fill!(dst, src, [community_name, hoa_name, hoa_fee]);
}

fn merge_metrics(dst: &mut ListingMetrics, src: ListingMetrics) {
    fill!(dst, src, [price_per_sqft]);
}

fn merge_extras(dst: &mut Extras, src: Extras) {
    let known: HashSet<String> = dst
        .features
        .iter()
        .map(|f| f.description.to_ascii_uppercase())
        .collect();
    dst.features.extend(
        src.features
            .into_iter()
            .filter(|f| !known.contains(&f.description.to_ascii_uppercase())),
    );
    for tag in src.feature_tags {
        if !dst.feature_tags.contains(&tag) {
            dst.feature_tags.push(tag);
        }
    }
    dst.feature_tags.sort();
    let inspections_known: HashSet<(Option<chrono::NaiveDate>, Option<String>)> = dst
        .inspections
        .iter()
        .map(|i| (i.date, i.inspection_type.clone()))
        .collect();
    dst.inspections.extend(
        src.inspections
            .into_iter()
            .filter(|i| !inspections_known.contains(&(i.date, i.inspection_type.clone()))),
    );
}

fn merge_valuations(dst: &mut Vec<Valuation>, src: Vec<Valuation>) {
    let mut years: HashSet<i32> = dst.iter().map(|v| v.year).collect();
    for v in src {
        if years.insert(v.year) {
            dst.push(v);
        }
    }
    dst.sort_by(|a, b| b.year.cmp(&a.year));
}

fn merge_sales(dst: &mut Vec<Sale>, src: Vec<Sale>) {
    let mut keys: HashSet<String> = dst.iter().filter_map(Sale::natural_key).collect();
    for s in src {
        match s.natural_key() {
            Some(key) if keys.insert(key.clone()) => dst.push(s),
            Some(_) => {}
            // keyless rows cannot be de-duplicated; keep them only if new
            None if !dst.contains(&s) => dst.push(s),
            None => {}
        }
    }
    dst.sort_by(|a, b| b.date.cmp(&a.date));
}

/// Merge `supplemental` into `main` without overwriting anything `main` has.
pub fn merge_records(main: &mut PropertyRecord, supplemental: PropertyRecord) {
    fill!(main, supplemental, [
        parcel_id, address, city, state, zip, owner_name, owner_type, property_type,
        year_built, bedrooms, bathrooms, living_area_sqft, lot_size_sqft, assessed_value,
        market_value, last_sale_price, last_sale_date, tax_amount,
    ]);

    fill_group(&mut main.basic_info, supplemental.basic_info, merge_basic);
    fill_group(&mut main.building, supplemental.building, merge_building);
    fill_group(&mut main.land, supplemental.land, merge_land);
    fill_group(&mut main.community, supplemental.community, merge_community);
    fill_group(&mut main.listing_metrics, supplemental.listing_metrics, merge_metrics);
    fill_group(&mut main.extras, supplemental.extras, merge_extras);
    fill_group(&mut main.valuations, supplemental.valuations, merge_valuations);
    fill_group(&mut main.sales_history, supplemental.sales_history, merge_sales);
}

/// Fill the summary scalars from the nested groups.
///
/// Nested data is authoritative: a derived value replaces whatever scalar
/// an earlier pass copied in.
pub fn derive_summary(record: &mut PropertyRecord) {
    if let Some(latest) = record
        .valuations
        .as_ref()
        .and_then(|v| v.iter().max_by_key(|v| v.year))
    {
        record.market_value = latest.total_value.or(record.market_value);
        record.assessed_value = latest.assessed_value.or(record.assessed_value);
        record.tax_amount = latest.tax_amount().or(record.tax_amount);
    }

    if let Some(last) = record.sales_history.as_ref().and_then(|sales| {
        sales
            .iter()
            .filter(|s| s.price.is_some_and(|p| p > 0.0))
            .max_by_key(|s| s.date)
    }) {
        record.last_sale_price = last.price;
        record.last_sale_date = last.date.or(record.last_sale_date);
    }

    if let Some(b) = record.building.as_ref() {
        record.year_built = b.year_built.or(record.year_built);
        record.bedrooms = b.bedrooms.or(record.bedrooms);
        record.bathrooms = b.bathrooms().or(record.bathrooms);
        record.living_area_sqft = b.living_area_sqft.or(record.living_area_sqft);
    }
    if let Some(l) = record.land.as_ref() {
        record.lot_size_sqft = l.lot_size_sqft.or(record.lot_size_sqft);
    }
    if record.address.is_none() {
        record.address = record
            .basic_info
            .as_ref()
            .and_then(|b| b.situs_address.clone());
    }

    if let (Some(value), Some(area)) = (record.market_value, record.living_area_sqft) {
        if area > 0 {
            let ppsf = (value / area as f64 * 100.0).round() / 100.0;
            record
                .listing_metrics
                .get_or_insert_with(ListingMetrics::default)
                .price_per_sqft = Some(ppsf);
        }
    }

    debug!(
        "summary: market={:?} last_sale={:?} ppsf={:?}",
        record.market_value,
        record.last_sale_price,
        record.listing_metrics.as_ref().and_then(|m| m.price_per_sqft)
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn val(year: i32, total: f64) -> Valuation {
        Valuation {
            year,
            total_value: Some(total),
            assessed_value: Some(total - 50_000.0),
            total_tax: Some(total / 100.0),
            ..Default::default()
        }
    }

    fn sale(y: i32, m: u32, d: u32, price: f64) -> Sale {
        Sale {
            date: NaiveDate::from_ymd_opt(y, m, d),
            price: Some(price),
            ..Default::default()
        }
    }

    fn samples() -> Vec<PropertyRecord> {
        vec![
            PropertyRecord::default(),
            PropertyRecord {
                parcel_id: Some("5678901234".into()),
                owner_name: Some("DOE JANE".into()),
                year_built: Some(1987),
                valuations: Some(vec![val(2024, 305_000.0), val(2023, 290_000.0)]),
                sales_history: Some(vec![sale(2021, 3, 15, 325_000.0)]),
                building: Some(BuildingInfo {
                    bedrooms: Some(3),
                    ..Default::default()
                }),
                ..Default::default()
            },
            PropertyRecord {
                parcel_id: Some("9999999999".into()),
                owner_name: Some("OTHER".into()),
                city: Some("Bradenton".into()),
                year_built: Some(2001),
                valuations: Some(vec![val(2024, 1.0), val(2022, 270_000.0)]),
                sales_history: Some(vec![
                    sale(2021, 3, 15, 1.0),
                    sale(2015, 6, 1, 189_900.0),
                ]),
                building: Some(BuildingInfo {
                    bedrooms: Some(9),
                    full_baths: Some(2),
                    ..Default::default()
                }),
                land: Some(LandInfo {
                    lot_size_sqft: Some(10_000.0),
                    ..Default::default()
                }),
                ..Default::default()
            },
        ]
    }

    #[test]
    fn merge_never_overwrites_set_fields() {
        for base in samples() {
            for extra in samples() {
                let mut merged = base.clone();
                merge_records(&mut merged, extra.clone());

                if base.parcel_id.is_some() {
                    assert_eq!(merged.parcel_id, base.parcel_id);
                } else {
                    assert_eq!(merged.parcel_id, extra.parcel_id);
                }
                if base.owner_name.is_some() {
                    assert_eq!(merged.owner_name, base.owner_name);
                }
                if base.year_built.is_some() {
                    assert_eq!(merged.year_built, base.year_built);
                }
                if let Some(b) = &base.building {
                    let m = merged.building.as_ref().unwrap();
                    assert_eq!(m.bedrooms, b.bedrooms);
                }
                // every base entry survives unchanged
                for v in base.valuations.iter().flatten() {
                    assert!(merged.valuations.as_ref().unwrap().contains(v));
                }
                for s in base.sales_history.iter().flatten() {
                    assert!(merged.sales_history.as_ref().unwrap().contains(s));
                }
            }
        }
    }

    #[test]
    fn merge_deduplicates_years_and_dates() {
        for base in samples() {
            for extra in samples() {
                let mut merged = base.clone();
                merge_records(&mut merged, extra);

                let years: Vec<i32> = merged.valuations.iter().flatten().map(|v| v.year).collect();
                let unique: HashSet<i32> = years.iter().copied().collect();
                assert_eq!(years.len(), unique.len());

                let dates: Vec<_> = merged.sales_history.iter().flatten().map(|s| s.date).collect();
                let unique: HashSet<_> = dates.iter().copied().collect();
                assert_eq!(dates.len(), unique.len());
            }
        }
    }

    #[test]
    fn merge_fills_nested_gaps() {
        let s = samples();
        let mut merged = s[1].clone();
        merge_records(&mut merged, s[2].clone());
        let b = merged.building.as_ref().unwrap();
        assert_eq!(b.bedrooms, Some(3));
        assert_eq!(b.full_baths, Some(2));
        assert_eq!(merged.city.as_deref(), Some("Bradenton"));
        let years: Vec<i32> = merged.valuations.as_ref().unwrap().iter().map(|v| v.year).collect();
        assert_eq!(years, vec![2024, 2023, 2022]);
        assert_eq!(merged.valuations.as_ref().unwrap()[0].total_value, Some(305_000.0));
    }

    #[test]
    fn summary_from_latest_entries() {
        let s = samples();
        let mut record = s[1].clone();
        merge_records(&mut record, s[2].clone());
        record.building.as_mut().unwrap().living_area_sqft = Some(1_850);
        derive_summary(&mut record);

        assert_eq!(record.market_value, Some(305_000.0));
        assert_eq!(record.assessed_value, Some(255_000.0));
        assert_eq!(record.tax_amount, Some(3_050.0));
        assert_eq!(record.last_sale_price, Some(325_000.0));
        assert_eq!(record.last_sale_date, NaiveDate::from_ymd_opt(2021, 3, 15));
        assert_eq!(record.bedrooms, Some(3));
        assert_eq!(record.bathrooms, Some(2.0));
        assert_eq!(record.lot_size_sqft, Some(10_000.0));
        assert_eq!(
            record.listing_metrics.as_ref().and_then(|m| m.price_per_sqft),
            Some(164.86)
        );
    }

    #[test]
    fn zero_price_sales_are_not_last_sale() {
        let mut record = PropertyRecord {
            sales_history: Some(vec![sale(2023, 1, 1, 0.0), sale(2019, 5, 5, 210_000.0)]),
            ..Default::default()
        };
        derive_summary(&mut record);
        assert_eq!(record.last_sale_price, Some(210_000.0));
        assert_eq!(record.listing_metrics, None);
    }
}
