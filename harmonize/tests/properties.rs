//! Tests de propriétés (proptest)

use geo::{Geometry, LineString, Point};
use harmonize::{
    finalize, merge, CanonicalDataset, CanonicalRecord, Crs, FinalizeRules, MergedCollection,
    Schema, Status,
};
use harmonize::types::ConditionStats;
use proptest::prelude::*;

fn dataset(source: usize, n: usize) -> CanonicalDataset {
    let schema = Schema::cables();
    let records = (0..n)
        .map(|i| {
            let mut attributes = schema.empty_attributes();
            attributes.insert("id".to_string(), Some(format!("{}:{}", source, i)));
            CanonicalRecord {
                source: format!("src{}", source),
                attributes,
                geometry: Geometry::Point(Point::new(i as f64, source as f64)),
                length: None,
            }
        })
        .collect();
    CanonicalDataset {
        source: format!("src{}", source),
        columns: schema.fields,
        crs: Crs::WGS84,
        records,
        stats: ConditionStats::default(),
    }
}

fn status_strategy() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        Just(None),
        proptest::sample::select(Status::ALL.to_vec()).prop_map(|s| Some(s.as_str().to_string())),
        "[a-z ]{1,12}".prop_map(Some),
    ]
}

proptest! {
    #[test]
    fn merge_preserves_order_and_count(sizes in proptest::collection::vec(0usize..6, 0..6)) {
        let datasets: Vec<_> = sizes.iter().enumerate().map(|(s, &n)| dataset(s, n)).collect();
        let merged = merge(&Schema::cables(), Crs::WGS84, datasets).unwrap();

        prop_assert_eq!(merged.len(), sizes.iter().sum::<usize>());

        let expected: Vec<String> = sizes
            .iter()
            .enumerate()
            .flat_map(|(s, &n)| (0..n).map(move |i| format!("{}:{}", s, i)))
            .collect();
        let ids: Vec<String> = merged.records.iter().filter_map(|r| r.attr("id")).map(str::to_string).collect();
        prop_assert_eq!(ids, expected);
    }

    #[test]
    fn filtered_is_subset_without_excluded(statuses in proptest::collection::vec(status_strategy(), 0..20)) {
        let schema = Schema::cables();
        let records = statuses
            .iter()
            .map(|status| {
                let mut attributes = schema.empty_attributes();
                attributes.insert("status".to_string(), status.clone());
                CanonicalRecord {
                    source: "p".to_string(),
                    attributes,
                    geometry: Geometry::LineString(LineString::from(vec![(0.0, 0.0), (0.1, 0.1)])),
                    length: None,
                }
            })
            .collect::<Vec<_>>();
        let collection = MergedCollection { columns: schema.fields.clone(), crs: Crs::WGS84, records };

        let rules = FinalizeRules::default();
        let outcome = finalize(collection, &rules).unwrap();

        prop_assert!(outcome.collection.len() <= statuses.len());
        let excluded: usize = outcome.excluded.values().sum();
        prop_assert_eq!(outcome.collection.len() + excluded + outcome.rejected, statuses.len());
        for record in &outcome.collection.records {
            if let Some(status) = record.attr("status").and_then(Status::parse_loose) {
                prop_assert!(!rules.excluded.contains(&status));
            }
        }
    }
}

#[cfg(feature = "reproject")]
mod reprojection {
    use super::*;
    use harmonize::reproject::Reprojector;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn roundtrip_within_tolerance(lon in -10.0f64..30.0, lat in 35.0f64..70.0) {
            let forward = Reprojector::new(Crs::WGS84, Crs(3035)).unwrap();
            let backward = Reprojector::new(Crs(3035), Crs::WGS84).unwrap();

            let point = Geometry::Point(Point::new(lon, lat));
            let back = backward.transform_geometry(&forward.transform_geometry(&point).unwrap()).unwrap();

            let Geometry::Point(p) = back else {
                panic!("Expected Point");
            };
            prop_assert!((p.x() - lon).abs() < 1e-6);
            prop_assert!((p.y() - lat).abs() < 1e-6);
        }
    }
}
