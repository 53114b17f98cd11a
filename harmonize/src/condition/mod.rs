//! Conditionnement géométrique: CRS, dimension, reprojection, découpage

pub mod clip;
pub mod flatten;

use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use crate::reproject::Reprojector;
use crate::types::{CanonicalDataset, CanonicalRecord, ConditionStats, NormalizedDataset};
use crate::{BoundaryPolygon, Crs, HarmonizeError};

pub use clip::{clip_outside, ClipOutcome};
pub use flatten::{flatten, Flattened};

/// Détermine le CRS source d'un jeu normalisé
///
/// Le CRS supposé n'est accepté que si la source n'en déclare aucun (ou le
/// même). Plusieurs CRS distincts dans un même jeu sont une erreur.
pub fn resolve_crs(dataset: &NormalizedDataset, assumed: Option<Crs>) -> Result<Crs, HarmonizeError> {
    let declared: BTreeSet<Crs> = dataset
        .declared_crs
        .into_iter()
        .chain(dataset.records.iter().filter_map(|r| r.crs))
        .collect();

    if declared.len() > 1 {
        let list = declared
            .iter()
            .map(Crs::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        return Err(HarmonizeError::crs(
            &dataset.source,
            format!("mixed CRSs within one dataset: {}", list),
        ));
    }

    match (declared.into_iter().next(), assumed) {
        (Some(declared), Some(assumed)) if declared != assumed => Err(HarmonizeError::crs(
            &dataset.source,
            format!(
                "assumed CRS {} conflicts with declared CRS {}",
                assumed, declared
            ),
        )),
        (Some(declared), _) => Ok(declared),
        (None, Some(assumed)) => {
            info!(source = %dataset.source, crs = %assumed, "Assigning assumed CRS (source declares none)");
            Ok(assumed)
        }
        (None, None) => Err(HarmonizeError::crs(
            &dataset.source,
            "no CRS declared and no assumed CRS configured",
        )),
    }
}

/// Conditionne un jeu normalisé vers le CRS cible
///
/// 1. Résolution du CRS source (jamais supposé implicitement)
/// 2. Réduction 2-D (une seule fois, à la conversion)
/// 3. Reprojection source -> cible
/// 4. Découpage optionnel contre un polygone (partie extérieure conservée),
///    les enregistrements vidés sont supprimés
pub fn condition(
    dataset: NormalizedDataset,
    assumed_crs: Option<Crs>,
    target: Crs,
    clip: Option<&BoundaryPolygon>,
) -> Result<CanonicalDataset, HarmonizeError> {
    let mut stats = ConditionStats::default();

    if dataset.records.is_empty() {
        return Ok(CanonicalDataset {
            source: dataset.source,
            columns: dataset.columns,
            crs: target,
            records: Vec::new(),
            stats,
        });
    }

    let source_crs = resolve_crs(&dataset, assumed_crs)?;
    let reprojector = Reprojector::new(source_crs, target)?;

    // Le masque est ramené dans le CRS cible avant toute différence
    let mask = match clip {
        Some(boundary) => {
            let mask_reprojector = Reprojector::new(boundary.crs, target)?;
            Some(mask_reprojector.transform_multi_polygon(&boundary.geometry)?)
        }
        None => None,
    };

    let source = dataset.source;
    let mut records = Vec::with_capacity(dataset.records.len());

    for (index, record) in dataset.records.into_iter().enumerate() {
        let Some(raw_geometry) = record.geometry else {
            stats.dropped_null += 1;
            continue;
        };

        let flat = flatten(&raw_geometry).map_err(|reason| {
            HarmonizeError::geometry(&source, format!("record {}: {}", index, reason))
        })?;
        if flat.reduced {
            stats.flattened += 1;
        }

        let mut geometry = reprojector.transform_geometry(&flat.geometry)?;

        if let Some(mask) = &mask {
            match clip_outside(&geometry, mask) {
                ClipOutcome::Unchanged => {}
                ClipOutcome::Clipped(outside) => {
                    stats.clipped += 1;
                    geometry = outside;
                }
                ClipOutcome::Empty => {
                    stats.dropped_empty += 1;
                    continue;
                }
            }
        }

        records.push(CanonicalRecord {
            source: source.clone(),
            attributes: record.attributes,
            geometry,
            length: None,
        });
    }

    if stats.dropped_null > 0 {
        warn!(source = %source, dropped = stats.dropped_null, "Records without geometry dropped");
    }
    if stats.flattened > 0 {
        debug!(source = %source, flattened = stats.flattened, "Extra ordinates (Z/M) dropped");
    }
    if clip.is_some() {
        debug!(
            source = %source,
            clipped = stats.clipped,
            dropped_empty = stats.dropped_empty,
            "Clipped against boundary"
        );
    }

    Ok(CanonicalDataset {
        source,
        columns: dataset.columns,
        crs: target,
        records,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NormalizedRecord;
    use crate::Schema;
    use geo::{polygon, Geometry, LineString, MultiPolygon};
    use geojson::Value;

    fn record(value: Value, crs: Option<Crs>) -> NormalizedRecord {
        NormalizedRecord {
            attributes: Schema::cables().empty_attributes(),
            geometry: Some(geojson::Geometry::new(value)),
            crs,
        }
    }

    fn dataset(declared: Option<Crs>, records: Vec<NormalizedRecord>) -> NormalizedDataset {
        NormalizedDataset {
            source: "test".to_string(),
            columns: Schema::cables().fields,
            declared_crs: declared,
            records,
        }
    }

    fn line_3d() -> Value {
        Value::LineString(vec![vec![3.0, 51.0, -25.0], vec![3.5, 51.5, -40.0]])
    }

    #[test]
    fn test_resolve_declared() {
        let ds = dataset(Some(Crs(4326)), vec![record(line_3d(), None)]);
        assert_eq!(resolve_crs(&ds, None).unwrap(), Crs(4326));
        assert_eq!(resolve_crs(&ds, Some(Crs(4326))).unwrap(), Crs(4326));
    }

    #[test]
    fn test_resolve_assumed() {
        let ds = dataset(None, vec![record(line_3d(), None)]);
        assert_eq!(resolve_crs(&ds, Some(Crs(4326))).unwrap(), Crs(4326));
    }

    #[test]
    fn test_undeclared_without_assumption_fails() {
        let ds = dataset(None, vec![record(line_3d(), None)]);
        let err = resolve_crs(&ds, None).unwrap_err();
        assert!(matches!(err, HarmonizeError::Crs { .. }));
    }

    #[test]
    fn test_mixed_crs_fails() {
        let ds = dataset(
            Some(Crs(4326)),
            vec![record(line_3d(), None), record(line_3d(), Some(Crs(3035)))],
        );
        let err = condition(ds, None, Crs(4326), None).unwrap_err();
        assert!(err.to_string().contains("mixed"));
    }

    #[test]
    fn test_conflicting_assumption_fails() {
        let ds = dataset(Some(Crs(3035)), vec![record(line_3d(), None)]);
        assert!(resolve_crs(&ds, Some(Crs(4326))).is_err());
    }

    #[test]
    fn test_flatten_keeps_xy() {
        let ds = dataset(Some(Crs(4326)), vec![record(line_3d(), None)]);
        let conditioned = condition(ds, None, Crs(4326), None).unwrap();

        assert_eq!(conditioned.stats.flattened, 1);
        assert_eq!(
            conditioned.records[0].geometry,
            Geometry::LineString(LineString::from(vec![(3.0, 51.0), (3.5, 51.5)]))
        );
    }

    #[test]
    fn test_null_geometry_dropped() {
        let mut empty = record(line_3d(), None);
        empty.geometry = None;
        let ds = dataset(Some(Crs(4326)), vec![empty, record(line_3d(), None)]);
        let conditioned = condition(ds, None, Crs(4326), None).unwrap();
        assert_eq!(conditioned.records.len(), 1);
        assert_eq!(conditioned.stats.dropped_null, 1);
    }

    #[test]
    fn test_invalid_position_fails() {
        let ds = dataset(
            Some(Crs(4326)),
            vec![record(Value::LineString(vec![vec![1.0], vec![2.0, 3.0]]), None)],
        );
        let err = condition(ds, None, Crs(4326), None).unwrap_err();
        assert!(matches!(err, HarmonizeError::Geometry { .. }));
    }

    #[test]
    fn test_clip_drops_inland_and_keeps_offshore() {
        let land = BoundaryPolygon {
            id: 17,
            name: "Land".to_string(),
            crs: Crs(4326),
            geometry: MultiPolygon::new(vec![polygon![
                (x: 0.0, y: 45.0),
                (x: 2.0, y: 45.0),
                (x: 2.0, y: 50.0),
                (x: 0.0, y: 50.0),
                (x: 0.0, y: 45.0),
            ]]),
        };
        let inland = Value::LineString(vec![vec![0.5, 46.0], vec![1.5, 47.0]]);
        let offshore = Value::LineString(vec![vec![3.0, 46.0], vec![4.0, 47.0]]);
        let ds = dataset(
            Some(Crs(4326)),
            vec![record(inland, None), record(offshore.clone(), None)],
        );

        let conditioned = condition(ds, None, Crs(4326), Some(&land)).unwrap();
        assert_eq!(conditioned.records.len(), 1);
        assert_eq!(conditioned.stats.dropped_empty, 1);
        assert_eq!(
            conditioned.records[0].geometry,
            Geometry::LineString(LineString::from(vec![(3.0, 46.0), (4.0, 47.0)]))
        );
    }

    /// Ligne WGS84 exprimée en ETRS89-LAEA
    #[cfg(feature = "reproject")]
    fn laea_line(coords: &[(f64, f64)]) -> Value {
        let to_laea = Reprojector::new(Crs::WGS84, Crs(3035)).unwrap();
        let line = Geometry::LineString(LineString::from(coords.to_vec()));
        match to_laea.transform_geometry(&line).unwrap() {
            Geometry::LineString(projected) => Value::from(&projected),
            other => panic!("unexpected geometry {:?}", other),
        }
    }

    #[cfg(feature = "reproject")]
    #[test]
    fn test_reproject_then_clip_against_wgs84_mask() {
        let land = BoundaryPolygon {
            id: 17,
            name: "Land".to_string(),
            crs: Crs::WGS84,
            geometry: MultiPolygon::new(vec![polygon![
                (x: 0.0, y: 45.0),
                (x: 2.0, y: 45.0),
                (x: 2.0, y: 50.0),
                (x: 0.0, y: 50.0),
                (x: 0.0, y: 45.0),
            ]]),
        };
        let offshore = laea_line(&[(3.0, 53.0), (4.0, 54.0)]);
        let crossing = laea_line(&[(1.0, 47.0), (4.0, 47.0)]);
        let inland = laea_line(&[(0.5, 46.0), (1.5, 46.0)]);
        let ds = dataset(
            Some(Crs(3035)),
            vec![
                record(offshore.clone(), None),
                record(crossing, None),
                record(inland, None),
            ],
        );

        let conditioned = condition(ds, None, Crs::WGS84, Some(&land)).unwrap();
        assert_eq!(conditioned.crs, Crs::WGS84);
        assert_eq!(conditioned.records.len(), 2);
        assert_eq!(conditioned.stats.clipped, 1);
        assert_eq!(conditioned.stats.dropped_empty, 1);

        // Même résultat qu'une transformation directe 3035 -> 4326
        let from_laea = Reprojector::new(Crs(3035), Crs::WGS84).unwrap();
        let Value::LineString(positions) = offshore else {
            unreachable!()
        };
        let expected = from_laea
            .transform_geometry(&Geometry::LineString(LineString::from(
                positions.iter().map(|p| (p[0], p[1])).collect::<Vec<_>>(),
            )))
            .unwrap();
        let (Geometry::LineString(got), Geometry::LineString(want)) =
            (&conditioned.records[0].geometry, &expected)
        else {
            panic!("expected line strings");
        };
        assert_eq!(got.0.len(), want.0.len());
        for (a, b) in got.0.iter().zip(&want.0) {
            assert!((a.x - b.x).abs() < 1e-9 && (a.y - b.y).abs() < 1e-9);
        }
        assert!((got.0[0].x - 3.0).abs() < 1e-6 && (got.0[0].y - 53.0).abs() < 1e-6);

        // Seule la partie à l'est du masque subsiste
        use geo::CoordsIter;
        let crossed = &conditioned.records[1].geometry;
        assert!(crossed.coords_iter().all(|c| c.x >= 2.0 - 1e-9));
    }

    #[test]
    fn test_empty_dataset_needs_no_crs() {
        let ds = dataset(None, Vec::new());
        let conditioned = condition(ds, None, Crs(4326), None).unwrap();
        assert!(conditioned.records.is_empty());
        assert_eq!(conditioned.crs, Crs(4326));
    }
}
