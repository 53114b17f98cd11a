//! Éventail de reprojection vers les CRS de publication

use std::collections::BTreeMap;

use tracing::debug;

use crate::reproject::Reprojector;
use crate::types::{CanonicalRecord, MergedCollection};
use crate::{Crs, HarmonizeError};

/// Reprojette la collection vers un seul CRS
///
/// Les attributs et longueurs sont conservés tels quels: seules les
/// coordonnées changent.
pub fn reproject_collection(
    collection: &MergedCollection,
    target: Crs,
) -> Result<MergedCollection, HarmonizeError> {
    let reprojector = Reprojector::new(collection.crs, target)?;

    let records = collection
        .records
        .iter()
        .map(|record| {
            Ok(CanonicalRecord {
                source: record.source.clone(),
                attributes: record.attributes.clone(),
                geometry: reprojector.transform_geometry(&record.geometry)?,
                length: record.length,
            })
        })
        .collect::<Result<Vec<_>, HarmonizeError>>()?;

    Ok(MergedCollection {
        columns: collection.columns.clone(),
        crs: target,
        records,
    })
}

/// Produit une copie reprojetée par CRS cible
///
/// Chaque sortie est calculée depuis la collection d'entrée, jamais depuis
/// une autre sortie. Les doublons de `targets` sont ignorés.
pub fn export_all(
    collection: &MergedCollection,
    targets: &[Crs],
) -> Result<BTreeMap<Crs, MergedCollection>, HarmonizeError> {
    let mut outputs = BTreeMap::new();

    for &target in targets {
        if outputs.contains_key(&target) {
            continue;
        }
        debug!(from = %collection.crs, to = %target, records = collection.len(), "Reprojecting collection");
        outputs.insert(target, reproject_collection(collection, target)?);
    }

    Ok(outputs)
}
