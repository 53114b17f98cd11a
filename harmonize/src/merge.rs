//! Fusion des jeux conditionnés en une seule collection

use tracing::debug;

use crate::types::{CanonicalDataset, MergedCollection};
use crate::{Crs, HarmonizeError, Schema};

/// Concatène les jeux dans l'ordre fourni par l'appelant
///
/// Chaque jeu doit porter exactement les colonnes du schéma (contrat du
/// normaliseur) et tous doivent partager le même CRS. `crs` est le CRS de
/// travail, utilisé tel quel pour une collection vide.
///
/// # Errors
///
/// `HarmonizeError::Schema` si un jeu ou un enregistrement dévie du schéma,
/// `HarmonizeError::Crs` si les CRS diffèrent.
pub fn merge(
    schema: &Schema,
    crs: Crs,
    datasets: Vec<CanonicalDataset>,
) -> Result<MergedCollection, HarmonizeError> {
    let total: usize = datasets.iter().map(|d| d.records.len()).sum();
    let mut records = Vec::with_capacity(total);

    for dataset in datasets {
        if dataset.columns != schema.fields {
            return Err(HarmonizeError::schema(
                &dataset.source,
                format!(
                    "columns [{}] differ from schema '{}' [{}]",
                    dataset.columns.join(", "),
                    schema.name,
                    schema.fields.join(", ")
                ),
            ));
        }

        if dataset.crs != crs {
            return Err(HarmonizeError::crs(
                &dataset.source,
                format!("dataset in {} cannot be merged into {}", dataset.crs, crs),
            ));
        }

        if let Some(index) = dataset
            .records
            .iter()
            .position(|r| !schema.has_exact_keys(&r.attributes))
        {
            let keys = dataset.records[index]
                .attributes
                .keys()
                .cloned()
                .collect::<Vec<_>>()
                .join(", ");
            return Err(HarmonizeError::schema(
                &dataset.source,
                format!("record {} carries non-canonical attributes [{}]", index, keys),
            ));
        }

        debug!(source = %dataset.source, records = dataset.records.len(), "Merging source");
        records.extend(dataset.records);
    }

    Ok(MergedCollection {
        columns: schema.fields.clone(),
        crs,
        records,
    })
}
