//! Attributs dérivés (longueur) et filtrage par statut

use std::collections::{BTreeMap, BTreeSet};

use geo::{GeodesicLength, Geometry};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::normalize::{apply_recode, RecodeRule};
use crate::reproject::Reprojector;
use crate::types::{Length, LengthUnit, MergedCollection};
use crate::{Crs, HarmonizeError, Status};

/// Traitement des statuts hors vocabulaire contrôlé
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownStatusPolicy {
    /// Valeur conservée telle quelle (signalée dans le rapport)
    #[default]
    Passthrough,
    /// Valeur remplacée par null
    Null,
    /// Enregistrement écarté
    Reject,
}

/// Paramètres de l'étape de finalisation
#[derive(Debug, Clone)]
pub struct FinalizeRules {
    /// Colonne de statut (None: pas de recodage ni de filtrage)
    pub status_field: Option<String>,

    /// Statuts exclus de la couche finale
    pub excluded: BTreeSet<Status>,

    /// Unité des longueurs dérivées
    pub unit: LengthUnit,

    pub unknown_status: UnknownStatusPolicy,

    /// Synonymes inter-sources appliqués avant la reconnaissance des statuts
    pub synonyms: Vec<RecodeRule>,
}

impl Default for FinalizeRules {
    fn default() -> Self {
        Self {
            status_field: Some("status".to_string()),
            excluded: Status::DEFAULT_EXCLUDED.into_iter().collect(),
            unit: LengthUnit::Kilometers,
            unknown_status: UnknownStatusPolicy::Passthrough,
            synonyms: Vec::new(),
        }
    }
}

/// Résultat de la finalisation
#[derive(Debug, Clone)]
pub struct FinalizeOutcome {
    pub collection: MergedCollection,

    /// Enregistrements exclus, par statut
    pub excluded: BTreeMap<Status, usize>,

    /// Valeurs de statut non reconnues (avant application de la politique)
    pub unrecognized: BTreeMap<String, usize>,

    /// Enregistrements écartés par la politique `reject`
    pub rejected: usize,
}

/// Mesure géodésique des géométries linéaires, quel que soit le CRS
///
/// Les coordonnées sont ramenées en WGS84 avant la mesure: aucune unité de
/// CRS n'est supposée métrique, aucun CRS n'est supposé en degrés.
pub struct LengthMeter {
    to_wgs84: Reprojector,
    unit: LengthUnit,
}

impl LengthMeter {
    pub fn new(crs: Crs, unit: LengthUnit) -> Result<Self, HarmonizeError> {
        Ok(Self {
            to_wgs84: Reprojector::new(crs, Crs::WGS84)?,
            unit,
        })
    }

    /// Longueur en mètres (None pour les géométries non linéaires)
    pub fn meters(&self, geometry: &Geometry<f64>) -> Result<Option<f64>, HarmonizeError> {
        if !is_linear(geometry) {
            return Ok(None);
        }
        let wgs84 = self.to_wgs84.transform_geometry(geometry)?;
        Ok(geodesic_meters(&wgs84))
    }

    /// Mesure étiquetée dans l'unité configurée
    pub fn measure(&self, geometry: &Geometry<f64>) -> Result<Option<Length>, HarmonizeError> {
        Ok(self.meters(geometry)?.map(|meters| Length {
            value: self.unit.from_meters(meters),
            unit: self.unit,
        }))
    }
}

/// Mesure ponctuelle (un `LengthMeter` par appel)
pub fn measure(
    geometry: &Geometry<f64>,
    crs: Crs,
    unit: LengthUnit,
) -> Result<Option<Length>, HarmonizeError> {
    LengthMeter::new(crs, unit)?.measure(geometry)
}

fn is_linear(geometry: &Geometry<f64>) -> bool {
    match geometry {
        Geometry::LineString(_) | Geometry::MultiLineString(_) => true,
        Geometry::GeometryCollection(gc) => gc.0.iter().any(is_linear),
        _ => false,
    }
}

/// Longueur géodésique d'une géométrie en WGS84
fn geodesic_meters(geometry: &Geometry<f64>) -> Option<f64> {
    match geometry {
        Geometry::LineString(ls) => Some(ls.geodesic_length()),
        Geometry::MultiLineString(mls) => Some(mls.geodesic_length()),
        Geometry::GeometryCollection(gc) => {
            let lengths: Vec<f64> = gc.0.iter().filter_map(geodesic_meters).collect();
            (!lengths.is_empty()).then(|| lengths.iter().sum())
        }
        _ => None,
    }
}

/// Recode les statuts, filtre les statuts exclus, calcule les longueurs
///
/// Le recodage précède toujours le filtrage.
///
/// # Errors
///
/// `HarmonizeError::Reprojection` si le CRS de la collection ne peut pas être
/// ramené en WGS84 pour la mesure des longueurs.
pub fn finalize(
    collection: MergedCollection,
    rules: &FinalizeRules,
) -> Result<FinalizeOutcome, HarmonizeError> {
    let MergedCollection {
        columns,
        crs,
        records,
    } = collection;
    let meter = LengthMeter::new(crs, rules.unit)?;

    let mut excluded: BTreeMap<Status, usize> = BTreeMap::new();
    let mut unrecognized: BTreeMap<String, usize> = BTreeMap::new();
    let mut rejected = 0;
    let mut kept = Vec::with_capacity(records.len());

    for mut record in records {
        if let Some(field) = rules.status_field.as_deref() {
            apply_recode(&mut record.attributes, &rules.synonyms);

            let current = record.attributes.get(field).cloned().flatten();
            if let Some(value) = current {
                match Status::parse_loose(&value) {
                    Some(status) => {
                        if rules.excluded.contains(&status) {
                            *excluded.entry(status).or_insert(0) += 1;
                            continue;
                        }
                        record
                            .attributes
                            .insert(field.to_string(), Some(status.as_str().to_string()));
                    }
                    None => {
                        *unrecognized.entry(value).or_insert(0) += 1;
                        match rules.unknown_status {
                            UnknownStatusPolicy::Passthrough => {}
                            UnknownStatusPolicy::Null => {
                                record.attributes.insert(field.to_string(), None);
                            }
                            UnknownStatusPolicy::Reject => {
                                rejected += 1;
                                continue;
                            }
                        }
                    }
                }
            }
        }

        record.length = meter.measure(&record.geometry)?;
        kept.push(record);
    }

    for (value, count) in &unrecognized {
        warn!(
            status = %value,
            count = count,
            policy = ?rules.unknown_status,
            "Status outside controlled vocabulary"
        );
    }
    debug!(
        kept = kept.len(),
        excluded = excluded.values().sum::<usize>(),
        rejected = rejected,
        "Finalize complete"
    );

    Ok(FinalizeOutcome {
        collection: MergedCollection {
            columns,
            crs,
            records: kept,
        },
        excluded,
        unrecognized,
        rejected,
    })
}
