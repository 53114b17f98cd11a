//! Types de données pour le crate harmonize

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use geo::{Geometry, MultiPolygon};
use serde::{Deserialize, Serialize};

use crate::Crs;

/// Attributs d'un enregistrement (colonne -> valeur, null = `None`)
pub type Attributes = BTreeMap<String, Option<String>>;

/// Unité de longueur des mesures dérivées
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LengthUnit {
    #[default]
    #[serde(rename = "km")]
    Kilometers,
    #[serde(rename = "m")]
    Meters,
    #[serde(rename = "nmi")]
    NauticalMiles,
}

impl LengthUnit {
    /// Convertit une longueur en mètres vers cette unité
    pub fn from_meters(self, meters: f64) -> f64 {
        match self {
            LengthUnit::Kilometers => meters / 1000.0,
            LengthUnit::Meters => meters,
            LengthUnit::NauticalMiles => meters / 1852.0,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            LengthUnit::Kilometers => "km",
            LengthUnit::Meters => "m",
            LengthUnit::NauticalMiles => "nmi",
        }
    }

    /// Nom de la colonne de sortie (`length_km`, ...)
    pub fn column_name(self) -> String {
        format!("length_{}", self.symbol())
    }
}

impl FromStr for LengthUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "km" | "kilometers" | "kilometres" => Ok(LengthUnit::Kilometers),
            "m" | "meters" | "metres" => Ok(LengthUnit::Meters),
            "nmi" | "nautical_miles" => Ok(LengthUnit::NauticalMiles),
            other => Err(format!("Unknown length unit: {}", other)),
        }
    }
}

/// Longueur dérivée, étiquetée avec son unité
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Length {
    pub value: f64,
    pub unit: LengthUnit,
}

impl fmt::Display for Length {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3} {}", self.value, self.unit.symbol())
    }
}

/// Enregistrement normalisé, géométrie encore brute (Z/M possibles)
#[derive(Debug, Clone)]
pub struct NormalizedRecord {
    /// Exactement les colonnes du schéma
    pub attributes: Attributes,

    /// Géométrie telle que fournie par la source
    pub geometry: Option<geojson::Geometry>,

    /// CRS déclaré au niveau de l'enregistrement
    pub crs: Option<Crs>,
}

/// Jeu de données normalisé (sortie du normaliseur)
#[derive(Debug, Clone)]
pub struct NormalizedDataset {
    /// Nom de la source
    pub source: String,

    /// Colonnes (= champs du schéma)
    pub columns: Vec<String>,

    /// CRS déclaré par la source (peut être absent)
    pub declared_crs: Option<Crs>,

    pub records: Vec<NormalizedRecord>,
}

/// Enregistrement canonique: attributs harmonisés, géométrie 2-D
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalRecord {
    /// Source d'origine (provenance)
    pub source: String,

    pub attributes: Attributes,

    /// Géométrie 2-D dans le CRS du jeu de données
    pub geometry: Geometry<f64>,

    /// Longueur dérivée (renseignée par l'étape de finalisation)
    pub length: Option<Length>,
}

impl CanonicalRecord {
    /// Valeur d'un attribut (None si absent ou null)
    pub fn attr(&self, field: &str) -> Option<&str> {
        self.attributes.get(field).and_then(|v| v.as_deref())
    }
}

/// Statistiques du conditionnement géométrique d'une source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConditionStats {
    /// Géométries ramenées en 2-D (Z/M supprimés)
    pub flattened: usize,
    /// Géométries modifiées par le découpage
    pub clipped: usize,
    /// Enregistrements supprimés car vides après découpage
    pub dropped_empty: usize,
    /// Enregistrements supprimés faute de géométrie
    pub dropped_null: usize,
}

/// Jeu de données conditionné (sortie du conditionneur)
#[derive(Debug, Clone)]
pub struct CanonicalDataset {
    pub source: String,
    pub columns: Vec<String>,
    pub crs: Crs,
    pub records: Vec<CanonicalRecord>,
    pub stats: ConditionStats,
}

/// Collection fusionnée, toutes sources confondues
#[derive(Debug, Clone, PartialEq)]
pub struct MergedCollection {
    pub columns: Vec<String>,
    pub crs: Crs,
    pub records: Vec<CanonicalRecord>,
}

impl MergedCollection {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Nombre d'enregistrements par valeur d'un attribut (provenance par pays)
    pub fn count_by(&self, field: &str) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for record in &self.records {
            let key = record.attr(field).unwrap_or("<null>").to_string();
            *counts.entry(key).or_insert(0) += 1;
        }
        counts
    }
}

/// Polygone de limite (ZEE, pays) issu du service de recherche
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryPolygon {
    /// Identifiant stable de la région (MRGID)
    pub id: u32,

    /// Nom de la région
    pub name: String,

    /// CRS de la géométrie
    pub crs: Crs,

    pub geometry: MultiPolygon<f64>,
}
