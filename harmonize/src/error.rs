//! Types d'erreurs pour le crate harmonize

use thiserror::Error;

/// Erreurs pouvant survenir pendant l'harmonisation d'une source
#[derive(Debug, Error)]
pub enum HarmonizeError {
    /// Source distante ou fichier local inaccessible
    #[error("Source unavailable ({dataset}): {reason}")]
    SourceUnavailable { dataset: String, reason: String },

    /// Mapping de colonnes incompatible avec le schéma réel de la source
    #[error("Schema error in {dataset}: {reason}")]
    Schema { dataset: String, reason: String },

    /// CRS absent, contradictoire ou mélangé dans un même jeu de données
    #[error("CRS error in {dataset}: {reason}")]
    Crs { dataset: String, reason: String },

    /// Géométrie inexploitable (type non supporté, ordonnées manquantes)
    #[error("Invalid geometry in {dataset}: {reason}")]
    Geometry { dataset: String, reason: String },

    /// Échec de la reprojection
    #[error("Reprojection from {from} to {to} failed: {reason}")]
    Reprojection {
        from: String,
        to: String,
        reason: String,
    },

    /// Échec d'une recherche de limite (gazetteer)
    #[error("Boundary lookup failed for region {id}: {reason}")]
    Lookup { id: u32, reason: String },
}

impl HarmonizeError {
    /// Crée une erreur de source indisponible
    pub fn unavailable(dataset: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            dataset: dataset.into(),
            reason: reason.into(),
        }
    }

    /// Crée une erreur de schéma avec contexte
    pub fn schema(dataset: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Schema {
            dataset: dataset.into(),
            reason: reason.into(),
        }
    }

    /// Crée une erreur de CRS avec contexte
    pub fn crs(dataset: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Crs {
            dataset: dataset.into(),
            reason: reason.into(),
        }
    }

    /// Crée une erreur de géométrie invalide
    pub fn geometry(dataset: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Geometry {
            dataset: dataset.into(),
            reason: reason.into(),
        }
    }

    /// Vrai si l'erreur relève d'une source indisponible (skip-and-continue)
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::SourceUnavailable { .. } | Self::Lookup { .. })
    }

    /// Catégorie courte pour le rapport
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SourceUnavailable { .. } => "source_unavailable",
            Self::Schema { .. } => "schema",
            Self::Crs { .. } => "crs",
            Self::Geometry { .. } => "geometry",
            Self::Reprojection { .. } => "reprojection",
            Self::Lookup { .. } => "lookup",
        }
    }
}
