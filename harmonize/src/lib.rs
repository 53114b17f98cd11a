//! # harmonize
//!
//! Harmonisation de jeux de données géographiques hétérogènes (câbles
//! sous-marins, ZEE) vers un schéma et un CRS uniques.
//!
//! ## Étapes
//!
//! - [`source`]: jeux bruts, colonnes arbitraires, CRS éventuellement absent
//! - [`normalize`]: renommage, recodage, sélection des colonnes canoniques
//! - [`condition`]: résolution du CRS, réduction 2-D, reprojection, découpage
//! - [`merge`]: concaténation des sources dans l'ordre de la configuration
//! - [`finalize`]: longueurs dérivées, recodage et filtrage des statuts
//! - [`export`]: une copie reprojetée par CRS de publication
//!
//! ## Usage
//!
//! ```rust,ignore
//! use harmonize::{condition, finalize, merge, normalize, Crs, Schema, SourceDataset};
//!
//! let schema = Schema::cables();
//! let raw = SourceDataset::parse_geojson("nl", &content)?;
//! let normalized = normalize(raw, &schema, &mapping, &rules)?;
//! let canonical = condition(normalized, None, Crs::WGS84, None)?;
//! let merged = merge(&schema, Crs::WGS84, vec![canonical])?;
//! let outcome = finalize(merged, &FinalizeRules::default())?;
//! ```

pub mod condition;
pub mod crs;
pub mod error;
pub mod export;
pub mod finalize;
pub mod merge;
pub mod normalize;
pub mod reproject;
pub mod schema;
pub mod source;
pub mod types;

pub use condition::{condition, resolve_crs};
pub use crs::{Crs, ParseCrsError};
pub use error::HarmonizeError;
pub use export::export_all;
pub use finalize::{finalize, FinalizeOutcome, FinalizeRules, LengthMeter, UnknownStatusPolicy};
pub use merge::merge;
pub use normalize::{normalize, ColumnMapping, RecodeRule};
pub use schema::{Schema, Status};
pub use source::{RawRecord, SourceDataset};
pub use types::{
    Attributes, BoundaryPolygon, CanonicalDataset, CanonicalRecord, Length, LengthUnit,
    MergedCollection, NormalizedDataset,
};
