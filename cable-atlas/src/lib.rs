//! # cable-atlas
//!
//! Construction de couches harmonisées (câbles sous-marins, ZEE) à partir de
//! fichiers GeoJSON nationaux et de services WFS.
//!
//! ## Features
//!
//! - Configuration déclarative par source (presets embarqués ou fichier JSON)
//! - Récupération concurrente des sources, avec retry sur les erreurs transitoires
//! - Découpage optionnel contre un polygone de limite (gazetteer local ou WFS)
//! - Export GeoJSON dans chaque CRS de publication
//! - Rapport de run (statut, provenance, comptages)
//!
//! ## Usage CLI
//!
//! ```bash
//! # Couche câbles depuis le preset embarqué
//! cable-atlas run --config north-sea-cables --output ./out
//!
//! # Couches disponibles sur un service WFS
//! cable-atlas layers --url https://example.org/geoserver/wfs
//! ```

pub mod boundary;
pub mod config;
pub mod export;
pub mod pipeline;
pub mod report;
pub mod sources;

pub use config::Config;
pub use pipeline::{run, RunOptions};
pub use report::{RunReport, RunStatus};
