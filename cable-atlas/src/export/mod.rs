//! Export des couches harmonisées

pub mod geojson;

pub use geojson::{export_collection, output_path, Layout};
