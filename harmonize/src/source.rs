//! Jeux de données sources bruts (colonnes arbitraires, CRS éventuellement absent)

use geojson::{Feature, FeatureCollection, GeoJson, JsonObject, JsonValue};
use serde_json::Map;

use crate::{Crs, HarmonizeError};

/// Enregistrement brut d'une source
#[derive(Debug, Clone, Default)]
pub struct RawRecord {
    /// Attributs tels que publiés par la source
    pub properties: Map<String, JsonValue>,

    /// Géométrie d'origine, toutes ordonnées conservées (XY, XYZ, XYZM)
    pub geometry: Option<geojson::Geometry>,

    /// CRS déclaré sur l'enregistrement lui-même
    pub crs: Option<Crs>,
}

/// Table brute d'une source (un pays / un fournisseur)
#[derive(Debug, Clone)]
pub struct SourceDataset {
    /// Nom de la source (identifie la source dans les erreurs et le rapport)
    pub name: String,

    /// Colonnes disponibles, dans l'ordre de première apparition
    pub columns: Vec<String>,

    /// CRS déclaré au niveau du jeu de données
    pub crs: Option<Crs>,

    pub records: Vec<RawRecord>,
}

impl SourceDataset {
    pub fn new(name: impl Into<String>, crs: Option<Crs>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            crs,
            records: Vec::new(),
        }
    }

    /// Ajoute un enregistrement et étend la liste des colonnes
    pub fn push(&mut self, record: RawRecord) {
        for key in record.properties.keys() {
            if !self.has_column(key) {
                self.columns.push(key.clone());
            }
        }
        self.records.push(record);
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Parse un document GeoJSON (réponse WFS ou fichier local)
    pub fn parse_geojson(name: &str, content: &str) -> Result<Self, HarmonizeError> {
        let geojson: GeoJson = content
            .parse()
            .map_err(|e| HarmonizeError::unavailable(name, format!("invalid GeoJSON: {}", e)))?;
        Self::from_geojson(name, geojson)
    }

    /// Construit un jeu de données depuis n'importe quel objet GeoJSON
    ///
    /// Une Feature ou une Geometry isolée donne un jeu à un seul enregistrement.
    pub fn from_geojson(name: &str, geojson: GeoJson) -> Result<Self, HarmonizeError> {
        match geojson {
            GeoJson::FeatureCollection(fc) => Self::from_feature_collection(name, fc),
            GeoJson::Feature(feature) => {
                let mut dataset = Self::new(name, None);
                dataset.push(raw_record(name, feature)?);
                Ok(dataset)
            }
            GeoJson::Geometry(geometry) => {
                let mut dataset = Self::new(name, None);
                dataset.push(RawRecord {
                    geometry: Some(geometry),
                    ..Default::default()
                });
                Ok(dataset)
            }
        }
    }

    /// Construit un jeu de données depuis une FeatureCollection
    ///
    /// Le CRS est lu dans le membre `crs` (GeoJSON 2008), absent sinon.
    pub fn from_feature_collection(
        name: &str,
        fc: FeatureCollection,
    ) -> Result<Self, HarmonizeError> {
        let crs = crs_member(name, fc.foreign_members.as_ref())?;
        let mut dataset = Self::new(name, crs);
        dataset.records.reserve(fc.features.len());

        for feature in fc.features {
            dataset.push(raw_record(name, feature)?);
        }

        Ok(dataset)
    }
}

fn raw_record(name: &str, feature: Feature) -> Result<RawRecord, HarmonizeError> {
    Ok(RawRecord {
        crs: crs_member(name, feature.foreign_members.as_ref())?,
        properties: feature.properties.unwrap_or_default(),
        geometry: feature.geometry,
    })
}

/// Lit le membre `crs` d'un objet GeoJSON
///
/// Formes acceptées: `{"type":"name","properties":{"name":"EPSG:4326"}}`
/// et `{"type":"EPSG","properties":{"code":4326}}`. Un membre présent mais
/// illisible est une erreur: on ne devine jamais un CRS.
fn crs_member(name: &str, members: Option<&JsonObject>) -> Result<Option<Crs>, HarmonizeError> {
    let Some(crs) = members.and_then(|m| m.get("crs")) else {
        return Ok(None);
    };
    if crs.is_null() {
        return Ok(None);
    }

    let properties = crs.get("properties");
    let declared = properties
        .and_then(|p| p.get("name"))
        .and_then(JsonValue::as_str)
        .map(str::to_string)
        .or_else(|| {
            properties
                .and_then(|p| p.get("code"))
                .map(|code| match code {
                    JsonValue::String(s) => s.clone(),
                    other => other.to_string(),
                })
        });

    let Some(declared) = declared else {
        return Err(HarmonizeError::crs(
            name,
            format!("unreadable crs member: {}", crs),
        ));
    };

    declared
        .parse::<Crs>()
        .map(Some)
        .map_err(|e| HarmonizeError::crs(name, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const COLLECTION: &str = r#"{
        "type": "FeatureCollection",
        "crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::28992"}},
        "features": [
            {"type": "Feature", "properties": {"naam": "A", "version": "Ingebruik"},
             "geometry": {"type": "LineString", "coordinates": [[0, 0, 5], [1, 1, 5]]}},
            {"type": "Feature", "properties": {"naam": "B", "eigenaar": "TenneT"},
             "geometry": null}
        ]
    }"#;

    #[test]
    fn test_parse_feature_collection() {
        let dataset = SourceDataset::parse_geojson("nl", COLLECTION).unwrap();
        assert_eq!(dataset.name, "nl");
        assert_eq!(dataset.crs, Some(Crs(28992)));
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.columns, vec!["naam", "version", "eigenaar"]);
        assert!(dataset.records[0].geometry.is_some());
        assert!(dataset.records[1].geometry.is_none());
    }

    #[test]
    fn test_collection_without_crs() {
        let content = r#"{"type": "FeatureCollection", "features": []}"#;
        let dataset = SourceDataset::parse_geojson("be", content).unwrap();
        assert_eq!(dataset.crs, None);
        assert!(dataset.is_empty());
    }

    #[test]
    fn test_feature_level_crs() {
        let content = r#"{"type": "FeatureCollection", "features": [
            {"type": "Feature", "crs": {"type": "EPSG", "properties": {"code": 3035}},
             "properties": {}, "geometry": {"type": "Point", "coordinates": [1, 2]}}
        ]}"#;
        let dataset = SourceDataset::parse_geojson("de", content).unwrap();
        assert_eq!(dataset.crs, None);
        assert_eq!(dataset.records[0].crs, Some(Crs(3035)));
    }

    #[test]
    fn test_unreadable_crs_fails() {
        let content = r#"{"type": "FeatureCollection",
            "crs": {"type": "name", "properties": {"name": "Lambert 93"}},
            "features": []}"#;
        let err = SourceDataset::parse_geojson("fr", content).unwrap_err();
        assert!(matches!(err, HarmonizeError::Crs { .. }));
    }

    #[test]
    fn test_invalid_payload_is_unavailable() {
        let err = SourceDataset::parse_geojson("dk", "<html>503</html>").unwrap_err();
        assert!(err.is_unavailable());
    }

    #[test]
    fn test_single_geometry() {
        let content = r#"{"type": "LineString", "coordinates": [[0, 0], [1, 0]]}"#;
        let dataset = SourceDataset::parse_geojson("single", content).unwrap();
        assert_eq!(dataset.len(), 1);
        assert!(dataset.columns.is_empty());
    }
}
