//! Systèmes de coordonnées identifiés par code EPSG

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Système de coordonnées de référence (code EPSG)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Crs(pub u32);

impl Crs {
    /// WGS84 géographique
    pub const WGS84: Crs = Crs(4326);

    pub fn epsg(self) -> u32 {
        self.0
    }

    /// Identifiant URN utilisé dans le membre `crs` des GeoJSON produits
    pub fn urn(self) -> String {
        format!("urn:ogc:def:crs:EPSG::{}", self.0)
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.0)
    }
}

/// Erreur de parsing d'un identifiant CRS
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseCrsError(pub String);

impl fmt::Display for ParseCrsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unrecognized CRS identifier: '{}'", self.0)
    }
}

impl std::error::Error for ParseCrsError {}

impl FromStr for Crs {
    type Err = ParseCrsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        let upper = raw.to_ascii_uppercase();

        // OGC CRS84 = WGS84 en ordre lon/lat
        if upper == "CRS84" || upper.ends_with(":CRS84") || upper.ends_with("/CRS84") {
            return Ok(Crs::WGS84);
        }

        // Le code est toujours le dernier segment numérique
        // (EPSG:4326, urn:ogc:def:crs:EPSG::4326, urn:ogc:def:crs:EPSG:6.6:4326,
        // http://www.opengis.net/def/crs/EPSG/0/4326, 4326)
        let is_epsg = upper.contains("EPSG") || upper.chars().all(|c| c.is_ascii_digit());
        let code = upper
            .rsplit(|c| c == ':' || c == '/')
            .next()
            .filter(|code| !code.is_empty() && code.chars().all(|c| c.is_ascii_digit()));

        match (is_epsg, code) {
            (true, Some(code)) => code
                .parse::<u32>()
                .map(Crs)
                .map_err(|_| ParseCrsError(raw.to_string())),
            _ => Err(ParseCrsError(raw.to_string())),
        }
    }
}

impl Serialize for Crs {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Crs {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
