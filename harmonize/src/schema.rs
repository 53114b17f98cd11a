//! Schéma canonique et vocabulaire contrôlé des statuts

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::Attributes;

/// Liste ordonnée et immuable des colonnes canoniques
///
/// Partagée en lecture seule par toutes les normalisations d'un run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    /// Nom du schéma (pour les logs)
    pub name: String,

    /// Colonnes descriptives, dans l'ordre de sortie
    pub fields: Vec<String>,

    /// Colonnes qui doivent être non nulles après normalisation
    #[serde(default)]
    pub required: Vec<String>,

    /// Colonne portant le vocabulaire contrôlé des statuts
    #[serde(default)]
    pub status_field: Option<String>,
}

impl Schema {
    /// Schéma des câbles sous-marins
    pub fn cables() -> Self {
        Self {
            name: "cables".to_string(),
            fields: [
                "country",
                "status",
                "name",
                "id",
                "owner",
                "technical_info",
                "voltage",
                "comment",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            required: vec!["country".to_string()],
            status_field: Some("status".to_string()),
        }
    }

    /// Schéma des limites administratives / ZEE
    pub fn boundaries() -> Self {
        Self {
            name: "boundaries".to_string(),
            fields: ["country", "mrgid", "borderFlag", "comment"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            required: vec!["mrgid".to_string()],
            status_field: None,
        }
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }

    /// Attributs vides (toutes les colonnes à null)
    pub fn empty_attributes(&self) -> Attributes {
        self.fields.iter().map(|f| (f.clone(), None)).collect()
    }

    /// Vérifie qu'un jeu d'attributs porte exactement les colonnes du schéma
    pub fn has_exact_keys(&self, attributes: &Attributes) -> bool {
        attributes.len() == self.fields.len() && self.fields.iter().all(|f| attributes.contains_key(f))
    }
}

/// Vocabulaire contrôlé des statuts de câble
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Status {
    InUse,
    Unknown,
    Approved,
    OutOfUse,
    UnderConstruction,
    Planned,
}

impl Status {
    pub const ALL: [Status; 6] = [
        Status::InUse,
        Status::Unknown,
        Status::Approved,
        Status::OutOfUse,
        Status::UnderConstruction,
        Status::Planned,
    ];

    /// Statuts exclus par défaut de la couche finale
    pub const DEFAULT_EXCLUDED: [Status; 3] =
        [Status::OutOfUse, Status::Unknown, Status::UnderConstruction];

    pub fn as_str(self) -> &'static str {
        match self {
            Status::InUse => "InUse",
            Status::Unknown => "Unknown",
            Status::Approved => "Approved",
            Status::OutOfUse => "OutOfUse",
            Status::UnderConstruction => "UnderConstruction",
            Status::Planned => "Planned",
        }
    }

    /// Reconnaît les graphies résiduelles ("planned", "in use", "OUT_OF_USE")
    pub fn parse_loose(value: &str) -> Option<Status> {
        let key = loose_key(value);
        if key.is_empty() {
            return None;
        }
        Status::ALL
            .into_iter()
            .find(|status| loose_key(status.as_str()) == key)
    }
}

/// Clé de comparaison: minuscules, sans espaces, `_` ni `-`
fn loose_key(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Status::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| {
                format!(
                    "Unknown status '{}'. Expected one of: {}",
                    s,
                    Status::ALL.map(Status::as_str).join(", ")
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cable_schema_order() {
        let schema = Schema::cables();
        assert_eq!(schema.fields.len(), 8);
        assert_eq!(schema.fields[0], "country");
        assert_eq!(schema.fields[7], "comment");
        assert_eq!(schema.status_field.as_deref(), Some("status"));
    }

    #[test]
    fn test_exact_keys() {
        let schema = Schema::boundaries();
        let mut attrs = schema.empty_attributes();
        assert!(schema.has_exact_keys(&attrs));

        attrs.insert("extra".to_string(), None);
        assert!(!schema.has_exact_keys(&attrs));

        attrs.remove("extra");
        attrs.remove("comment");
        assert!(!schema.has_exact_keys(&attrs));
    }

    #[test]
    fn test_status_strict_parse() {
        assert_eq!("InUse".parse::<Status>().unwrap(), Status::InUse);
        assert!("in use".parse::<Status>().is_err());
    }

    #[test]
    fn test_status_loose_parse() {
        assert_eq!(Status::parse_loose("planned"), Some(Status::Planned));
        assert_eq!(Status::parse_loose("In use"), Some(Status::InUse));
        assert_eq!(Status::parse_loose("OUT_OF_USE"), Some(Status::OutOfUse));
        assert_eq!(
            Status::parse_loose("under-construction"),
            Some(Status::UnderConstruction)
        );
        assert_eq!(Status::parse_loose("Toekomstig"), None);
        assert_eq!(Status::parse_loose("  "), None);
    }
}
