//! Reprojection de géométries avec PROJ
//!
//! La transformation effective n'est disponible qu'avec le feature `reproject`;
//! sans lui, seule l'identité (source == cible) est acceptée.

#[cfg(feature = "reproject")]
use geo::{Coord, Geometry, MapCoords, MultiPolygon};
#[cfg(feature = "reproject")]
use proj::Proj;

use crate::{Crs, HarmonizeError};

/// Reprojection de géométries entre deux CRS
#[cfg(feature = "reproject")]
pub struct Reprojector {
    /// `None` quand source == cible
    proj: Option<Proj>,
    source: Crs,
    target: Crs,
}

#[cfg(feature = "reproject")]
impl Reprojector {
    /// Crée un nouveau reprojector entre deux CRS
    pub fn new(source: Crs, target: Crs) -> Result<Self, HarmonizeError> {
        if source == target {
            return Ok(Self {
                proj: None,
                source,
                target,
            });
        }

        let proj = Proj::new_known_crs(&source.to_string(), &target.to_string(), None)
            .map_err(|e| reprojection_error(source, target, e))?;

        Ok(Self {
            proj: Some(proj),
            source,
            target,
        })
    }

    /// Retourne le CRS source
    pub fn source(&self) -> Crs {
        self.source
    }

    /// Retourne le CRS cible
    pub fn target(&self) -> Crs {
        self.target
    }

    /// Transforme une géométrie (tous types, coordonnée par coordonnée)
    pub fn transform_geometry(&self, geom: &Geometry) -> Result<Geometry, HarmonizeError> {
        match &self.proj {
            None => Ok(geom.clone()),
            Some(proj) => geom.try_map_coords(|c| self.convert(proj, c)),
        }
    }

    /// Transforme un MultiPolygon (masques de découpage, limites)
    pub fn transform_multi_polygon(&self, mp: &MultiPolygon) -> Result<MultiPolygon, HarmonizeError> {
        match &self.proj {
            None => Ok(mp.clone()),
            Some(proj) => mp.try_map_coords(|c| self.convert(proj, c)),
        }
    }

    fn convert(&self, proj: &Proj, coord: Coord) -> Result<Coord, HarmonizeError> {
        let (x, y) = proj
            .convert((coord.x, coord.y))
            .map_err(|e| reprojection_error(self.source, self.target, e))?;
        if !x.is_finite() || !y.is_finite() {
            return Err(reprojection_error(
                self.source,
                self.target,
                format!("non-finite result for ({}, {})", coord.x, coord.y),
            ));
        }
        Ok(Coord { x, y })
    }
}

#[cfg(feature = "reproject")]
fn reprojection_error(source: Crs, target: Crs, e: impl std::fmt::Display) -> HarmonizeError {
    HarmonizeError::Reprojection {
        from: source.to_string(),
        to: target.to_string(),
        reason: e.to_string(),
    }
}


/// Vérifie si la reprojection est disponible
pub fn is_available() -> bool {
    cfg!(feature = "reproject")
}

#[cfg(not(feature = "reproject"))]
use geo::{Geometry, MultiPolygon};

/// Reprojector factice - pas de reprojection disponible
#[cfg(not(feature = "reproject"))]
pub struct Reprojector {
    crs: Crs,
}

#[cfg(not(feature = "reproject"))]
impl Reprojector {
    /// Accepte uniquement l'identité sans le feature `reproject`
    pub fn new(source: Crs, target: Crs) -> Result<Self, HarmonizeError> {
        if source == target {
            Ok(Self { crs: source })
        } else {
            Err(HarmonizeError::Reprojection {
                from: source.to_string(),
                to: target.to_string(),
                reason: "reprojection requires the 'reproject' feature. \
                         Build with: cargo build --features reproject"
                    .to_string(),
            })
        }
    }

    pub fn source(&self) -> Crs {
        self.crs
    }

    pub fn target(&self) -> Crs {
        self.crs
    }

    /// Retourne la géométrie inchangée
    pub fn transform_geometry(&self, geom: &Geometry) -> Result<Geometry, HarmonizeError> {
        Ok(geom.clone())
    }

    pub fn transform_multi_polygon(&self, mp: &MultiPolygon) -> Result<MultiPolygon, HarmonizeError> {
        Ok(mp.clone())
    }
}
