//! Découpage par différence géométrique contre un polygone de limite
//!
//! Seule la partie extérieure au masque est conservée (ex: retirer les
//! tronçons terrestres d'un câble pour ne garder que la partie marine).

use geo::{
    BooleanOps, Contains, Geometry, GeometryCollection, Intersects, LineString, MultiLineString,
    MultiPoint, MultiPolygon, Point,
};

/// Résultat du découpage d'une géométrie
#[derive(Debug, Clone, PartialEq)]
pub enum ClipOutcome {
    /// Géométrie entièrement hors du masque
    Unchanged,
    /// Partie extérieure au masque
    Clipped(Geometry<f64>),
    /// Géométrie entièrement dans le masque
    Empty,
}

/// Différence `geometry - mask`
pub fn clip_outside(geometry: &Geometry<f64>, mask: &MultiPolygon<f64>) -> ClipOutcome {
    match geometry {
        Geometry::LineString(ls) => {
            if !ls.intersects(mask) {
                return ClipOutcome::Unchanged;
            }
            clip_lines(&MultiLineString::new(vec![ls.clone()]), mask, true)
        }
        Geometry::MultiLineString(mls) => {
            if !mls.intersects(mask) {
                return ClipOutcome::Unchanged;
            }
            clip_lines(mls, mask, false)
        }
        Geometry::Polygon(p) => {
            if !p.intersects(mask) {
                return ClipOutcome::Unchanged;
            }
            clip_polygons(&MultiPolygon::new(vec![p.clone()]), mask, true)
        }
        Geometry::MultiPolygon(mp) => {
            if !mp.intersects(mask) {
                return ClipOutcome::Unchanged;
            }
            clip_polygons(mp, mask, false)
        }
        Geometry::Point(p) => {
            if mask.contains(p) {
                ClipOutcome::Empty
            } else {
                ClipOutcome::Unchanged
            }
        }
        Geometry::MultiPoint(mp) => {
            let kept: Vec<Point<f64>> = mp.iter().filter(|p| !mask.contains(*p)).copied().collect();
            if kept.is_empty() {
                ClipOutcome::Empty
            } else if kept.len() == mp.0.len() {
                ClipOutcome::Unchanged
            } else {
                ClipOutcome::Clipped(Geometry::MultiPoint(MultiPoint::new(kept)))
            }
        }
        Geometry::GeometryCollection(gc) => {
            let mut changed = false;
            let mut kept = Vec::with_capacity(gc.0.len());
            for member in &gc.0 {
                match clip_outside(member, mask) {
                    ClipOutcome::Unchanged => kept.push(member.clone()),
                    ClipOutcome::Clipped(g) => {
                        changed = true;
                        kept.push(g);
                    }
                    ClipOutcome::Empty => changed = true,
                }
            }
            if kept.is_empty() {
                ClipOutcome::Empty
            } else if changed {
                ClipOutcome::Clipped(Geometry::GeometryCollection(GeometryCollection::new_from(
                    kept,
                )))
            } else {
                ClipOutcome::Unchanged
            }
        }
        // Line, Rect, Triangle: jamais produits par le conditionneur
        _ => ClipOutcome::Unchanged,
    }
}

fn clip_lines(lines: &MultiLineString<f64>, mask: &MultiPolygon<f64>, single: bool) -> ClipOutcome {
    let mut outside: Vec<LineString<f64>> = mask
        .clip(lines, true)
        .0
        .into_iter()
        .filter(|ls| ls.0.len() >= 2)
        .collect();

    match outside.len() {
        0 => ClipOutcome::Empty,
        1 if single => ClipOutcome::Clipped(Geometry::LineString(outside.remove(0))),
        _ => ClipOutcome::Clipped(Geometry::MultiLineString(MultiLineString::new(outside))),
    }
}

fn clip_polygons(polygons: &MultiPolygon<f64>, mask: &MultiPolygon<f64>, single: bool) -> ClipOutcome {
    let mut outside = polygons.difference(mask);

    match outside.0.len() {
        0 => ClipOutcome::Empty,
        1 if single => ClipOutcome::Clipped(Geometry::Polygon(outside.0.remove(0))),
        _ => ClipOutcome::Clipped(Geometry::MultiPolygon(outside)),
    }
}
