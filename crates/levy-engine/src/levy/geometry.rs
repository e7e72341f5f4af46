use serde::{Deserialize, Serialize};

use super::domain::{GeoPoint, Lga, LgaId};

/// Boundary defects rejected when LGA geometry is loaded. Queries never see
/// a malformed ring.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum BoundaryError {
    #[error("boundary ring needs at least 3 distinct vertices, found {found}")]
    TooFewVertices { found: usize },
    #[error("boundary vertex {index} is not a finite coordinate")]
    NonFiniteVertex { index: usize },
    #[error("boundary must contain at least one ring")]
    NoRings,
}

/// A closed polygon ring of (longitude, latitude) vertices.
///
/// The last vertex connects implicitly to the first; callers supply the ring
/// without repeating the closing vertex.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundaryRing {
    vertices: Vec<GeoPoint>,
}

impl BoundaryRing {
    pub fn new(vertices: Vec<GeoPoint>) -> Result<Self, BoundaryError> {
        for (index, vertex) in vertices.iter().enumerate() {
            if !vertex.is_finite() {
                return Err(BoundaryError::NonFiniteVertex { index });
            }
        }

        let mut distinct: Vec<GeoPoint> = Vec::with_capacity(vertices.len());
        for vertex in &vertices {
            if !distinct.iter().any(|seen| seen == vertex) {
                distinct.push(*vertex);
            }
        }
        if distinct.len() < 3 {
            return Err(BoundaryError::TooFewVertices {
                found: distinct.len(),
            });
        }

        Ok(Self { vertices })
    }

    pub fn vertices(&self) -> &[GeoPoint] {
        &self.vertices
    }

    /// Even-odd ray cast: count edge crossings of a horizontal ray running
    /// east from the point.
    pub fn contains(&self, point: &GeoPoint) -> bool {
        let vertices = &self.vertices;
        let mut inside = false;
        let mut j = vertices.len() - 1;

        for i in 0..vertices.len() {
            let a = vertices[i];
            let b = vertices[j];

            let crosses = (a.latitude > point.latitude) != (b.latitude > point.latitude);
            if crosses {
                let intersect_lon = (b.longitude - a.longitude)
                    * (point.latitude - a.latitude)
                    / (b.latitude - a.latitude)
                    + a.longitude;
                if point.longitude < intersect_lon {
                    inside = !inside;
                }
            }

            j = i;
        }

        inside
    }
}

/// One or more rings forming an LGA's jurisdictional area.
///
/// A point is inside when an odd number of rings contain it, which covers
/// both disjoint unions and boundaries with holes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LgaBoundary {
    rings: Vec<BoundaryRing>,
}

impl LgaBoundary {
    pub fn new(rings: Vec<BoundaryRing>) -> Result<Self, BoundaryError> {
        if rings.is_empty() {
            return Err(BoundaryError::NoRings);
        }
        Ok(Self { rings })
    }

    pub fn single(ring: BoundaryRing) -> Self {
        Self { rings: vec![ring] }
    }

    pub fn rings(&self) -> &[BoundaryRing] {
        &self.rings
    }

    pub fn contains(&self, point: &GeoPoint) -> bool {
        let containing = self
            .rings
            .iter()
            .filter(|ring| ring.contains(point))
            .count();
        containing % 2 == 1
    }
}

/// Resolve the LGA owning a coordinate.
///
/// Candidates are tested in stable input order. When more than one boundary
/// claims the point (a reading exactly on a shared edge), the vehicle's
/// registered LGA wins if it is among the matches, else the first match in
/// input order. Downstream charging depends on this determinism.
///
/// `None` means the point is outside every known jurisdiction, which is a
/// legitimate outcome rather than an error.
pub fn resolve_lga<'a>(
    point: &GeoPoint,
    candidates: &'a [Lga],
    registered: Option<&LgaId>,
) -> Option<&'a Lga> {
    let matches: Vec<&Lga> = candidates
        .iter()
        .filter(|lga| lga.boundary.contains(point))
        .collect();

    if let Some(home) = registered {
        if let Some(lga) = matches.iter().find(|lga| &lga.id == home) {
            return Some(lga);
        }
    }

    matches.first().copied()
}
