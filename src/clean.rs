use geo::algorithm::buffer::Buffer;
use geo::{Geometry, MultiPolygon};
use log::debug;

use crate::{Error, GeoCollection, Result};

/// Parameters for `remove_small_objects_and_holes`, in the units of the working frame (metres
/// for geographic input).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CleanOptions {
    /// Pieces narrower than this disappear
    pub remove_small_objects: f64,
    /// Holes narrower than this are filled
    pub remove_small_holes: f64,
}

impl CleanOptions {
    pub fn new(remove_small_objects: f64, remove_small_holes: f64) -> Self {
        Self {
            remove_small_objects,
            remove_small_holes,
        }
    }

    /// Erode, dilate, erode
    fn radii(&self) -> [f64; 3] {
        let objects = self.remove_small_objects / 2.0;
        let holes = self.remove_small_holes / 2.0;
        [-objects, objects + holes, -holes]
    }
}

/// Morphologically open then close every geometry: islands narrower than
/// `remove_small_objects` vanish and holes narrower than `remove_small_holes` get filled. The
/// result has one (possibly empty) multipolygon per input, in the input's frame.
pub fn remove_small_objects_and_holes(
    geometry: &GeoCollection,
    options: &CleanOptions,
) -> Result<GeoCollection<MultiPolygon>> {
    for value in [options.remove_small_objects, options.remove_small_holes] {
        if !(value.is_finite() && value >= 0.0) {
            return Err(Error::InvalidInput(format!(
                "sizes must be finite and non-negative, not {value}"
            )));
        }
    }
    if geometry.is_empty() {
        return Ok(GeoCollection {
            geometries: Vec::new(),
            crs: geometry.crs,
        });
    }

    let working = geometry.working_frame()?;
    let projected = geometry.in_frame(working)?;
    let radii = options.radii();
    debug!("Cleaning {} geometries with radii {radii:?}", projected.len());

    let cleaned = GeoCollection {
        geometries: projected.iter().map(|g| clean(g, radii)).collect(),
        crs: working,
    };
    match geometry.crs {
        Some(crs) => cleaned.to_crs(crs),
        None => Ok(cleaned),
    }
}

fn clean(geometry: &Geometry, radii: [f64; 3]) -> MultiPolygon {
    let mut current: Option<MultiPolygon> = None;
    // A zero-width buffer is the identity on polygons, so skip it
    for radius in radii.into_iter().filter(|r| *r != 0.0) {
        current = Some(match current {
            Some(mp) => mp.buffer(radius),
            None => geometry.buffer(radius),
        });
    }
    current.unwrap_or_else(|| polygonal(geometry))
}

/// Only the areal parts of a geometry
fn polygonal(geometry: &Geometry) -> MultiPolygon {
    match geometry {
        Geometry::Polygon(p) => MultiPolygon::new(vec![p.clone()]),
        Geometry::MultiPolygon(mp) => mp.clone(),
        Geometry::Rect(r) => MultiPolygon::new(vec![r.to_polygon()]),
        Geometry::Triangle(t) => MultiPolygon::new(vec![t.to_polygon()]),
        Geometry::GeometryCollection(gc) => {
            MultiPolygon::new(gc.iter().flat_map(|g| polygonal(g).0).collect())
        }
        Geometry::Point(_)
        | Geometry::MultiPoint(_)
        | Geometry::Line(_)
        | Geometry::LineString(_)
        | Geometry::MultiLineString(_) => MultiPolygon::new(Vec::new()),
    }
}
