//! Stateless helpers for geospatial analysis: pairwise intersection tests, alpha shapes,
//! morphological cleanup of polygons, and splitting self-intersecting lines.

mod alpha_shape;
mod clean;
mod collection;
mod complex_split;
mod crs;
mod delaunay;
mod error;
mod grid;
mod intersect;

pub use self::alpha_shape::{alpha_shape, AlphaShapeOptions};
pub use self::clean::{remove_small_objects_and_holes, CleanOptions};
pub use self::collection::GeoCollection;
pub use self::complex_split::{complex_split, DEFAULT_SPLIT_TOLERANCE};
pub use self::crs::Crs;
pub use self::error::{Error, Result};
pub use self::grid::Grid;
pub use self::intersect::intersects_all_with_all;
