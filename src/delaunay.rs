//! Delaunay triangulation of a point set, by index.

use std::collections::HashMap;

use geo::{Coord, LineString, TriangulateSpade};

use crate::{Error, Result};

/// Triangulate `points`, returning counter-clockwise triangles as indices into `points`. Inputs
/// must be distinct. Returns nothing when every point is collinear, or there are fewer than 3.
pub fn triangulate(points: &[Coord]) -> Result<Vec<[usize; 3]>> {
    if points.len() < 3 {
        return Ok(Vec::new());
    }

    let index: HashMap<(u64, u64), usize> = points
        .iter()
        .enumerate()
        .map(|(idx, c)| (key(*c), idx))
        .collect();

    // Only the vertices of the line matter for an unconstrained triangulation
    let triangles = LineString::new(points.to_vec())
        .unconstrained_triangulation()
        .map_err(|err| Error::DegenerateGeometry(format!("triangulation failed: {err}")))?;

    triangles
        .into_iter()
        .map(|tri| {
            let [a, b, c] = tri.to_array().map(|corner| index.get(&key(corner)).copied());
            match (a, b, c) {
                (Some(a), Some(b), Some(c)) if orient(points[a], points[b], points[c]) < 0.0 => {
                    Ok([a, c, b])
                }
                (Some(a), Some(b), Some(c)) => Ok([a, b, c]),
                _ => Err(Error::DegenerateGeometry(
                    "triangulation produced an unknown vertex".to_string(),
                )),
            }
        })
        .collect()
}

fn key(c: Coord) -> (u64, u64) {
    (c.x.to_bits(), c.y.to_bits())
}

/// Twice the signed area; positive when counter-clockwise.
fn orient(a: Coord, b: Coord, c: Coord) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

pub(crate) fn edges([a, b, c]: [usize; 3]) -> [(usize, usize); 3] {
    [(a, b), (b, c), (c, a)]
}

pub(crate) fn undirected(a: usize, b: usize) -> (usize, usize) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}
