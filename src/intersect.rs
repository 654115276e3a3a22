use geo::{BoundingRect, Geometry, PreparedGeometry, Rect, Relate};
use log::debug;
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{RTree, AABB};

use crate::{Error, GeoCollection, Grid, Result};

/// Test every geometry in `left` against every geometry in `right`. `right` is first reprojected
/// into the frame of `left`. Entry `(i, j)` of the result is true iff `left[i]` intersects
/// `right[j]`.
pub fn intersects_all_with_all(
    left: &GeoCollection,
    right: &GeoCollection,
) -> Result<Grid<bool>> {
    if left.is_empty() || right.is_empty() {
        return Err(Error::InvalidInput(format!(
            "can't intersect collections of {} and {} geometries",
            left.len(),
            right.len()
        )));
    }
    let crs = left
        .crs
        .ok_or_else(|| Error::InvalidInput("first collection has no reference frame".into()))?;
    if right.crs.is_none() {
        return Err(Error::InvalidInput(
            "second collection has no reference frame to reproject from".into(),
        ));
    }
    let right = right.to_crs(crs)?;

    let left_prepared: Vec<PreparedGeometry<'_, &Geometry>> =
        left.iter().map(PreparedGeometry::from).collect();
    let right_prepared: Vec<PreparedGeometry<'_, &Geometry>> =
        right.iter().map(PreparedGeometry::from).collect();

    // Only pairs with overlapping envelopes need the real predicate. Empty geometries have no
    // envelope and never intersect anything.
    let tree = RTree::bulk_load(
        right
            .iter()
            .enumerate()
            .filter_map(|(j, geom)| {
                let rect = geom.bounding_rect()?;
                Some(GeomWithData::new(
                    Rectangle::from_corners(corner_min(&rect), corner_max(&rect)),
                    j,
                ))
            })
            .collect(),
    );

    let mut grid = Grid::new(right.len(), left.len(), false);
    let mut candidates = 0;
    for (i, geom) in left.iter().enumerate() {
        let Some(rect) = geom.bounding_rect() else {
            continue;
        };
        let envelope = AABB::from_corners(corner_min(&rect), corner_max(&rect));
        for obj in tree.locate_in_envelope_intersecting(&envelope) {
            let j = obj.data;
            candidates += 1;
            if left_prepared[i].relate(&right_prepared[j]).is_intersects() {
                grid.set(i, j, true);
            }
        }
    }
    debug!(
        "Tested {candidates} of {} pairs with the intersects predicate",
        left.len() * right.len()
    );

    Ok(grid)
}

fn corner_min(rect: &Rect) -> [f64; 2] {
    [rect.min().x, rect.min().y]
}

fn corner_max(rect: &Rect) -> [f64; 2] {
    [rect.max().x, rect.max().y]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Crs;
    use geo::{line_string, point, Coord, LineString, Polygon};

    fn square(x1: f64, y1: f64, x2: f64, y2: f64) -> Geometry {
        Rect::new(Coord { x: x1, y: y1 }, Coord { x: x2, y: y2 })
            .to_polygon()
            .into()
    }

    #[test]
    fn test_disjoint_and_overlapping_boxes() {
        let left = GeoCollection::new(vec![square(0., 0., 1., 1.)], Crs::Planar);

        let far = GeoCollection::new(vec![square(2., 2., 3., 3.)], Crs::Planar);
        assert_eq!(
            intersects_all_with_all(&left, &far).unwrap().to_nested(),
            vec![vec![false]]
        );

        let overlapping = GeoCollection::new(vec![square(0.5, 0.5, 1.5, 1.5)], Crs::Planar);
        assert_eq!(
            intersects_all_with_all(&left, &overlapping)
                .unwrap()
                .to_nested(),
            vec![vec![true]]
        );
    }

    #[test]
    fn test_shape_and_transpose() {
        let left = GeoCollection::new(
            vec![
                square(0., 0., 1., 1.),
                square(5., 5., 6., 6.),
                point!(x: 0.5, y: 5.5).into(),
            ],
            Crs::Planar,
        );
        let right = GeoCollection::new(
            vec![
                line_string![(x: -1., y: 0.5), (x: 10., y: 0.5)].into(),
                // Touching the corner counts
                square(6., 6., 7., 7.),
            ],
            Crs::Planar,
        );

        let forward = intersects_all_with_all(&left, &right).unwrap();
        assert_eq!(forward.shape(), (3, 2));
        assert_eq!(
            forward.to_nested(),
            vec![vec![true, false], vec![false, true], vec![false, false]]
        );

        let backward = intersects_all_with_all(&right, &left).unwrap();
        assert_eq!(backward, forward.transpose());
    }

    #[test]
    fn test_self_diagonal() {
        let geoms = GeoCollection::new(
            vec![
                square(0., 0., 1., 1.),
                square(10., 0., 11., 1.),
                line_string![(x: 20., y: 0.), (x: 21., y: 1.)].into(),
            ],
            Crs::Planar,
        );
        let grid = intersects_all_with_all(&geoms, &geoms).unwrap();
        for i in 0..geoms.len() {
            assert!(grid.get(i, i));
        }
        assert_eq!(grid.data.iter().filter(|x| **x).count(), 3);
    }

    #[test]
    fn test_empty_members_never_intersect() {
        let left = GeoCollection::new(
            vec![Polygon::new(LineString::new(vec![]), vec![]).into()],
            Crs::Planar,
        );
        let right = GeoCollection::new(vec![square(0., 0., 1., 1.)], Crs::Planar);
        assert_eq!(
            intersects_all_with_all(&left, &right).unwrap().to_nested(),
            vec![vec![false]]
        );
    }

    #[test]
    fn test_invalid_input() {
        let some = GeoCollection::new(vec![square(0., 0., 1., 1.)], Crs::Planar);
        let none = GeoCollection::new(Vec::new(), Crs::Planar);
        assert!(matches!(
            intersects_all_with_all(&some, &none),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            intersects_all_with_all(&none, &some),
            Err(Error::InvalidInput(_))
        ));

        let frameless = GeoCollection::without_crs(vec![square(0., 0., 1., 1.)]);
        assert!(matches!(
            intersects_all_with_all(&some, &frameless),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_reprojects_second_collection() {
        // A ~100m square around a point in zone 31N, expressed in lon/lat
        let lonlat = GeoCollection::new(
            vec![square(2.999, 41.999, 3.001, 42.001)],
            Crs::Wgs84,
        );
        let utm = lonlat
            .to_crs(Crs::Utm {
                zone: 31,
                north: true,
            })
            .unwrap();
        let center = utm.bounds().unwrap().center();
        let probe = GeoCollection::new(
            vec![
                point!(x: center.x, y: center.y).into(),
                point!(x: center.x + 10_000.0, y: center.y).into(),
            ],
            utm.crs.unwrap(),
        );

        let grid = intersects_all_with_all(&lonlat, &probe).unwrap();
        assert_eq!(grid.to_nested(), vec![vec![true, false]]);
    }
}
