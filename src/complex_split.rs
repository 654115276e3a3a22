use geo::algorithm::buffer::Buffer;
use geo::algorithm::coordinate_position::CoordPos;
use geo::algorithm::dimensions::Dimensions;
use geo::algorithm::line_intersection::{line_intersection, LineIntersection};
#[allow(deprecated)]
use geo::EuclideanDistance;
use geo::{
    Contains, Coord, Geometry, GeometryCollection, Line, LineString, MultiLineString,
    MultiPoint, MultiPolygon, Point, Polygon, Relate,
};
use log::debug;

use crate::{Error, Result};

pub const DEFAULT_SPLIT_TOLERANCE: f64 = 1.0e-4;

/// What a splitter geometry turns into before splitting. Points become tiny circles, polygons
/// become their rings; everything ends up as lines.
#[derive(Debug)]
enum Splitter {
    Points(MultiPoint),
    Polygon(Polygon),
    MultiPolygon(MultiPolygon),
    Lines(MultiLineString),
    Collection(Vec<Splitter>),
}

impl Splitter {
    fn classify(geometry: &Geometry) -> Self {
        match geometry {
            Geometry::Point(p) => Splitter::Points(MultiPoint::new(vec![*p])),
            Geometry::MultiPoint(mp) => Splitter::Points(mp.clone()),
            Geometry::Polygon(p) => Splitter::Polygon(p.clone()),
            Geometry::Rect(r) => Splitter::Polygon(r.to_polygon()),
            Geometry::Triangle(t) => Splitter::Polygon(t.to_polygon()),
            Geometry::MultiPolygon(mp) => Splitter::MultiPolygon(mp.clone()),
            Geometry::Line(l) => Splitter::Lines(MultiLineString::new(vec![(*l).into()])),
            Geometry::LineString(ls) => Splitter::Lines(MultiLineString::new(vec![ls.clone()])),
            Geometry::MultiLineString(mls) => Splitter::Lines(mls.clone()),
            Geometry::GeometryCollection(gc) => {
                Splitter::Collection(gc.iter().map(Splitter::classify).collect())
            }
        }
    }

    fn into_lines(self, tolerance: f64) -> MultiLineString {
        match self {
            // Snapping onto a point that sits exactly on the line is numerically fragile, so
            // split where a tiny circle around it crosses the line instead
            Splitter::Points(points) => {
                Splitter::MultiPolygon(points.buffer(tolerance / 2.01)).into_lines(tolerance)
            }
            // Only the exterior, unlike a multipolygon
            Splitter::Polygon(polygon) => {
                MultiLineString::new(vec![polygon.exterior().clone()])
            }
            Splitter::MultiPolygon(polygons) => MultiLineString::new(
                polygons
                    .into_iter()
                    .flat_map(|p| {
                        let (exterior, interiors) = p.into_inner();
                        std::iter::once(exterior).chain(interiors)
                    })
                    .collect(),
            ),
            Splitter::Lines(lines) => lines,
            Splitter::Collection(members) => MultiLineString::new(
                members
                    .into_iter()
                    .flat_map(|m| m.into_lines(tolerance).0)
                    .collect(),
            ),
        }
    }
}

/// Split a linestring, which may cross itself, everywhere it meets `splitter`.
///
/// Crossing `splitter` along a shared segment is an error. If `geom` and `splitter` never meet
/// at a point, the result is just `geom`. Intersection points closer together than `tolerance`
/// are merged, and the line's vertices are snapped onto them within `tolerance`.
///
/// Where the splitter meets the line exactly at one of the line's own self-intersections, only
/// the first pass through that point is split.
pub fn complex_split(
    geom: &LineString,
    splitter: &Geometry,
    tolerance: f64,
) -> Result<GeometryCollection> {
    if !(tolerance.is_finite() && tolerance > 0.0) {
        return Err(Error::InvalidInput(format!(
            "tolerance must be positive, not {tolerance}"
        )));
    }

    let splitter = Splitter::classify(splitter).into_lines(tolerance);

    // Only split where the two meet at isolated points
    let matrix = geom.relate(&splitter);
    let interiors = matrix.get(CoordPos::Inside, CoordPos::Inside);
    if interiors == Dimensions::OneDimensional {
        return Err(Error::InvalidSplit);
    }
    if interiors != Dimensions::ZeroDimensional
        && matrix.get(CoordPos::Inside, CoordPos::OnBoundary) != Dimensions::ZeroDimensional
    {
        return Ok(GeometryCollection::from(vec![geom.clone()]));
    }

    let points = merge_close_points(intersection_points(geom, &splitter), tolerance);
    let snapped = snap_line(geom, &points, tolerance);
    let pieces = split_at_points(snapped, &points);
    debug!(
        "Split a line of {} points into {} pieces at {} points",
        geom.0.len(),
        pieces.len(),
        points.len()
    );
    Ok(GeometryCollection::from(pieces))
}

fn intersection_points(geom: &LineString, splitter: &MultiLineString) -> Vec<Coord> {
    let mut points = Vec::new();
    for segment in geom.lines() {
        for other in splitter.iter().flat_map(|ls| ls.lines()) {
            match line_intersection(segment, other) {
                Some(LineIntersection::SinglePoint { intersection, .. }) => {
                    points.push(intersection)
                }
                Some(LineIntersection::Collinear { intersection }) => {
                    points.push(intersection.start);
                    points.push(intersection.end);
                }
                None => {}
            }
        }
    }
    points
}

/// Collapse points within `tolerance` of an earlier one onto it.
#[allow(deprecated)]
fn merge_close_points(points: Vec<Coord>, tolerance: f64) -> Vec<Coord> {
    let mut merged: Vec<Coord> = Vec::new();
    for pt in points {
        if !merged
            .iter()
            .any(|existing| existing.euclidean_distance(&pt) < tolerance)
        {
            merged.push(pt);
        }
    }
    merged
}

/// Move vertices onto nearby `points`, then insert the remaining `points` into the closest
/// segment within `tolerance`. When several segments are equally close, as at a
/// self-intersection, the first one wins.
#[allow(deprecated)]
fn snap_line(line: &LineString, points: &[Coord], tolerance: f64) -> LineString {
    let mut coords = line.0.clone();

    for vertex in coords.iter_mut() {
        let closest = points
            .iter()
            .map(|pt| (pt, pt.euclidean_distance(vertex)))
            .filter(|(_, dist)| *dist < tolerance)
            .min_by(|a, b| a.1.total_cmp(&b.1));
        if let Some((pt, _)) = closest {
            *vertex = *pt;
        }
    }

    for pt in points {
        if coords.contains(pt) {
            continue;
        }
        let mut best: Option<(usize, f64)> = None;
        for (idx, pair) in coords.windows(2).enumerate() {
            let dist = Point::from(*pt).euclidean_distance(&Line::new(pair[0], pair[1]));
            if dist < tolerance && best.map_or(true, |(_, best_dist)| dist < best_dist) {
                best = Some((idx, dist));
            }
        }
        if let Some((idx, _)) = best {
            coords.insert(idx + 1, *pt);
        }
    }

    LineString::new(coords)
}

fn split_at_points(line: LineString, points: &[Coord]) -> Vec<LineString> {
    let mut pieces = vec![line];
    for pt in points {
        pieces = pieces
            .into_iter()
            .flat_map(|piece| split_once(piece, *pt))
            .collect();
    }
    pieces
}

/// Cut `line` at the first place it passes through `pt`, if `pt` is in its interior.
#[allow(deprecated)]
fn split_once(line: LineString, pt: Coord) -> Vec<LineString> {
    // Endpoints and points off the line don't split anything
    if !line.contains(&pt) {
        return vec![line];
    }

    let point = Point::from(pt);
    let mut best: Option<(usize, f64)> = None;
    for (idx, segment) in line.lines().enumerate() {
        let dist = point.euclidean_distance(&segment);
        if best.map_or(true, |(_, best_dist)| dist < best_dist) {
            best = Some((idx, dist));
        }
    }
    let Some((idx, _)) = best else {
        return vec![line];
    };

    let coords = &line.0;
    if coords[idx + 1] == pt {
        vec![
            LineString::new(coords[..=idx + 1].to_vec()),
            LineString::new(coords[idx + 1..].to_vec()),
        ]
    } else if coords[idx] == pt {
        if idx == 0 {
            // Only a closed line contains its start
            return vec![line];
        }
        vec![
            LineString::new(coords[..=idx].to_vec()),
            LineString::new(coords[idx..].to_vec()),
        ]
    } else {
        let mut first = coords[..=idx].to_vec();
        first.push(pt);
        let mut second = vec![pt];
        second.extend_from_slice(&coords[idx + 1..]);
        vec![LineString::new(first), LineString::new(second)]
    }
}
