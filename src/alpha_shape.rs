use std::collections::{HashMap, HashSet};

use geo::algorithm::buffer::{Buffer, BufferStyle, LineCap};
use geo::line_measures::Densifiable;
use geo::{
    unary_union, BooleanOps, Coord, CoordsIter, Euclidean, Geometry, Intersects, LineString,
    MultiLineString, MultiPoint, MultiPolygon, Polygon, Triangle,
};
use log::{debug, warn};

use crate::delaunay::{edges, triangulate, undirected};
use crate::{Error, GeoCollection, Result};

/// Parameters for `alpha_shape`.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AlphaShapeOptions {
    /// When positive, the input is grown by this distance with square caps, and every disjoint
    /// grown piece gets its own shape.
    pub buffer: f64,
    /// When positive, line pieces are densified so no segment is longer than this.
    pub max_segment_len: f64,
    /// Multiplier on the optimal alpha of each part. 1 is the tightest single shape covering
    /// every point, 0 is the convex hull. Lowering it loosens the shape, so a smaller
    /// multiplier never gives a smaller area.
    pub alpha: f64,
}

impl Default for AlphaShapeOptions {
    fn default() -> Self {
        Self {
            buffer: 0.0,
            max_segment_len: 0.0,
            alpha: 0.8,
        }
    }
}

impl AlphaShapeOptions {
    pub fn with_buffer(mut self, buffer: f64) -> Self {
        self.buffer = buffer;
        self
    }

    pub fn with_max_segment_len(mut self, max_segment_len: f64) -> Self {
        self.max_segment_len = max_segment_len;
        self
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("buffer", self.buffer),
            ("max_segment_len", self.max_segment_len),
            ("alpha", self.alpha),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(Error::InvalidInput(format!(
                    "{name} must be finite and non-negative, not {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Compute a concave hull around each connected part of `input`. Distances are measured in a
/// projected frame (an estimated UTM zone for geographic input); the result comes back in the
/// frame of `input`. Parts that can't form a shape are skipped with a warning.
pub fn alpha_shape(
    input: &GeoCollection,
    options: &AlphaShapeOptions,
) -> Result<GeoCollection<Polygon>> {
    options.validate()?;
    if input.is_empty() {
        return Ok(GeoCollection {
            geometries: Vec::new(),
            crs: input.crs,
        });
    }

    let working = input.working_frame()?;
    let projected = input.in_frame(working)?;
    let unified = Part::unify(projected.iter());
    let parts = unified.split(options);
    debug!("Computing alpha shapes for {} parts", parts.len());

    let mut polygons = Vec::new();
    for (idx, part) in parts.iter().enumerate() {
        match part_shape(part, options.alpha) {
            Ok(shape) => polygons.extend(shape),
            Err(err) => warn!("Skipping part {idx}: {err}"),
        }
    }

    let result = GeoCollection {
        geometries: polygons,
        crs: working,
    };
    match input.crs {
        Some(crs) => result.to_crs(crs),
        None => Ok(result),
    }
}

fn part_shape(part: &Part, alpha: f64) -> Result<Vec<Polygon>> {
    let points = part.unique_coords();
    if points.len() < 3 {
        return Err(Error::DegenerateGeometry(format!(
            "{} distinct points can't form a shape",
            points.len()
        )));
    }
    let shaper = AlphaShaper::new(points)?;
    let optimal = shaper.optimal_alpha();
    Ok(shaper.shape(optimal * alpha))
}

/// Polygonal, lineal and puntal pieces of one unified geometry.
#[derive(Clone, Debug)]
struct Part {
    polygons: MultiPolygon,
    lines: MultiLineString,
    points: MultiPoint,
}

impl Default for Part {
    fn default() -> Self {
        Self {
            polygons: MultiPolygon::new(Vec::new()),
            lines: MultiLineString::new(Vec::new()),
            points: MultiPoint::new(Vec::new()),
        }
    }
}

impl Part {
    /// Merge everything into one geometry. Polygons are dissolved into each other; lines and
    /// points are kept as they are.
    fn unify<'a>(geometries: impl Iterator<Item = &'a Geometry>) -> Self {
        let mut polygons = Vec::new();
        let mut part = Part::default();
        for geometry in geometries {
            part.add(geometry, &mut polygons);
        }
        if !polygons.is_empty() {
            part.polygons = unary_union(&polygons);
        }
        part
    }

    fn add(&mut self, geometry: &Geometry, polygons: &mut Vec<Polygon>) {
        match geometry {
            Geometry::Point(p) => self.points.0.push(*p),
            Geometry::MultiPoint(mp) => self.points.0.extend(mp.iter().copied()),
            Geometry::Line(l) => self.lines.0.push(LineString::from(*l)),
            Geometry::LineString(ls) => self.lines.0.push(ls.clone()),
            Geometry::MultiLineString(mls) => self.lines.0.extend(mls.iter().cloned()),
            Geometry::Polygon(p) => polygons.push(p.clone()),
            Geometry::MultiPolygon(mp) => polygons.extend(mp.iter().cloned()),
            Geometry::Rect(r) => polygons.push(r.to_polygon()),
            Geometry::Triangle(t) => polygons.push(t.to_polygon()),
            Geometry::GeometryCollection(gc) => {
                for g in gc {
                    self.add(g, polygons);
                }
            }
        }
    }

    fn is_polygonal(&self) -> bool {
        self.lines.0.is_empty() && self.points.0.is_empty()
    }

    /// Break into the parts that each get their own shape.
    fn split(self, options: &AlphaShapeOptions) -> Vec<Part> {
        if options.buffer > 0.0 {
            let style = || BufferStyle::new(options.buffer).line_cap(LineCap::Square);
            let grown = unary_union(&[
                self.polygons.buffer_with_style(style()),
                self.lines.buffer_with_style(style()),
                self.points.buffer_with_style(style()),
            ]);

            grown
                .into_iter()
                .map(|cell| {
                    let cell = MultiPolygon::new(vec![cell]);
                    let mut lines = cell.clip(&self.lines, false);
                    if options.max_segment_len > 0.0 {
                        lines = lines.densify(&Euclidean, options.max_segment_len);
                    }
                    Part {
                        polygons: self.polygons.intersection(&cell),
                        lines,
                        points: self
                            .points
                            .iter()
                            .filter(|p| cell.intersects(*p))
                            .copied()
                            .collect(),
                    }
                })
                .collect()
        } else if self.is_polygonal() {
            self.polygons
                .into_iter()
                .map(|polygon| Part {
                    polygons: MultiPolygon::new(vec![polygon]),
                    ..Default::default()
                })
                .collect()
        } else {
            vec![self]
        }
    }

    /// Every distinct vertex, in first-seen order.
    fn unique_coords(&self) -> Vec<Coord> {
        let mut seen = HashSet::new();
        self.polygons
            .coords_iter()
            .chain(self.lines.coords_iter())
            .chain(self.points.coords_iter())
            .filter(|c| seen.insert((c.x.to_bits(), c.y.to_bits())))
            .collect()
    }
}

/// The Delaunay triangles of a point set, each with its circumradius. A triangle belongs to the
/// shape for parameter `alpha` when `alpha` is 0 or its circumradius is at most `1 / alpha`.
struct AlphaShaper {
    points: Vec<Coord>,
    triangles: Vec<[usize; 3]>,
    radii: Vec<f64>,
}

impl AlphaShaper {
    fn new(points: Vec<Coord>) -> Result<Self> {
        let triangles = triangulate(&points)?;
        if triangles.is_empty() {
            return Err(Error::DegenerateGeometry(format!(
                "{} collinear points have no triangulation",
                points.len()
            )));
        }
        let radii = triangles
            .iter()
            .map(|[a, b, c]| circumradius(points[*a], points[*b], points[*c]))
            .collect();
        Ok(Self {
            points,
            triangles,
            radii,
        })
    }

    /// The largest alpha whose shape still touches every point and is a single edge-connected
    /// piece. Triangles join the shape in order of increasing circumradius, so this is the
    /// reciprocal of the radius of the triangle that first completes it.
    fn optimal_alpha(&self) -> f64 {
        let mut order: Vec<usize> = (0..self.triangles.len()).collect();
        order.sort_by(|a, b| self.radii[*a].total_cmp(&self.radii[*b]));

        let mut edge_owner: HashMap<(usize, usize), usize> = HashMap::new();
        let mut components = DisjointSet::new(self.triangles.len());
        let mut num_components = 0;
        let mut covered = vec![false; self.points.len()];
        let mut num_covered = 0;

        for t in order {
            num_components += 1;
            for v in self.triangles[t] {
                if !covered[v] {
                    covered[v] = true;
                    num_covered += 1;
                }
            }
            for (a, b) in edges(self.triangles[t]) {
                match edge_owner.get(&undirected(a, b)) {
                    Some(other) => {
                        if components.union(t, *other) {
                            num_components -= 1;
                        }
                    }
                    None => {
                        edge_owner.insert(undirected(a, b), t);
                    }
                }
            }

            if num_covered == self.points.len() && num_components == 1 {
                let radius = self.radii[t];
                return if radius.is_finite() && radius > 0.0 {
                    1.0 / radius
                } else {
                    0.0
                };
            }
        }
        0.0
    }

    fn shape(&self, alpha: f64) -> Vec<Polygon> {
        // A little slack, so the triangle defining the optimum survives the reciprocal
        let max_radius = if alpha > 0.0 {
            (1.0 / alpha) * (1.0 + 1e-9)
        } else {
            f64::INFINITY
        };
        let kept: Vec<Polygon> = self
            .triangles
            .iter()
            .zip(&self.radii)
            .filter(|(_, r)| **r <= max_radius)
            .map(|([a, b, c], _)| {
                Triangle::new(self.points[*a], self.points[*b], self.points[*c]).to_polygon()
            })
            .collect();
        if kept.is_empty() {
            return Vec::new();
        }
        unary_union(&kept).0
    }
}

fn circumradius(a: Coord, b: Coord, c: Coord) -> f64 {
    let ab = (a - b).x.hypot((a - b).y);
    let bc = (b - c).x.hypot((b - c).y);
    let ca = (c - a).x.hypot((c - a).y);
    let twice_area = ((b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)).abs();
    if twice_area == 0.0 {
        return f64::INFINITY;
    }
    ab * bc * ca / (2.0 * twice_area)
}

/// Union-find over triangle indices
struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    /// True if the two were in different sets
    fn union(&mut self, a: usize, b: usize) -> bool {
        let (a, b) = (self.find(a), self.find(b));
        if a == b {
            return false;
        }
        self.parent[a] = b;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Crs;
    use geo::{line_string, point, Area, ConvexHull, Point};

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn total_area(polygons: &[Polygon]) -> f64 {
        polygons.iter().map(|p| p.unsigned_area()).sum()
    }

    /// A "C" shape of points: a 10x10 block with a 6-wide notch cut into its right side
    fn c_shape() -> Vec<Point> {
        let mut pts = Vec::new();
        for x in 0..=10 {
            for y in 0..=10 {
                if x >= 4 && (2..=8).contains(&y) {
                    continue;
                }
                pts.push(point!(x: x as f64, y: y as f64));
            }
        }
        pts
    }

    fn collection(points: Vec<Point>) -> GeoCollection {
        GeoCollection::new(points, Crs::Planar).into_geometries()
    }

    #[test]
    fn test_circumradius() {
        let r = circumradius(
            Coord { x: 0., y: 0. },
            Coord { x: 2., y: 0. },
            Coord { x: 0., y: 2. },
        );
        assert!((r - 2f64.sqrt()).abs() < 1e-12);
        assert_eq!(
            circumradius(
                Coord { x: 0., y: 0. },
                Coord { x: 1., y: 1. },
                Coord { x: 2., y: 2. },
            ),
            f64::INFINITY
        );
    }

    #[test]
    fn test_optimal_alpha_covers_every_point() {
        let points: Vec<Coord> = c_shape().into_iter().map(|p| p.0).collect();
        let shaper = AlphaShaper::new(points.clone()).unwrap();
        let alpha = shaper.optimal_alpha();
        // Unit grid triangles have circumradius sqrt(2)/2, so the optimum is exactly the
        // reciprocal of that
        assert!((alpha - 2f64.sqrt()).abs() < 1e-9, "{alpha}");

        let shape = shaper.shape(alpha);
        assert_eq!(shape.len(), 1);
        for c in points {
            assert!(shape[0].intersects(&Point(c)));
        }
    }

    #[test]
    fn test_concave_notch_is_excluded() {
        init_logging();
        let input = collection(c_shape());
        let hull_area = MultiPoint::new(c_shape()).convex_hull().unsigned_area();
        assert_eq!(hull_area, 100.0);

        let tight = alpha_shape(&input, &AlphaShapeOptions::default().with_alpha(1.0)).unwrap();
        assert_eq!(tight.crs, Some(Crs::Planar));
        assert_eq!(tight.len(), 1);
        // 44 complete grid cells, plus half a cell at each inner corner of the notch
        assert!((total_area(&tight.geometries) - 45.0).abs() < 1e-6);

        let hull = alpha_shape(&input, &AlphaShapeOptions::default().with_alpha(0.0)).unwrap();
        assert!((total_area(&hull.geometries) - hull_area).abs() < 1e-6);
    }

    #[test]
    fn test_looser_alpha_never_shrinks() {
        let input = collection(c_shape());
        let mut last_area = f64::INFINITY;
        for alpha in [0.0, 0.2, 0.5, 0.8, 1.0] {
            let shapes = alpha_shape(&input, &AlphaShapeOptions::default().with_alpha(alpha))
                .unwrap();
            let area = total_area(&shapes.geometries);
            assert!(area <= last_area + 1e-6, "alpha {alpha} gave {area}");
            last_area = area;
        }
    }

    #[test]
    fn test_within_convex_hull() {
        let pts = vec![
            point!(x: 0., y: 0.),
            point!(x: 7., y: 1.),
            point!(x: 9., y: 8.),
            point!(x: 3., y: 4.),
            point!(x: 1., y: 9.),
            point!(x: 5., y: 5.),
            point!(x: 4., y: 2.),
        ];
        let hull = MultiPoint::new(pts.clone()).convex_hull();
        let shapes = alpha_shape(&collection(pts), &AlphaShapeOptions::default()).unwrap();
        assert!(!shapes.is_empty());
        for shape in &shapes.geometries {
            let outside = shape.difference(&hull).unsigned_area();
            assert!(outside < 1e-9 * hull.unsigned_area(), "{outside}");
        }
    }

    #[test]
    fn test_too_few_points_is_empty() {
        init_logging();
        let input = collection(vec![point!(x: 0., y: 0.), point!(x: 1., y: 1.)]);
        let shapes = alpha_shape(&input, &AlphaShapeOptions::default()).unwrap();
        assert!(shapes.is_empty());

        // Duplicates don't count
        let input = collection(vec![
            point!(x: 0., y: 0.),
            point!(x: 1., y: 1.),
            point!(x: 1., y: 1.),
        ]);
        assert!(alpha_shape(&input, &AlphaShapeOptions::default())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_collinear_part_is_skipped() {
        init_logging();
        let input = GeoCollection::new(
            vec![line_string![(x: 0., y: 0.), (x: 1., y: 0.), (x: 2., y: 0.), (x: 5., y: 0.)]],
            Crs::Planar,
        )
        .into_geometries();
        assert!(alpha_shape(&input, &AlphaShapeOptions::default())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_polygons_are_separate_parts() {
        let square = |x: f64| {
            Geometry::from(
                geo::Rect::new(Coord { x, y: 0. }, Coord { x: x + 1., y: 1. }).to_polygon(),
            )
        };
        let input = GeoCollection::new(vec![square(0.), square(10.)], Crs::Planar);
        let shapes = alpha_shape(&input, &AlphaShapeOptions::default()).unwrap();
        assert_eq!(shapes.len(), 2);
        assert!((total_area(&shapes.geometries) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_buffer_groups_nearby_points() {
        // Two clusters of three points, 100 apart
        let mut pts = Vec::new();
        for offset in [0.0, 100.0] {
            pts.push(point!(x: offset, y: 0.));
            pts.push(point!(x: offset + 4., y: 0.));
            pts.push(point!(x: offset + 2., y: 3.));
        }
        let input = collection(pts);

        // One part, so the shape has to bridge the gap
        let unbuffered = alpha_shape(&input, &AlphaShapeOptions::default()).unwrap();
        assert!(total_area(&unbuffered.geometries) > 100.0);

        let buffered =
            alpha_shape(&input, &AlphaShapeOptions::default().with_buffer(5.0)).unwrap();
        assert_eq!(buffered.len(), 2);
        assert!((total_area(&buffered.geometries) - 12.0).abs() < 1e-6);
    }

    #[test]
    fn test_buffered_lines_are_densified() {
        let path = || Geometry::from(line_string![(x: 0., y: 0.), (x: 10., y: 0.), (x: 10., y: 10.)]);

        let options = AlphaShapeOptions::default()
            .with_buffer(1.0)
            .with_max_segment_len(1.5);
        let parts = Part::unify([path()].iter()).split(&options);
        assert_eq!(parts.len(), 1);
        // Each leg of length 10 becomes 7 segments
        assert_eq!(parts[0].unique_coords().len(), 15);

        let coarse = Part::unify([path()].iter())
            .split(&AlphaShapeOptions::default().with_buffer(1.0));
        assert_eq!(coarse[0].unique_coords().len(), 3);
    }

    #[test]
    fn test_geographic_roundtrip() {
        let pts = vec![
            point!(x: 2.170, y: 41.380),
            point!(x: 2.180, y: 41.380),
            point!(x: 2.180, y: 41.390),
            point!(x: 2.170, y: 41.390),
            point!(x: 2.175, y: 41.385),
        ];
        let input = GeoCollection::new(pts, Crs::Wgs84).into_geometries();
        let shapes = alpha_shape(&input, &AlphaShapeOptions::default()).unwrap();
        assert_eq!(shapes.crs, Some(Crs::Wgs84));
        assert_eq!(shapes.len(), 1);
        let bounds = shapes.bounds().unwrap();
        assert!((bounds.min().x - 2.170).abs() < 1e-6);
        assert!((bounds.max().y - 41.390).abs() < 1e-6);
    }

    #[test]
    fn test_invalid_options() {
        let input = collection(c_shape());
        assert!(matches!(
            alpha_shape(&input, &AlphaShapeOptions::default().with_alpha(-1.0)),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            alpha_shape(&input, &AlphaShapeOptions::default().with_buffer(f64::NAN)),
            Err(Error::InvalidInput(_))
        ));
    }
}
