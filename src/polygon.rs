//! Polygon boolean operations and triangulation on the integer grid.
//!
//! Clipping goes through Clipper2 with the non-zero fill rule, so
//! self-intersecting or degenerate input is sanitised instead of rejected.
//! Every result is snapped back to integer points; repeated damage never
//! accumulates floating-point cracks.
//!
//! Triangulation runs earcut per outer contour with its holes attached.

use clipper2::{FillRule, Paths};
use log::warn;

use crate::types::Point;

pub type Contour = Vec<Point>;

// ---------------------------------------------------------------------------
// Polygon set
// ---------------------------------------------------------------------------

/// A set of closed contours.  Outer boundaries and holes are told apart by
/// nesting depth, not by winding, so either orientation is accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Polygons {
    pub contours: Vec<Contour>,
}

impl Polygons {
    pub fn new(contours: Vec<Contour>) -> Self {
        Self {
            contours: contours.into_iter().filter_map(clean_contour).collect(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn rect(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self::new(vec![vec![
            Point::new(left, top),
            Point::new(right, top),
            Point::new(right, bottom),
            Point::new(left, bottom),
        ]])
    }

    pub fn is_empty(&self) -> bool {
        self.contours.is_empty()
    }

    pub fn point_count(&self) -> usize {
        self.contours.iter().map(Vec::len).sum()
    }

    /// Enclosed area: outer contours count positive, holes negative.
    pub fn area(&self) -> f64 {
        let depths = nesting_depths(&self.contours);
        self.contours
            .iter()
            .zip(depths)
            .map(|(c, depth)| {
                let a = signed_area(c).abs();
                if depth % 2 == 0 {
                    a
                } else {
                    -a
                }
            })
            .sum()
    }

    /// Even-odd containment over all contours.  Boundary points count as
    /// outside.
    pub fn contains(&self, p: Point) -> bool {
        self.contours
            .iter()
            .filter(|c| locate(c, p) == Location::Inside)
            .count()
            % 2
            == 1
    }

    /// Axis-aligned bounds as `(min, max)`, or `None` when empty.
    pub fn bounds(&self) -> Option<(Point, Point)> {
        let mut points = self.contours.iter().flatten();
        let first = *points.next()?;
        let (mut min, mut max) = (first, first);
        for p in points {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
        }
        Some((min, max))
    }

    /// Outer contours, each with the holes nested directly inside it.
    pub fn shapes(&self) -> Vec<Shape<'_>> {
        let depths = nesting_depths(&self.contours);
        let mut shapes: Vec<Shape<'_>> = Vec::new();
        let mut outer_index = vec![usize::MAX; self.contours.len()];

        for (i, c) in self.contours.iter().enumerate() {
            if depths[i] % 2 == 0 {
                outer_index[i] = shapes.len();
                shapes.push(Shape {
                    outer: c,
                    holes: Vec::new(),
                });
            }
        }

        for (i, hole) in self.contours.iter().enumerate() {
            if depths[i] % 2 == 0 {
                continue;
            }
            // Smallest enclosing outer contour owns the hole.
            let parent = self
                .contours
                .iter()
                .enumerate()
                .filter(|(j, outer)| depths[*j] % 2 == 0 && encloses(outer, hole))
                .min_by(|(_, a), (_, b)| signed_area(a).abs().total_cmp(&signed_area(b).abs()))
                .map(|(j, _)| outer_index[j]);
            match parent {
                Some(idx) => shapes[idx].holes.push(hole),
                None => warn!("Dropping orphan hole with {} points", hole.len()),
            }
        }

        shapes
    }
}

/// One outer contour plus its holes.
#[derive(Debug, Clone)]
pub struct Shape<'a> {
    pub outer: &'a Contour,
    pub holes: Vec<&'a Contour>,
}

// ---------------------------------------------------------------------------
// Boolean operations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum BoolOp {
    Union,
    Xor,
    Difference,
    Intersection,
}

pub fn union(a: &Polygons, b: &Polygons) -> Polygons {
    boolean(BoolOp::Union, a, b)
}

pub fn xor(a: &Polygons, b: &Polygons) -> Polygons {
    boolean(BoolOp::Xor, a, b)
}

pub fn difference(a: &Polygons, b: &Polygons) -> Polygons {
    boolean(BoolOp::Difference, a, b)
}

pub fn intersection(a: &Polygons, b: &Polygons) -> Polygons {
    boolean(BoolOp::Intersection, a, b)
}

/// Run `op` on `subject` and `clip`.  Empty inputs short-circuit; clipper
/// failures are logged and produce the empty set.
pub fn boolean(op: BoolOp, subject: &Polygons, clip: &Polygons) -> Polygons {
    match op {
        BoolOp::Intersection if subject.is_empty() || clip.is_empty() => {
            return Polygons::empty()
        }
        BoolOp::Difference if subject.is_empty() => return Polygons::empty(),
        BoolOp::Difference if clip.is_empty() => return subject.clone(),
        BoolOp::Union | BoolOp::Xor if clip.is_empty() => return subject.clone(),
        BoolOp::Union | BoolOp::Xor if subject.is_empty() => return clip.clone(),
        _ => {}
    }

    let a = to_paths(subject);
    let b = to_paths(clip);
    let result = match op {
        BoolOp::Union => clipper2::union(a, b, FillRule::NonZero),
        BoolOp::Xor => clipper2::xor(a, b, FillRule::NonZero),
        BoolOp::Difference => clipper2::difference(a, b, FillRule::NonZero),
        BoolOp::Intersection => clipper2::intersect(a, b, FillRule::NonZero),
    };

    match result {
        Ok(paths) => from_paths(paths),
        Err(e) => {
            warn!("Clipper {:?} failed: {:?}", op, e);
            Polygons::empty()
        }
    }
}

/// Normalise arbitrary (possibly self-intersecting) contours.
pub fn sanitize(polygons: &Polygons) -> Polygons {
    if polygons.is_empty() {
        return Polygons::empty();
    }
    let none: Paths = Vec::<Vec<(f64, f64)>>::new().into();
    match clipper2::union(to_paths(polygons), none, FillRule::NonZero) {
        Ok(paths) => from_paths(paths),
        Err(e) => {
            warn!("Clipper sanitize failed: {:?}", e);
            Polygons::empty()
        }
    }
}

fn to_paths(polygons: &Polygons) -> Paths {
    let coords: Vec<Vec<(f64, f64)>> = polygons
        .contours
        .iter()
        .map(|c| c.iter().map(|p| (p.x as f64, p.y as f64)).collect())
        .collect();
    coords.into()
}

fn from_paths(paths: Paths) -> Polygons {
    let raw: Vec<Vec<(f64, f64)>> = paths.into();
    Polygons::new(
        raw.into_iter()
            .map(|path| {
                path.into_iter()
                    .map(|(x, y)| Point::new(x.round() as i32, y.round() as i32))
                    .collect()
            })
            .collect(),
    )
}

/// Drop repeated points (including a repeated closing point) and reject
/// contours that enclose nothing.
fn clean_contour(mut contour: Contour) -> Option<Contour> {
    contour.dedup();
    while contour.len() > 1 && contour.first() == contour.last() {
        contour.pop();
    }
    if contour.len() < 3 || twice_signed_area(&contour) == 0 {
        return None;
    }
    Some(contour)
}

// ---------------------------------------------------------------------------
// Triangulation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Triangle {
    pub vertices: [Point; 3],
}

impl Triangle {
    pub fn area(&self) -> f64 {
        let [a, b, c] = self.vertices;
        let cross = (b.x as i64 - a.x as i64) * (c.y as i64 - a.y as i64)
            - (b.y as i64 - a.y as i64) * (c.x as i64 - a.x as i64);
        cross.abs() as f64 * 0.5
    }
}

/// Triangulate every shape in `polygons`.  Holes are fed to earcut as
/// separate rings of the same shape.
pub fn triangulate(polygons: &Polygons) -> Vec<Triangle> {
    let mut triangles = Vec::new();

    for shape in polygons.shapes() {
        let mut ring: Vec<Point> = shape.outer.clone();
        let mut hole_starts = Vec::with_capacity(shape.holes.len());
        for hole in &shape.holes {
            hole_starts.push(ring.len());
            ring.extend(hole.iter().copied());
        }

        let flat: Vec<f64> = ring
            .iter()
            .flat_map(|p| [p.x as f64, p.y as f64])
            .collect();

        match earcutr::earcut(&flat, &hole_starts, 2) {
            Ok(indices) => {
                triangles.extend(indices.chunks_exact(3).map(|t| Triangle {
                    vertices: [ring[t[0]], ring[t[1]], ring[t[2]]],
                }));
            }
            Err(e) => warn!(
                "Triangulation failed for contour with {} points: {:?}",
                shape.outer.len(),
                e
            ),
        }
    }

    triangles
}

pub fn triangles_area(triangles: &[Triangle]) -> f64 {
    triangles.iter().map(Triangle::area).sum()
}

// ---------------------------------------------------------------------------
// Contour helpers
// ---------------------------------------------------------------------------

fn twice_signed_area(contour: &[Point]) -> i64 {
    let n = contour.len();
    (0..n)
        .map(|i| {
            let a = contour[i];
            let b = contour[(i + 1) % n];
            a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64
        })
        .sum()
}

/// Shoelace area; the sign follows the winding.
pub fn signed_area(contour: &[Point]) -> f64 {
    twice_signed_area(contour) as f64 * 0.5
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Location {
    Inside,
    Outside,
    Boundary,
}

fn locate(contour: &[Point], p: Point) -> Location {
    let n = contour.len();
    let (px, py) = (p.x as i64, p.y as i64);
    let mut inside = false;

    for i in 0..n {
        let a = contour[i];
        let b = contour[(i + 1) % n];
        let (ax, ay, bx, by) = (a.x as i64, a.y as i64, b.x as i64, b.y as i64);

        let cross = (bx - ax) * (py - ay) - (by - ay) * (px - ax);
        if cross == 0
            && px >= ax.min(bx)
            && px <= ax.max(bx)
            && py >= ay.min(by)
            && py <= ay.max(by)
        {
            return Location::Boundary;
        }

        if (ay > py) != (by > py) {
            // x of the edge at row py, compared without division.
            let lhs = (px - ax) * (by - ay);
            let rhs = (bx - ax) * (py - ay);
            if (by > ay && lhs < rhs) || (by < ay && lhs > rhs) {
                inside = !inside;
            }
        }
    }

    if inside {
        Location::Inside
    } else {
        Location::Outside
    }
}

/// Whether `inner` lies inside `outer`, decided by the first vertex of
/// `inner` that is not on `outer`'s boundary.
fn encloses(outer: &[Point], inner: &[Point]) -> bool {
    if std::ptr::eq(outer, inner) {
        return false;
    }
    inner
        .iter()
        .map(|p| locate(outer, *p))
        .find(|loc| *loc != Location::Boundary)
        .is_some_and(|loc| loc == Location::Inside)
}

fn nesting_depths(contours: &[Contour]) -> Vec<usize> {
    contours
        .iter()
        .enumerate()
        .map(|(i, c)| {
            contours
                .iter()
                .enumerate()
                .filter(|(j, other)| *j != i && encloses(other, c))
                .count()
        })
        .collect()
}
