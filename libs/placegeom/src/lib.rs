//! Core geometric types and their operations/attributes.
//!
//! All coordinates are real-valued layout lengths (micrometers by convention).

use std::fmt::Display;
use std::str::FromStr;

use enum_dispatch::enum_dispatch;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use transform::{Transform, Transformation, Translate};

use self::bbox::Bbox;

pub mod bbox;
pub mod orientation;
pub mod transform;

/// Snaps `pos` to the nearest multiple of `grid`.
pub fn snap_to_grid(pos: f64, grid: f64) -> f64 {
    assert!(grid > 0.);
    (pos / grid).round() * grid
}

/// A point in two-dimensional layout-space.
#[derive(Debug, Copy, Clone, Default, Serialize, Deserialize, PartialEq, PartialOrd)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    /// Creates a new [`Point`] from (x,y) coordinates.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Returns the origin, (0, 0).
    #[inline]
    pub fn zero() -> Self {
        Self { x: 0., y: 0. }
    }

    /// Creates a new [`Point`] that serves as an offset along `axis`.
    pub fn offset(val: f64, axis: Axis) -> Self {
        match axis {
            Axis::X => Self { x: val, y: 0. },
            Axis::Y => Self { x: 0., y: val },
        }
    }

    /// Gets the coordinate associated with `axis`.
    pub fn coord(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
        }
    }

    /// Returns the unit vector pointing at `angle` degrees from the x-axis.
    pub fn unit(angle: f64) -> Self {
        let (sin, cos) = orientation::sin_cos(angle);
        Self { x: cos, y: sin }
    }

    /// Returns the Euclidean distance between `self` and `other`.
    pub fn distance(&self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    #[inline]
    pub fn snap_to_grid(&self, grid: f64) -> Self {
        Self::new(snap_to_grid(self.x, grid), snap_to_grid(self.y, grid))
    }
}

impl std::ops::Add<Point> for Point {
    type Output = Self;
    fn add(self, rhs: Point) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::AddAssign<Point> for Point {
    fn add_assign(&mut self, rhs: Point) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl std::ops::Sub<Point> for Point {
    type Output = Self;
    fn sub(self, rhs: Point) -> Self::Output {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl std::ops::SubAssign<Point> for Point {
    fn sub_assign(&mut self, rhs: Point) {
        self.x -= rhs.x;
        self.y -= rhs.y;
    }
}

impl std::ops::Mul<f64> for Point {
    type Output = Self;
    fn mul(self, rhs: f64) -> Self::Output {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

impl std::ops::Neg for Point {
    type Output = Self;
    fn neg(self) -> Self::Output {
        Self::new(-self.x, -self.y)
    }
}

impl From<(f64, f64)> for Point {
    fn from(value: (f64, f64)) -> Self {
        Self {
            x: value.0,
            y: value.1,
        }
    }
}

impl From<[f64; 2]> for Point {
    fn from(value: [f64; 2]) -> Self {
        Self {
            x: value[0],
            y: value[1],
        }
    }
}

impl From<Point> for (f64, f64) {
    fn from(value: Point) -> Self {
        (value.x, value.y)
    }
}

impl Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// An enumeration of the two layout axes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Hash, PartialEq, Eq, Default)]
pub enum Axis {
    /// The horizontal axis.
    #[default]
    X,
    /// The vertical axis.
    Y,
}

#[derive(Debug, Clone, Eq, PartialEq, Error)]
#[error("error parsing axis `{original}`; expected x or y")]
pub struct AxisParseError {
    original: String,
}

impl FromStr for Axis {
    type Err = AxisParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowercase = s.to_lowercase();
        match lowercase.trim() {
            "x" | "horizontal" | "horiz" => Ok(Self::X),
            "y" | "vertical" | "vert" => Ok(Self::Y),
            _ => Err(AxisParseError {
                original: s.to_string(),
            }),
        }
    }
}

impl Axis {
    /// Returns the perpendicular axis.
    pub fn other(self) -> Self {
        match self {
            Self::X => Self::Y,
            Self::Y => Self::X,
        }
    }
}

impl Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::X => write!(f, "x"),
            Self::Y => write!(f, "y"),
        }
    }
}

impl std::ops::Not for Axis {
    type Output = Self;
    fn not(self) -> Self::Output {
        self.other()
    }
}

/// A closed n-sided polygon with arbitrary number of vertices.
///
/// Closure from the last point back to the first is implied;
/// the initial point need not be repeated at the end.
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq)]
pub struct Polygon {
    pub points: Vec<Point>,
}

impl Polygon {
    /// Creates a polygon from its vertices.
    pub fn new(points: impl IntoIterator<Item = impl Into<Point>>) -> Self {
        Self {
            points: points.into_iter().map(Into::into).collect(),
        }
    }

    /// Computes the (unsigned) area enclosed by the polygon.
    pub fn area(&self) -> f64 {
        let n = self.points.len();
        let mut acc = 0.;
        for i in 0..n {
            let p = self.points[i];
            let q = self.points[(i + 1) % n];
            acc += p.x * q.y - q.x * p.y;
        }
        acc.abs() / 2.
    }
}

impl Translate for Polygon {
    fn translate(&mut self, p: Point) {
        for pt in self.points.iter_mut() {
            pt.translate(p);
        }
    }
}

impl From<Rect> for Polygon {
    fn from(r: Rect) -> Self {
        Self {
            points: r.corners().to_vec(),
        }
    }
}

/// An axis-aligned rectangle, specified by lower-left and upper-right corners.
#[derive(Debug, Default, Copy, Clone, Serialize, Deserialize, PartialEq, PartialOrd)]
pub struct Rect {
    /// The lower-left corner.
    pub p0: Point,
    /// The upper-right corner.
    pub p1: Point,
}

impl Rect {
    /// Creates a new rectangle.
    pub fn new(p0: Point, p1: Point) -> Self {
        Self {
            p0: Point::new(p0.x.min(p1.x), p0.y.min(p1.y)),
            p1: Point::new(p0.x.max(p1.x), p0.y.max(p1.y)),
        }
    }

    /// Returns the center point of the rectangle.
    pub fn center(&self) -> Point {
        Point::new((self.p0.x + self.p1.x) / 2., (self.p0.y + self.p1.y) / 2.)
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.p1.x - self.p0.x
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.p1.y - self.p0.y
    }

    #[inline]
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// The four corners, counter-clockwise from the lower-left.
    pub fn corners(&self) -> [Point; 4] {
        [
            self.p0,
            Point::new(self.p1.x, self.p0.y),
            self.p1,
            Point::new(self.p0.x, self.p1.y),
        ]
    }
}

impl Translate for Rect {
    fn translate(&mut self, p: Point) {
        self.p0.translate(p);
        self.p1.translate(p);
    }
}

/// An enumeration of geometric shapes.
///
/// Variants include [`Rect`] and [`Polygon`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[enum_dispatch(Translate)]
pub enum Shape {
    Rect(Rect),
    Polygon(Polygon),
}

impl Shape {
    pub fn as_rect(&self) -> Option<Rect> {
        if let Shape::Rect(rect) = self {
            Some(*rect)
        } else {
            None
        }
    }

    /// Converts the shape into a [`Polygon`].
    pub fn into_polygon(self) -> Polygon {
        match self {
            Self::Rect(r) => r.into(),
            Self::Polygon(p) => p,
        }
    }
}

impl Transform for Shape {
    /// Rectangles stay rectangles under manhattan transformations
    /// and become polygons otherwise.
    fn transform(&self, trans: Transformation) -> Self {
        match self {
            Self::Rect(r) if trans.is_manhattan() => Self::Rect(r.transform(trans)),
            Self::Rect(r) => Self::Polygon(Polygon::from(*r).transform(trans)),
            Self::Polygon(p) => Self::Polygon(p.transform(trans)),
        }
    }
}

impl From<Bbox> for Rect {
    fn from(value: Bbox) -> Self {
        value.into_rect()
    }
}
