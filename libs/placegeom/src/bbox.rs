//! Rectangular bounding boxes and associated trait implementations.

use serde::{Deserialize, Serialize};

use super::{Point, Polygon, Rect, Shape};

/// An axis-aligned rectangular bounding box.
///
/// Points `p0` and `p1` represent opposite corners of a bounding rectangle.
/// `p0` is always closest to negative-infinity, in both x and y,
/// and `p1` is always closest to positive-infinity.
///
/// This differs from [`Rect`] in that it could be empty, meaning that `p0`
/// is to the upper right of `p1`.
#[derive(Debug, Copy, Clone, Deserialize, Serialize, PartialEq)]
pub struct Bbox {
    pub p0: Point,
    pub p1: Point,
}

impl Default for Bbox {
    fn default() -> Self {
        Self::empty()
    }
}

impl Bbox {
    /// Create a new [`Bbox`] from two [`Point`]s.
    #[inline]
    pub fn new(p0: Point, p1: Point) -> Self {
        Self {
            p0: Point::new(p0.x.min(p1.x), p0.y.min(p1.y)),
            p1: Point::new(p0.x.max(p1.x), p0.y.max(p1.y)),
        }
    }
    /// Creates a bounding box that encloses only the origin `(0, 0)`.
    #[inline]
    pub fn zero() -> Self {
        Self::new(Point::zero(), Point::zero())
    }
    /// Finds the width of the bounding box in the x-direction.
    #[inline]
    pub fn width(&self) -> f64 {
        self.p1.x - self.p0.x
    }
    /// Finds the height of the bounding box in the y-direction.
    #[inline]
    pub fn height(&self) -> f64 {
        self.p1.y - self.p0.y
    }
    /// Creates a new [`Bbox`] from a single [`Point`].
    ///
    /// The resultant [`Bbox`] comprises solely of the point, having zero area.
    pub fn from_point(pt: Point) -> Self {
        Self { p0: pt, p1: pt }
    }
    /// Creates an empty, otherwise invalid bounding box.
    pub fn empty() -> Self {
        Self {
            p0: Point::new(f64::INFINITY, f64::INFINITY),
            p1: Point::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }
    /// Returns `true` if the bounding box is empty.
    pub fn is_empty(&self) -> bool {
        self.p0.x > self.p1.x || self.p0.y > self.p1.y
    }
    /// Returns true if [`Point`] `pt` lies inside the bounding box.
    pub fn contains(&self, pt: Point) -> bool {
        self.p0.x <= pt.x && self.p1.x >= pt.x && self.p0.y <= pt.y && self.p1.y >= pt.y
    }
    /// Returns the bounding box's size as an (x,y) tuple.
    pub fn size(&self) -> (f64, f64) {
        (self.width(), self.height())
    }
    /// Returns the bounding box's center.
    pub fn center(&self) -> Point {
        Point::new((self.p0.x + self.p1.x) / 2., (self.p0.y + self.p1.y) / 2.)
    }
    /// Rounds both corners to the nearest multiple of `grid`.
    ///
    /// Empty boxes are returned unchanged.
    pub fn snapped(&self, grid: f64) -> Self {
        if self.is_empty() {
            return *self;
        }
        Self::new(self.p0.snap_to_grid(grid), self.p1.snap_to_grid(grid))
    }

    /// Converts a bounding box into a [`Rect`].
    #[inline]
    pub fn into_rect(self) -> Rect {
        Rect::new(self.p0, self.p1)
    }
}

impl From<Rect> for Bbox {
    fn from(r: Rect) -> Self {
        Self { p0: r.p0, p1: r.p1 }
    }
}

/// A trait representing functions available for objects with a bounding box.
pub trait BoundBox {
    /// Compute a rectangular bounding box around the implementing type.
    fn bbox(&self) -> Bbox;
    /// Computes the rectangular bounding box and converts it to a [`Rect`].
    fn brect(&self) -> Rect {
        self.bbox().into_rect()
    }
    /// Computes the intersection with rectangular bounding box `bbox`.
    ///
    /// Creates and returns a new [`Bbox`].
    /// Default implementation is to return the intersection of `self.bbox()` and `bbox`.
    fn intersection(&self, bbox: Bbox) -> Bbox {
        self.bbox().intersection(bbox)
    }
    /// Computes the union with rectangular bounding box `bbox`.
    ///
    /// Creates and returns a new [Bbox].
    /// Default implementation is to return the union of `self.bbox()` and `bbox`.
    fn union(&self, bbox: Bbox) -> Bbox {
        self.bbox().union(bbox)
    }
}

impl<T> BoundBox for &T
where
    T: BoundBox,
{
    fn bbox(&self) -> Bbox {
        T::bbox(*self)
    }
}

impl BoundBox for Bbox {
    fn bbox(&self) -> Bbox {
        *self
    }
    fn intersection(&self, bbox: Bbox) -> Bbox {
        let pmin = Point::new(self.p0.x.max(bbox.p0.x), self.p0.y.max(bbox.p0.y));
        let pmax = Point::new(self.p1.x.min(bbox.p1.x), self.p1.y.min(bbox.p1.y));
        // Check for empty intersection, and return an empty box if so
        if pmin.x > pmax.x || pmin.y > pmax.y {
            return Bbox::empty();
        }
        Bbox::new(pmin, pmax)
    }
    fn union(&self, bbox: Bbox) -> Bbox {
        if bbox.is_empty() {
            return *self;
        }
        if self.is_empty() {
            return bbox;
        }
        // Take the minimum and maximum of the two bounding boxes
        Bbox::new(
            Point::new(self.p0.x.min(bbox.p0.x), self.p0.y.min(bbox.p0.y)),
            Point::new(self.p1.x.max(bbox.p1.x), self.p1.y.max(bbox.p1.y)),
        )
    }
}

impl BoundBox for Point {
    fn bbox(&self) -> Bbox {
        Bbox::from_point(*self)
    }
}

impl BoundBox for Rect {
    fn bbox(&self) -> Bbox {
        Bbox::from(*self)
    }
}

impl BoundBox for Polygon {
    fn bbox(&self) -> Bbox {
        self.points.bbox()
    }
}

impl BoundBox for Shape {
    fn bbox(&self) -> Bbox {
        match self {
            Shape::Rect(r) => r.bbox(),
            Shape::Polygon(p) => p.bbox(),
        }
    }
}

impl BoundBox for Vec<Point> {
    fn bbox(&self) -> Bbox {
        // Take the union of all points in the vector
        let mut bbox = Bbox::empty();
        for pt in self {
            bbox = bbox.union(pt.bbox());
        }
        bbox
    }
}

/// Named anchor points and extents derived from a bounding box.
///
/// Used by downstream placement and packing code to align objects
/// against each other's corners, edge midpoints, and centers.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizeInfo {
    pub west: f64,
    pub east: f64,
    pub south: f64,
    pub north: f64,
    pub width: f64,
    pub height: f64,
}

impl SizeInfo {
    /// Creates a new [`SizeInfo`] from a bounding box.
    ///
    /// An empty box is treated as [`Bbox::zero`].
    pub fn new(bbox: Bbox) -> Self {
        let bbox = if bbox.is_empty() { Bbox::zero() } else { bbox };
        Self {
            west: bbox.p0.x,
            east: bbox.p1.x,
            south: bbox.p0.y,
            north: bbox.p1.y,
            width: bbox.width(),
            height: bbox.height(),
        }
    }

    #[inline]
    fn xc(&self) -> f64 {
        0.5 * (self.east + self.west)
    }

    #[inline]
    fn yc(&self) -> f64 {
        0.5 * (self.north + self.south)
    }

    pub fn sw(&self) -> Point {
        Point::new(self.west, self.south)
    }
    pub fn se(&self) -> Point {
        Point::new(self.east, self.south)
    }
    pub fn nw(&self) -> Point {
        Point::new(self.west, self.north)
    }
    pub fn ne(&self) -> Point {
        Point::new(self.east, self.north)
    }
    /// Center of the west edge.
    pub fn cw(&self) -> Point {
        Point::new(self.west, self.yc())
    }
    /// Center of the east edge.
    pub fn ce(&self) -> Point {
        Point::new(self.east, self.yc())
    }
    /// Center of the north edge.
    pub fn nc(&self) -> Point {
        Point::new(self.xc(), self.north)
    }
    /// Center of the south edge.
    pub fn sc(&self) -> Point {
        Point::new(self.xc(), self.south)
    }
    pub fn center(&self) -> Point {
        Point::new(self.xc(), self.yc())
    }

    /// Returns the corners of the box grown by the given paddings,
    /// counter-clockwise from the south-west corner.
    pub fn rect(&self, padding: Padding) -> [Point; 4] {
        let w = self.west - padding.west;
        let e = self.east + padding.east;
        let s = self.south - padding.south;
        let n = self.north + padding.north;
        [
            Point::new(w, s),
            Point::new(e, s),
            Point::new(e, n),
            Point::new(w, n),
        ]
    }
}

impl From<Bbox> for SizeInfo {
    fn from(value: Bbox) -> Self {
        Self::new(value)
    }
}

impl std::fmt::Display for SizeInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "w: {}", self.west)?;
        writeln!(f, "e: {}", self.east)?;
        writeln!(f, "s: {}", self.south)?;
        writeln!(f, "n: {}", self.north)
    }
}

/// Per-side padding used by [`SizeInfo::rect`].
#[derive(Debug, Default, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Padding {
    pub west: f64,
    pub east: f64,
    pub south: f64,
    pub north: f64,
}

impl Padding {
    /// The same padding on every side.
    pub fn uniform(padding: f64) -> Self {
        Self {
            west: padding,
            east: padding,
            south: padding,
            north: padding,
        }
    }
}
