//! Transformation types and traits.

use enum_dispatch::enum_dispatch;
use serde::{Deserialize, Serialize};

use super::orientation::{self, wrap_angle, Orientation};
use super::{Point, Polygon, Rect};

/// A 2x2 rotation-matrix and two-entry translation vector,
/// used for relative movement of [Point]s and [Shape](super::Shape)s.
///
/// The matrix encodes reflection, magnification, and rotation,
/// applied to a point in that order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transformation {
    /// The transformation matrix represented in row-major order.
    pub a: [[f64; 2]; 2],
    /// The x-y translation applied after the transformation.
    pub b: [f64; 2],
}

impl Default for Transformation {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transformation {
    /// Returns the identity transform, leaving any transformed object unmodified.
    pub fn identity() -> Self {
        Self {
            a: [[1., 0.], [0., 1.]],
            b: [0., 0.],
        }
    }
    /// Returns a translation by `(x,y)`.
    pub fn translate(x: f64, y: f64) -> Self {
        Self {
            a: [[1., 0.], [0., 1.]],
            b: [x, y],
        }
    }
    /// Returns a rotatation by `angle` degrees.
    pub fn rotate(angle: f64) -> Self {
        let (sin, cos) = orientation::sin_cos(angle);
        Self {
            a: [[cos, -sin], [sin, cos]],
            b: [0., 0.],
        }
    }
    /// Returns a reflection about the x-axis.
    pub fn reflect_vert() -> Self {
        Self {
            a: [[1., 0.], [0., -1.]],
            b: [0., 0.],
        }
    }
    /// Returns a uniform scaling by `mag` about the origin.
    pub fn scale(mag: f64) -> Self {
        Self {
            a: [[mag, 0.], [0., mag]],
            b: [0., 0.],
        }
    }

    /// Returns a rotation by `angle` degrees about `center`.
    ///
    /// Built as translate-to-origin, rotate, translate-back.
    pub fn rotate_about(angle: f64, center: Point) -> Self {
        let to_origin = Self::translate(-center.x, -center.y);
        let back = Self::translate(center.x, center.y);
        Self::cascade(back, Self::cascade(Self::rotate(angle), to_origin))
    }

    /// Returns a reflection about the line through `p1` and `p2`.
    ///
    /// The line is first moved onto the x-axis (translate `p1` to the origin,
    /// then rotate by minus the line's angle), reflected, and moved back.
    /// The order of these steps is load-bearing.
    pub fn reflect_about(p1: Point, p2: Point) -> Self {
        let theta = (p2.y - p1.y).atan2(p2.x - p1.x).to_degrees();
        let mut t = Self::translate(p1.x, p1.y);
        t = Self::cascade(t, Self::rotate(theta));
        t = Self::cascade(t, Self::reflect_vert());
        t = Self::cascade(t, Self::rotate(-theta));
        Self::cascade(t, Self::translate(-p1.x, -p1.y))
    }

    /// Returns a new [`TransformationBuilder`].
    #[inline]
    pub fn builder() -> TransformationBuilder {
        TransformationBuilder::default()
    }

    /// Creates a transform from a location, angle, and a bool indicating
    /// whether or not to reflect vertically.
    pub fn with_opts(loc: Point, reflect_vert: bool, angle: Option<f64>) -> Self {
        Self::builder()
            .point(loc)
            .reflect_vert(reflect_vert)
            .angle_opt(angle)
            .build()
    }

    /// Create a new [`Transformation`] that is the cascade of `parent` and `child`.
    ///
    /// "Parents" and "children" refer to typical layout-instance hierarchies,
    /// in which each layer of instance has a nested set of transformations relative to its top-level parent.
    /// Applying the result to a point is equivalent to applying `child`, then `parent`.
    ///
    /// Note this operation *is not* commutative.
    /// For example the set of transformations:
    /// * (a) Reflect vertically, then
    /// * (b) Translate by (1,1)
    /// * (c) Place a point at (local coordinate) (1,1)
    /// Lands said point at (2,-2) in top-level space,
    /// whereas reversing the order of (a) and (b) lands it at (2,0).
    pub fn cascade(parent: Transformation, child: Transformation) -> Transformation {
        // The result-transform's origin is the parent's origin,
        // plus the parent-transformed child's origin
        let mut b = matvec(&parent.a, &child.b);
        b[0] += parent.b[0];
        b[1] += parent.b[1];
        // And the cascade-matrix is the product of the parent's and child's
        let a = matmul(&parent.a, &child.a);
        Self { a, b }
    }

    /// Returns the translation component.
    pub fn offset_point(&self) -> Point {
        Point::new(self.b[0], self.b[1])
    }

    /// Returns `true` if the transformation includes a reflection.
    #[inline]
    pub fn is_mirrored(&self) -> bool {
        self.det() < 0.
    }

    /// Returns the uniform magnification.
    #[inline]
    pub fn magnification(&self) -> f64 {
        self.a[0][0].hypot(self.a[1][0])
    }

    /// Returns the rotation angle in degrees, in `[0, 360)`.
    ///
    /// Axis-aligned matrices decompose without touching trigonometry.
    pub fn angle(&self) -> f64 {
        let (cos, sin) = (self.a[0][0], self.a[1][0]);
        if sin == 0. && cos > 0. {
            0.
        } else if cos == 0. && sin > 0. {
            90.
        } else if sin == 0. && cos < 0. {
            180.
        } else if cos == 0. && sin < 0. {
            270.
        } else {
            wrap_angle(sin.atan2(cos).to_degrees())
        }
    }

    /// Decomposes into an [`Orientation`].
    pub fn orientation(&self) -> Orientation {
        Orientation {
            reflect_vert: self.is_mirrored(),
            angle: self.angle(),
        }
    }

    /// Returns `true` if the transformation maps axis-aligned shapes
    /// onto axis-aligned shapes.
    pub fn is_manhattan(&self) -> bool {
        (self.a[0][1] == 0. && self.a[1][0] == 0.) || (self.a[0][0] == 0. && self.a[1][1] == 0.)
    }

    #[inline]
    fn det(&self) -> f64 {
        self.a[0][0] * self.a[1][1] - self.a[0][1] * self.a[1][0]
    }
}

impl<T> From<T> for Transformation
where
    T: Into<Orientation>,
{
    fn from(value: T) -> Self {
        Self::builder().orientation(value).build()
    }
}

/// A builder for creating transformations from translations, [`Orientation`]s,
/// and magnifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformationBuilder {
    x: f64,
    y: f64,
    reflect_vert: bool,
    angle: f64,
    mag: f64,
}

impl Default for TransformationBuilder {
    fn default() -> Self {
        Self {
            x: 0.,
            y: 0.,
            reflect_vert: false,
            angle: 0.,
            mag: 1.,
        }
    }
}

impl TransformationBuilder {
    /// Specifies the x-y translation encoded by the transformation.
    pub fn point(&mut self, point: impl Into<Point>) -> &mut Self {
        let point = point.into();
        self.x = point.x;
        self.y = point.y;
        self
    }

    /// Specifies the [`Orientation`] applied by this transformation.
    pub fn orientation(&mut self, o: impl Into<Orientation>) -> &mut Self {
        let o = o.into();
        self.reflect_vert = o.reflect_vert;
        self.angle = o.angle;
        self
    }

    /// Specifies the angle of rotation encoded by this transformation.
    pub fn angle(&mut self, angle: f64) -> &mut Self {
        self.angle = angle;
        self
    }

    /// Specifies the angle of rotation encoded by this transformation as an [`Option`].
    pub fn angle_opt(&mut self, angle: Option<f64>) -> &mut Self {
        self.angle = angle.unwrap_or_default();
        self
    }

    /// Specifies whether the transformation results in a vertical reflection.
    pub fn reflect_vert(&mut self, reflect_vert: bool) -> &mut Self {
        self.reflect_vert = reflect_vert;
        self
    }

    /// Specifies the uniform magnification.
    pub fn mag(&mut self, mag: f64) -> &mut Self {
        self.mag = mag;
        self
    }

    /// Builds a [`Transformation`] from the specified parameters.
    pub fn build(&mut self) -> Transformation {
        let b = [self.x, self.y];
        let (sin, cos) = orientation::sin_cos(self.angle);
        let sin_refl = if self.reflect_vert { sin } else { -sin };
        let cos_refl = if self.reflect_vert { -cos } else { cos };
        let m = self.mag;
        let a = [[m * cos, m * sin_refl], [m * sin, m * cos_refl]];
        Transformation { a, b }
    }
}

/// Multiples two 2x2 matrices, returning a new 2x2 matrix
fn matmul(a: &[[f64; 2]; 2], b: &[[f64; 2]; 2]) -> [[f64; 2]; 2] {
    [
        [
            a[0][0] * b[0][0] + a[0][1] * b[1][0],
            a[0][0] * b[0][1] + a[0][1] * b[1][1],
        ],
        [
            a[1][0] * b[0][0] + a[1][1] * b[1][0],
            a[1][0] * b[0][1] + a[1][1] * b[1][1],
        ],
    ]
}
/// Multiplies a 2x2 matrix by a 2-entry vector, returning a new 2-entry vector.
fn matvec(a: &[[f64; 2]; 2], b: &[f64; 2]) -> [f64; 2] {
    [
        a[0][0] * b[0] + a[0][1] * b[1],
        a[1][0] * b[0] + a[1][1] * b[1],
    ]
}

/// Rotates `point` by `angle` degrees about `center`.
///
/// A zero angle returns the point untouched and 180 degrees is an exact
/// reflection through `center`; neither touches trigonometry.
pub fn rotate_point(point: Point, angle: f64, center: Point) -> Point {
    if angle == 0. {
        return point;
    }
    let displacement = point - center;
    if angle == 180. {
        return center - displacement;
    }
    let (sin, cos) = orientation::sin_cos(angle);
    Point::new(
        displacement.x * cos - displacement.y * sin + center.x,
        displacement.y * cos + displacement.x * sin + center.y,
    )
}

/// A trait for specifying how an object is changed by a transformation.
pub trait Transform {
    /// Applies matrix-vector [`Transformation`] `trans`.
    ///
    /// Creates a new shape at a location equal to the transformation of our own.
    fn transform(&self, trans: Transformation) -> Self;
}

impl Transform for Point {
    fn transform(&self, trans: Transformation) -> Self {
        let x = trans.a[0][0] * self.x + trans.a[0][1] * self.y + trans.b[0];
        let y = trans.a[1][0] * self.x + trans.a[1][1] * self.y + trans.b[1];
        Self { x, y }
    }
}

impl Transform for Rect {
    /// Returns the bounding rectangle of the transformed corners.
    fn transform(&self, trans: Transformation) -> Self {
        let mut corners = self.corners().map(|p| p.transform(trans)).into_iter();
        // A rectangle always has four corners.
        let first = corners.next().unwrap_or_default();
        corners.fold(Rect::new(first, first), |r, p| {
            Rect::new(
                Point::new(r.p0.x.min(p.x), r.p0.y.min(p.y)),
                Point::new(r.p1.x.max(p.x), r.p1.y.max(p.y)),
            )
        })
    }
}

impl Transform for Polygon {
    fn transform(&self, trans: Transformation) -> Self {
        Polygon {
            points: self.points.iter().map(|p| p.transform(trans)).collect(),
        }
    }
}

/// A trait for specifying how a shape is translated by a [`Point`].
#[enum_dispatch]
pub trait Translate {
    /// Translates the shape by a [`Point`] through mutation.
    fn translate(&mut self, p: Point);
}

impl Translate for Point {
    fn translate(&mut self, p: Point) {
        self.x += p.x;
        self.y += p.y;
    }
}

#[cfg(test)]
mod tests {
    use float_eq::assert_float_eq;

    use super::*;

    fn assert_points_close(a: Point, b: Point) {
        assert_float_eq!(a.x, b.x, abs <= 1e-9);
        assert_float_eq!(a.y, b.y, abs <= 1e-9);
    }

    #[test]
    fn test_matvec() {
        let a = [[1., 2.], [3., 4.]];
        let b = [5., 6.];
        assert_eq!(matvec(&a, &b), [17., 39.]);
    }

    #[test]
    fn test_matmul() {
        let a = [[1., 2.], [3., 4.]];
        let b = [[5., 6.], [7., 8.]];
        assert_eq!(matmul(&a, &b), [[19., 22.], [43., 50.]]);
    }

    #[test]
    fn cascade_identity() {
        for angle in [0., 90., 180., 270., 33.] {
            for reflect in [false, true] {
                let tf = Transformation::with_opts(Point::new(520., 130.), reflect, Some(angle));
                let casc = Transformation::cascade(tf, Transformation::identity());
                assert_eq!(tf, casc);
            }
        }
    }

    #[test]
    fn transformation_components_round_trip() {
        let pt = Point::new(8930., 730.);
        for angle in [0., 90., 180., 270., 12.5, 301.] {
            for reflect_vert in [false, true] {
                let o = Orientation::new(reflect_vert, angle);
                let tf = Transformation::builder().point(pt).orientation(o).mag(2.).build();
                assert_eq!(tf.offset_point(), pt);
                assert_eq!(tf.is_mirrored(), reflect_vert);
                assert_float_eq!(tf.angle(), angle, abs <= 1e-9);
                assert_float_eq!(tf.magnification(), 2., abs <= 1e-12);
            }
        }
    }

    #[test]
    fn builder_matches_cascade_order() {
        // mirror, then scale, then rotate, then translate
        let built = Transformation::builder()
            .point((3., -4.))
            .reflect_vert(true)
            .angle(90.)
            .mag(2.)
            .build();
        let mut chained = Transformation::reflect_vert();
        chained = Transformation::cascade(Transformation::scale(2.), chained);
        chained = Transformation::cascade(Transformation::rotate(90.), chained);
        chained = Transformation::cascade(Transformation::translate(3., -4.), chained);
        assert_eq!(built, chained);
    }

    #[test]
    fn rotate_about_center() {
        let t = Transformation::rotate_about(90., Point::new(1., 1.));
        assert_eq!(Point::new(2., 1.).transform(t), Point::new(1., 2.));
        assert_eq!(Point::new(1., 1.).transform(t), Point::new(1., 1.));
    }

    #[test]
    fn reflect_about_arbitrary_line() {
        // The line y = x swaps coordinates.
        let t = Transformation::reflect_about(Point::zero(), Point::new(1., 1.));
        assert_points_close(Point::new(3., 1.).transform(t), Point::new(1., 3.));
        assert!(t.is_mirrored());

        // The vertical line x = 2.
        let t = Transformation::reflect_about(Point::new(2., 1.), Point::new(2., 0.));
        assert_points_close(Point::new(5., 7.).transform(t), Point::new(-1., 7.));

        let twice = Transformation::cascade(t, t);
        assert_points_close(Point::new(5., 7.).transform(twice), Point::new(5., 7.));
    }

    #[test]
    fn rotate_point_fast_paths() {
        let p = Point::new(0.1, 0.7);
        let c = Point::new(-3.3, 2.);
        assert_eq!(rotate_point(p, 0., c), p);
        assert_eq!(rotate_point(p, 180., c), c - (p - c));
        assert_points_close(rotate_point(p, 90., c), Point::new(-2., 5.4));
        assert_points_close(rotate_point(rotate_point(p, 37., c), -37., c), p);
    }

    #[test]
    fn rotate_point_agrees_with_matrix() {
        let p = Point::new(4., -2.5);
        for angle in [90., 270., 45., 123.4] {
            let by_matrix = p.transform(Transformation::rotate(angle));
            assert_eq!(rotate_point(p, angle, Point::zero()), by_matrix);
        }
    }
}
