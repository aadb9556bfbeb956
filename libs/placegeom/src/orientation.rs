//! Angles, rotations, and reflections.

use serde::{Deserialize, Serialize};

/// Wraps an angle in degrees to the half-open range `[0, 360)`.
///
/// Never returns `360.0` or `-0.0`, even when rounding in `rem_euclid`
/// would otherwise produce them for tiny negative inputs.
pub fn wrap_angle(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(360.);
    if wrapped >= 360. {
        0.
    } else {
        // Adding positive zero turns `-0.0` into `0.0`.
        wrapped + 0.
    }
}

/// Returns `(sin, cos)` of `angle` degrees.
///
/// Exact multiples of 90 degrees produce exact values (0 and ±1),
/// so manhattan rotations never introduce rounding error.
pub fn sin_cos(angle: f64) -> (f64, f64) {
    let angle = wrap_angle(angle);
    if angle == 0. {
        (0., 1.)
    } else if angle == 90. {
        (1., 0.)
    } else if angle == 180. {
        (0., -1.)
    } else if angle == 270. {
        (-1., 0.)
    } else {
        angle.to_radians().sin_cos()
    }
}

/// Returns `true` if `angle` is an exact multiple of 90 degrees.
#[inline]
pub fn is_manhattan(angle: f64) -> bool {
    wrap_angle(angle) % 90. == 0.
}

/// The rotation and reflection of a placed object.
///
/// Reflection (about the x-axis) is applied before rotation.
#[derive(Debug, Default, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Orientation {
    /// Reflect vertically, i.e. negate y coordinates.
    pub reflect_vert: bool,
    /// Counter-clockwise angle in degrees, in `[0, 360)`.
    pub angle: f64,
}

impl Orientation {
    /// Creates a new [`Orientation`]. The angle is wrapped to `[0, 360)`.
    pub fn new(reflect_vert: bool, angle: f64) -> Self {
        Self {
            reflect_vert,
            angle: wrap_angle(angle),
        }
    }

    /// Returns the identity orientation.
    #[inline]
    pub fn identity() -> Self {
        Self::default()
    }

    /// Rotates by `angle` degrees counter-clockwise.
    pub fn rotate(&mut self, angle: f64) -> &mut Self {
        self.angle = wrap_angle(self.angle + angle);
        self
    }

    /// Reflects vertically (about the x-axis).
    ///
    /// Reflecting a rotated object negates its angle.
    pub fn reflect_vert(&mut self) -> &mut Self {
        self.reflect_vert = !self.reflect_vert;
        self.angle = wrap_angle(-self.angle);
        self
    }

    /// Applies this orientation to a direction angle in degrees.
    pub fn apply_to_angle(&self, angle: f64) -> f64 {
        let angle = if self.reflect_vert { -angle } else { angle };
        wrap_angle(angle + self.angle)
    }
}

impl From<f64> for Orientation {
    fn from(angle: f64) -> Self {
        Self::new(false, angle)
    }
}
