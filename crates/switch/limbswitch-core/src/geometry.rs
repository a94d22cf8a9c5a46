//! Vector helpers used while matching one limb representation onto the other.

use serde::{Deserialize, Serialize};

use limbswitch_scene_core::Vec3;

/// Signed principal axis of a joint's local offset.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    #[serde(rename = "-x")]
    NegX,
    Y,
    #[serde(rename = "-y")]
    NegY,
    Z,
    #[serde(rename = "-z")]
    NegZ,
}

impl Axis {
    /// Host-style label: `"x"`, `"-x"`, ...
    pub fn label(self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::NegX => "-x",
            Axis::Y => "y",
            Axis::NegY => "-y",
            Axis::Z => "z",
            Axis::NegZ => "-z",
        }
    }

    /// Component index, sign dropped.
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Axis::X | Axis::NegX => 0,
            Axis::Y | Axis::NegY => 1,
            Axis::Z | Axis::NegZ => 2,
        }
    }

    #[inline]
    pub fn is_negative(self) -> bool {
        matches!(self, Axis::NegX | Axis::NegY | Axis::NegZ)
    }

    /// Signed unit vector along the axis.
    pub fn unit(self) -> Vec3 {
        let mut v = Vec3::zeros();
        v[self.index()] = if self.is_negative() { -1.0 } else { 1.0 };
        v
    }

    /// Unsigned component of `v` on this axis (e.g. the `sx` of a scale).
    #[inline]
    pub fn component(self, v: &Vec3) -> f64 {
        v[self.index()]
    }
}

/// Axis whose component has the largest magnitude, with its signed unit vector.
///
/// Ties keep the first component encountered. The sign is decided on the
/// value rounded to 4 decimals, so tiny negative noise counts as positive.
pub fn dominant_axis(delta: &Vec3) -> (Axis, Vec3) {
    let mut index = 0;
    for i in 1..3 {
        if delta[i].abs() > delta[index].abs() {
            index = i;
        }
    }
    let rounded = (delta[index] * 1e4).round() / 1e4;
    let negative = rounded < 0.0;
    let axis = match (index, negative) {
        (0, false) => Axis::X,
        (0, true) => Axis::NegX,
        (1, false) => Axis::Y,
        (1, true) => Axis::NegY,
        (_, false) => Axis::Z,
        (_, true) => Axis::NegZ,
    };
    (axis, axis.unit())
}

/// Double `vector` until it is at least `magnitude` long, at most `attempts` times.
///
/// Doubling overshoots; callers rely on the result being "far enough", not exact.
pub fn match_magnitude(vector: Vec3, magnitude: f64, attempts: u32) -> Vec3 {
    let mut v = vector;
    let mut remaining = attempts;
    while v.norm() < magnitude && remaining > 0 {
        v *= 2.0;
        remaining -= 1;
    }
    v
}

/// Push the mid point of a three-point chain away from the root/end midpoint.
///
/// `offset = p1 - (p0 + p2) / 2` is doubled (bounded by `max_doublings`) until
/// it reaches `magnitude`; the result is `mid + offset`, on the ray from the
/// midpoint through `p1`.
pub fn pole_vector_from_three(p0: Vec3, p1: Vec3, p2: Vec3, magnitude: f64, max_doublings: u32) -> Vec3 {
    let mid = (p0 + p2) / 2.0;
    let offset = match_magnitude(p1 - mid, magnitude, max_doublings);
    mid + offset
}

/// Pole placement used when matching IK onto FK: the offset is pushed out to
/// `distance` beyond its own length.
pub fn pole_vector_position(p0: Vec3, p1: Vec3, p2: Vec3, distance: f64, max_doublings: u32) -> Vec3 {
    let mid = (p0 + p2) / 2.0;
    let reach = distance + (p1 - mid).norm();
    pole_vector_from_three(p0, p1, p2, reach, max_doublings)
}

/// True when `p0→p1` is parallel to `p0→p2` within `angular_threshold` radians.
///
/// Zero-length offsets count as colinear: the bend plane is undefined.
pub fn is_near_colinear(p0: Vec3, p1: Vec3, p2: Vec3, angular_threshold: f64) -> bool {
    let a = p1 - p0;
    let b = p2 - p0;
    let (la, lb) = (a.norm(), b.norm());
    if la <= f64::EPSILON || lb <= f64::EPSILON {
        return true;
    }
    let cos = (a.dot(&b) / (la * lb)).abs().min(1.0);
    cos.acos() <= angular_threshold
}
