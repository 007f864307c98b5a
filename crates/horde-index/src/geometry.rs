//! Primitive 2D shapes shared by the spatial index and the formation engine.
//!
//! Coordinates follow screen conventions: `+x` is right and `+y` is down, so an
//! orientation of `0` faces `-y`.

use serde::{Deserialize, Serialize};
use std::f32::consts::PI;
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, Neg, Sub, SubAssign};

/// 2D float vector used for positions and offsets.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Self = Self::new(0.0, 0.0);

    /// Construct a new vector.
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Unit vector pointing along `angle` (0 faces `-y`, increasing clockwise on screen).
    #[must_use]
    pub fn from_angle(angle: f32) -> Self {
        Self::new(angle.sin(), -angle.cos())
    }

    #[must_use]
    pub fn length_squared(self) -> f32 {
        self.x * self.x + self.y * self.y
    }

    #[must_use]
    pub fn length(self) -> f32 {
        self.length_squared().sqrt()
    }

    #[must_use]
    pub fn distance_squared(self, other: Self) -> f32 {
        (self - other).length_squared()
    }

    #[must_use]
    pub fn distance(self, other: Self) -> f32 {
        self.distance_squared(other).sqrt()
    }

    /// Returns the unit vector in the same direction, or zero for a zero vector.
    #[must_use]
    pub fn normalized(self) -> Self {
        let len = self.length();
        if len <= f32::EPSILON {
            Self::ZERO
        } else {
            self / len
        }
    }

    /// Inverse of [`Vec2::from_angle`]; zero vectors map to `0`.
    #[must_use]
    pub fn to_angle(self) -> f32 {
        if self.length_squared() <= f32::EPSILON {
            return 0.0;
        }
        self.x.atan2(-self.y)
    }

    #[must_use]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Vec2 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Vec2 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl SubAssign for Vec2 {
    fn sub_assign(&mut self, rhs: Self) {
        self.x -= rhs.x;
        self.y -= rhs.y;
    }
}

impl Mul<f32> for Vec2 {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

impl Div<f32> for Vec2 {
    type Output = Self;

    fn div(self, rhs: f32) -> Self {
        Self::new(self.x / rhs, self.y / rhs)
    }
}

impl DivAssign<f32> for Vec2 {
    fn div_assign(&mut self, rhs: f32) {
        self.x /= rhs;
        self.y /= rhs;
    }
}

impl Neg for Vec2 {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.x, -self.y)
    }
}

/// Wraps `value` into the half-open range `[min, max)`.
#[must_use]
pub fn wrap_angle(value: f32, min: f32, max: f32) -> f32 {
    if !value.is_finite() {
        return min;
    }
    let range = max - min;
    if range <= 0.0 {
        return min;
    }
    min + (value - min).rem_euclid(range)
}

/// Wraps an angle into `[-π, π)`. NaN maps to `0`.
#[must_use]
pub fn wrap_signed_angle(angle: f32) -> f32 {
    if angle.is_nan() {
        return 0.0;
    }
    wrap_angle(angle, -PI, PI)
}

/// Circle used for agent footprints and query ranges.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct BoundingCircle {
    pub center: Vec2,
    pub radius: f32,
}

impl BoundingCircle {
    /// Construct a circle; negative radii are clamped to zero.
    #[must_use]
    pub fn new(center: Vec2, radius: f32) -> Self {
        Self {
            center,
            radius: radius.max(0.0),
        }
    }

    /// Circle–circle overlap test. Touching circles intersect.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        let reach = self.radius + other.radius;
        self.center.distance_squared(other.center) <= reach * reach
    }

    #[must_use]
    pub fn contains_point(&self, point: Vec2) -> bool {
        self.center.distance_squared(point) <= self.radius * self.radius
    }

    /// Same centre, radius grown by `amount`.
    #[must_use]
    pub fn inflate(&self, amount: f32) -> Self {
        Self::new(self.center, self.radius + amount)
    }
}

/// Axis-aligned box stored as centre plus half extents.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct BoundingBox {
    pub center: Vec2,
    pub half_extents: Vec2,
}

impl BoundingBox {
    #[must_use]
    pub const fn from_center_half_extents(center: Vec2, half_extents: Vec2) -> Self {
        Self {
            center,
            half_extents,
        }
    }

    /// Box of the given full `width` and `height` around `center`.
    #[must_use]
    pub fn from_center_size(center: Vec2, width: f32, height: f32) -> Self {
        Self::from_center_half_extents(center, Vec2::new(width * 0.5, height * 0.5))
    }

    #[must_use]
    pub fn min(&self) -> Vec2 {
        self.center - self.half_extents
    }

    #[must_use]
    pub fn max(&self) -> Vec2 {
        self.center + self.half_extents
    }

    #[must_use]
    pub fn width(&self) -> f32 {
        self.half_extents.x * 2.0
    }

    #[must_use]
    pub fn height(&self) -> f32 {
        self.half_extents.y * 2.0
    }

    /// Closed containment test: points on the edge are inside.
    #[must_use]
    pub fn contains_point(&self, point: Vec2) -> bool {
        let min = self.min();
        let max = self.max();
        point.x >= min.x && point.x <= max.x && point.y >= min.y && point.y <= max.y
    }

    /// A circle is admitted by a node when its centre lies inside the box.
    #[must_use]
    pub fn contains_circle_center(&self, circle: &BoundingCircle) -> bool {
        self.contains_point(circle.center)
    }

    /// Box–circle overlap via the closest point on the box.
    #[must_use]
    pub fn intersects_circle(&self, circle: &BoundingCircle) -> bool {
        let min = self.min();
        let max = self.max();
        let closest = Vec2::new(
            circle.center.x.clamp(min.x, max.x),
            circle.center.y.clamp(min.y, max.y),
        );
        closest.distance_squared(circle.center) <= circle.radius * circle.radius
    }

    /// Clamp `point` into the box.
    #[must_use]
    pub fn clamp_point(&self, point: Vec2) -> Vec2 {
        let min = self.min();
        let max = self.max();
        Vec2::new(point.x.clamp(min.x, max.x), point.y.clamp(min.y, max.y))
    }

    /// The four equal quadrants in NW, NE, SW, SE order.
    #[must_use]
    pub fn quadrants(&self) -> [Self; 4] {
        let half = self.half_extents * 0.5;
        let Vec2 { x: cx, y: cy } = self.center;
        [
            Self::from_center_half_extents(Vec2::new(cx - half.x, cy - half.y), half),
            Self::from_center_half_extents(Vec2::new(cx + half.x, cy - half.y), half),
            Self::from_center_half_extents(Vec2::new(cx - half.x, cy + half.y), half),
            Self::from_center_half_extents(Vec2::new(cx + half.x, cy + half.y), half),
        ]
    }

    /// Index into [`BoundingBox::quadrants`] of the quadrant that owns `point`.
    ///
    /// Decided by comparison with the centre alone, so every point of the box maps
    /// to some quadrant even when a child's recomputed edges round inward. Points on
    /// a dividing line go to the earlier quadrant in NW, NE, SW, SE order.
    #[must_use]
    pub fn quadrant_of(&self, point: Vec2) -> usize {
        usize::from(point.x > self.center.x) + 2 * usize::from(point.y > self.center.y)
    }

    /// Returns true when both extents are strictly positive and finite.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.center.is_finite()
            && self.half_extents.is_finite()
            && self.half_extents.x > 0.0
            && self.half_extents.y > 0.0
    }
}
