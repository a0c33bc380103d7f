//! 2D vector and angle math
//!
//! Angles are radians. Normalized angles lie in (-π, π].

use serde::{Deserialize, Serialize};
use std::f32::consts::{PI, TAU};
use std::ops::{Add, AddAssign, Mul, MulAssign, Neg, Sub, SubAssign};

/// 2D vector in field units
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    #[inline]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Unit vector pointing along `angle`
    #[inline]
    pub fn from_angle(angle: f32) -> Self {
        Self::new(angle.cos(), angle.sin())
    }

    #[inline]
    pub fn magnitude(self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// Direction of the vector (atan2)
    #[inline]
    pub fn angle(self) -> f32 {
        self.y.atan2(self.x)
    }

    /// Unit vector in the same direction, or `None` for a (near) zero vector
    pub fn normalized(self) -> Option<Self> {
        let len = self.magnitude();
        if len <= f32::EPSILON {
            None
        } else {
            Some(self * (1.0 / len))
        }
    }

    #[inline]
    pub fn distance(self, other: Self) -> f32 {
        (self - other).magnitude()
    }

    #[inline]
    pub fn is_zero(self) -> bool {
        self.x == 0.0 && self.y == 0.0
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

impl MulAssign<f32> for Vec2 {
    fn mul_assign(&mut self, rhs: f32) {
        self.x *= rhs;
        self.y *= rhs;
    }
}

impl Neg for Vec2 {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y)
    }
}

/// Axis-aligned rectangle, `(x, y)` is the top-left corner
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn left(&self) -> f32 {
        self.x
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn top(&self) -> f32 {
        self.y
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Corners in the order bottom-left, top-left, top-right, bottom-right
    pub fn corners(&self) -> [Vec2; 4] {
        [
            Vec2::new(self.left(), self.bottom()),
            Vec2::new(self.left(), self.top()),
            Vec2::new(self.right(), self.top()),
            Vec2::new(self.right(), self.bottom()),
        ]
    }

    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.left()
            && point.x <= self.right()
            && point.y >= self.top()
            && point.y <= self.bottom()
    }
}

/// Wrap an angle into (-π, π]
pub fn normalize_angle(angle: f32) -> f32 {
    if !angle.is_finite() {
        return 0.0;
    }
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    // rem_euclid maps π onto -π; keep the upper bound inclusive
    if wrapped <= -PI {
        wrapped + TAU
    } else {
        wrapped
    }
}

/// Shortest signed rotation taking `from` to `to`
pub fn angle_delta(from: f32, to: f32) -> f32 {
    normalize_angle(normalize_angle(to) - normalize_angle(from))
}

/// Rotate `from` towards `to` by fraction `t` of the shortest delta.
///
/// `t` is clamped to [0, 1] so a large step never overshoots the target.
pub fn angle_lerp(from: f32, to: f32, t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    normalize_angle(from + angle_delta(from, to) * t)
}

/// Mirror an incoming direction about a surface normal.
///
/// The normal points away from the surface into open space.
pub fn reflection_angle(incoming: f32, normal: f32) -> f32 {
    normalize_angle(normal + angle_delta(incoming, normal + PI))
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-5;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < EPS
    }

    #[test]
    fn magnitude_and_angle() {
        let v = Vec2::new(3.0, 4.0);
        assert!(close(v.magnitude(), 5.0));
        assert!(close(Vec2::new(0.0, 2.0).angle(), PI / 2.0));
        assert!(close(Vec2::new(1.0, 1.0).distance(Vec2::new(4.0, 5.0)), 5.0));
    }

    #[test]
    fn normalized_zero_is_none() {
        assert!(Vec2::ZERO.normalized().is_none());
        let n = Vec2::new(10.0, 0.0).normalized().unwrap();
        assert!(close(n.x, 1.0) && close(n.y, 0.0));
    }

    #[test]
    fn normalize_angle_range() {
        assert!(close(normalize_angle(PI), PI));
        assert!(close(normalize_angle(-PI), PI));
        assert!(close(angle_delta(normalize_angle(3.0 * PI), PI), 0.0));
        assert!(close(normalize_angle(TAU + 0.5), 0.5));
        assert!(close(normalize_angle(-TAU - 0.5), -0.5));
        assert_eq!(normalize_angle(f32::NAN), 0.0);
    }

    #[test]
    fn angle_delta_takes_short_way() {
        // 170° to -170° is +20°, not -340°
        let from = 170f32.to_radians();
        let to = (-170f32).to_radians();
        assert!(close(angle_delta(from, to), 20f32.to_radians()));
        assert!(close(angle_delta(to, from), (-20f32).to_radians()));
    }

    #[test]
    fn angle_lerp_never_overshoots() {
        let from = 170f32.to_radians();
        let to = (-170f32).to_radians();
        let half = angle_lerp(from, to, 0.5);
        assert!(close(angle_delta(half, PI), 0.0));
        assert!(close(angle_lerp(from, to, 5.0), to));
        assert!(close(angle_lerp(from, to, 0.0), from));
    }

    #[test]
    fn reflection_off_floor() {
        // Moving down-right, floor normal points up (-y in screen space)
        let incoming = Vec2::new(1.0, 1.0).angle();
        let normal = -PI / 2.0;
        let out = Vec2::from_angle(reflection_angle(incoming, normal));
        assert!(close(out.x, std::f32::consts::FRAC_1_SQRT_2));
        assert!(close(out.y, -std::f32::consts::FRAC_1_SQRT_2));
    }

    #[test]
    fn reflection_head_on_reverses() {
        let out = reflection_angle(0.0, PI);
        assert!(close(angle_delta(out, PI), 0.0));
    }

    #[test]
    fn rect_corners_and_contains() {
        let r = Rect::new(10.0, 20.0, 30.0, 40.0);
        let [bl, tl, tr, br] = r.corners();
        assert_eq!(bl, Vec2::new(10.0, 60.0));
        assert_eq!(tl, Vec2::new(10.0, 20.0));
        assert_eq!(tr, Vec2::new(40.0, 20.0));
        assert_eq!(br, Vec2::new(40.0, 60.0));
        assert!(r.contains(Vec2::new(25.0, 30.0)));
        assert!(!r.contains(Vec2::new(5.0, 30.0)));
    }
}
