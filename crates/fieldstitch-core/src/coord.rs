use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};

/// A point in diagram space: `x` is temperature, `y` is pressure.
///
/// Serialized as a bare `[x, y]` pair so fragment documents stay compact.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Coord {
    pub x: f64,
    pub y: f64,
}

impl Coord {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Per-axis tolerance test: `|dx| < t_tol` and `|dy| < p_tol`.
    ///
    /// The axes carry different units, so there is no single Euclidean epsilon.
    #[must_use]
    pub fn within(&self, other: &Coord, t_tol: f64, p_tol: f64) -> bool {
        (self.x - other.x).abs() < t_tol && (self.y - other.y).abs() < p_tol
    }

    /// Inclusive variant of [`Coord::within`] used for near-exact equality.
    #[must_use]
    pub fn approx_eq(&self, other: &Coord, eps: f64) -> bool {
        (self.x - other.x).abs() <= eps && (self.y - other.y).abs() <= eps
    }

    #[must_use]
    pub fn distance(&self, other: &Coord) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    #[must_use]
    pub fn dot(self, rhs: Coord) -> f64 {
        self.x * rhs.x + self.y * rhs.y
    }

    /// z component of the 2D cross product.
    #[must_use]
    pub fn cross(self, rhs: Coord) -> f64 {
        self.x * rhs.y - self.y * rhs.x
    }

    /// Project past `self` along the direction `prev -> self`, scaled by `ratio`.
    #[must_use]
    pub fn extrapolate_from(self, prev: Coord, ratio: f64) -> Coord {
        self + (self - prev) * ratio
    }

    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<[f64; 2]> for Coord {
    fn from(v: [f64; 2]) -> Self {
        Self::new(v[0], v[1])
    }
}

impl From<Coord> for [f64; 2] {
    fn from(c: Coord) -> Self {
        [c.x, c.y]
    }
}

impl From<(f64, f64)> for Coord {
    fn from((x, y): (f64, f64)) -> Self {
        Self::new(x, y)
    }
}

impl Add for Coord {
    type Output = Coord;

    fn add(self, rhs: Coord) -> Self::Output {
        Coord::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Coord {
    type Output = Coord;

    fn sub(self, rhs: Coord) -> Self::Output {
        Coord::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Coord {
    type Output = Coord;

    fn mul(self, rhs: f64) -> Self::Output {
        Coord::new(self.x * rhs, self.y * rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn within_uses_independent_axis_tolerances() {
        let a = Coord::new(500.0, 4000.0);
        assert!(a.within(&Coord::new(501.0, 4040.0), 1.5, 50.0));
        // Large pressure gap but tiny temperature gap: still rejected.
        assert!(!a.within(&Coord::new(500.0, 4060.0), 1.5, 50.0));
        assert!(!a.within(&Coord::new(502.0, 4000.0), 1.5, 50.0));
    }

    #[test]
    fn extrapolate_from_scales_last_segment() {
        let end = Coord::new(2.0, 2.0);
        let prev = Coord::new(1.0, 1.5);
        let p = end.extrapolate_from(prev, 3.0);
        assert_abs_diff_eq!(p.x, 5.0, epsilon = 1e-12);
        assert_abs_diff_eq!(p.y, 3.5, epsilon = 1e-12);
    }

    #[test]
    fn cross_sign_gives_turn_direction() {
        let east = Coord::new(1.0, 0.0);
        let north = Coord::new(0.0, 1.0);
        assert!(east.cross(north) > 0.0);
        assert!(north.cross(east) < 0.0);
    }

    #[test]
    fn serializes_as_pair() {
        let c = Coord::new(1.5, -2.0);
        let json = serde_json::to_string(&c).unwrap();
        assert_eq!(json, "[1.5,-2.0]");
        let back: Coord = serde_json::from_str("[3, 4]").unwrap();
        assert_eq!(back, Coord::new(3.0, 4.0));
    }
}
