use fieldstitch_core::Coord;

/// Relative tolerance on the cross product below which two segments count as parallel.
const PARALLEL_EPS: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub a: Coord,
    pub b: Coord,
}

/// Closest approach between two pieces of geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosestPair {
    pub distance: f64,
    /// Point on the first operand.
    pub near: Coord,
    /// Point on the second operand.
    pub far: Coord,
}

impl ClosestPair {
    fn between(near: Coord, far: Coord) -> Self {
        Self {
            distance: near.distance(&far),
            near,
            far,
        }
    }

    fn swapped(self) -> Self {
        Self {
            distance: self.distance,
            near: self.far,
            far: self.near,
        }
    }
}

impl Segment {
    #[must_use]
    pub const fn new(a: Coord, b: Coord) -> Self {
        Self { a, b }
    }

    #[must_use]
    pub fn length(&self) -> f64 {
        self.a.distance(&self.b)
    }

    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.a == self.b
    }

    /// Point of `self` nearest to `p`.
    #[must_use]
    pub fn closest_point(&self, p: Coord) -> Coord {
        let d = self.b - self.a;
        let len_sq = d.dot(d);
        if len_sq == 0.0 {
            return self.a;
        }
        let t = ((p - self.a).dot(d) / len_sq).clamp(0.0, 1.0);
        self.a + d * t
    }

    #[must_use]
    pub fn distance_to_point(&self, p: Coord) -> f64 {
        self.closest_point(p).distance(&p)
    }

    /// Single-point intersection of two segments.
    ///
    /// `eps` widens both segments by that many coordinate units so that endpoints landing on
    /// the other segment up to floating noise still count. Collinear overlaps report the first
    /// shared endpoint found, which is enough for endpoint-to-endpoint curve joins.
    #[must_use]
    pub fn intersect(&self, other: &Segment, eps: f64) -> Option<Coord> {
        if self.is_degenerate() {
            return (other.distance_to_point(self.a) <= eps).then_some(self.a);
        }
        if other.is_degenerate() {
            return (self.distance_to_point(other.a) <= eps).then_some(other.a);
        }

        let r = self.b - self.a;
        let s = other.b - other.a;
        let qp = other.a - self.a;
        let denom = r.cross(s);
        let r_len = r.dot(r).sqrt();
        let s_len = s.dot(s).sqrt();

        if denom.abs() <= PARALLEL_EPS * r_len * s_len {
            if qp.cross(r).abs() > eps * r_len {
                return None;
            }
            return [other.a, other.b]
                .into_iter()
                .find(|p| self.distance_to_point(*p) <= eps)
                .or_else(|| {
                    [self.a, self.b]
                        .into_iter()
                        .find(|p| other.distance_to_point(*p) <= eps)
                });
        }

        let t = qp.cross(s) / denom;
        let u = qp.cross(r) / denom;
        let t_tol = eps / r_len;
        let u_tol = eps / s_len;
        if t < -t_tol || t > 1.0 + t_tol || u < -u_tol || u > 1.0 + u_tol {
            return None;
        }
        Some(self.a + r * t.clamp(0.0, 1.0))
    }

    /// Closest approach between two segments; zero when they intersect.
    #[must_use]
    pub fn closest_pair(&self, other: &Segment) -> ClosestPair {
        if let Some(p) = self.intersect(other, 0.0) {
            return ClosestPair::between(p, p);
        }
        let candidates = [
            ClosestPair::between(self.a, other.closest_point(self.a)),
            ClosestPair::between(self.b, other.closest_point(self.b)),
            ClosestPair::between(other.a, self.closest_point(other.a)).swapped(),
            ClosestPair::between(other.b, self.closest_point(other.b)).swapped(),
        ];
        candidates
            .into_iter()
            .reduce(|best, c| if c.distance < best.distance { c } else { best })
            .unwrap_or_else(|| ClosestPair::between(self.a, other.a))
    }
}
