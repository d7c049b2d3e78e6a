use fieldstitch_core::Coord;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::segment::Segment;

const CORNER_EPS: f64 = 1e-9;

#[derive(Debug, Error, PartialEq)]
pub enum DomainError {
    #[error("domain bound \"{name}\" is not finite ({value})")]
    NonFinite { name: &'static str, value: f64 },

    #[error("domain {axis} range is empty: min {min} >= max {max}")]
    EmptyRange { axis: &'static str, min: f64, max: f64 },
}

/// One of the four sides of the plotting rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BorderEdge {
    Left,
    Right,
    Bottom,
    Top,
}

impl BorderEdge {
    pub const ALL: [BorderEdge; 4] = [
        BorderEdge::Left,
        BorderEdge::Right,
        BorderEdge::Bottom,
        BorderEdge::Top,
    ];

    /// Next edge walking the rectangle counter-clockwise (interior on the left).
    #[must_use]
    pub fn ccw_next(self) -> Self {
        match self {
            BorderEdge::Bottom => BorderEdge::Right,
            BorderEdge::Right => BorderEdge::Top,
            BorderEdge::Top => BorderEdge::Left,
            BorderEdge::Left => BorderEdge::Bottom,
        }
    }

    /// Sign of the counter-clockwise direction along this edge's free coordinate.
    #[must_use]
    pub fn ccw_sign(self) -> f64 {
        match self {
            BorderEdge::Bottom | BorderEdge::Right => 1.0,
            BorderEdge::Top | BorderEdge::Left => -1.0,
        }
    }
}

/// The rectangular temperature × pressure window a diagram was computed over.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    pub t_min: f64,
    pub t_max: f64,
    pub p_min: f64,
    pub p_max: f64,
}

impl Domain {
    pub fn new(t_min: f64, t_max: f64, p_min: f64, p_max: f64) -> Result<Self, DomainError> {
        let domain = Self {
            t_min,
            t_max,
            p_min,
            p_max,
        };
        domain.validate()?;
        Ok(domain)
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        for (name, value) in [
            ("t_min", self.t_min),
            ("t_max", self.t_max),
            ("p_min", self.p_min),
            ("p_max", self.p_max),
        ] {
            if !value.is_finite() {
                return Err(DomainError::NonFinite { name, value });
            }
        }
        if self.t_min >= self.t_max {
            return Err(DomainError::EmptyRange {
                axis: "temperature",
                min: self.t_min,
                max: self.t_max,
            });
        }
        if self.p_min >= self.p_max {
            return Err(DomainError::EmptyRange {
                axis: "pressure",
                min: self.p_min,
                max: self.p_max,
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn edge(&self, edge: BorderEdge) -> Segment {
        let (lo_lo, hi_hi) = (
            Coord::new(self.t_min, self.p_min),
            Coord::new(self.t_max, self.p_max),
        );
        match edge {
            BorderEdge::Left => Segment::new(lo_lo, Coord::new(self.t_min, self.p_max)),
            BorderEdge::Right => Segment::new(Coord::new(self.t_max, self.p_min), hi_hi),
            BorderEdge::Bottom => Segment::new(lo_lo, Coord::new(self.t_max, self.p_min)),
            BorderEdge::Top => Segment::new(Coord::new(self.t_min, self.p_max), hi_hi),
        }
    }

    pub fn edges(&self) -> impl Iterator<Item = (BorderEdge, Segment)> + '_ {
        BorderEdge::ALL.into_iter().map(|e| (e, self.edge(e)))
    }

    /// Coordinate of `p` along `edge`: pressure on the vertical sides, temperature otherwise.
    #[must_use]
    pub fn position_along(&self, edge: BorderEdge, p: Coord) -> f64 {
        match edge {
            BorderEdge::Left | BorderEdge::Right => p.y,
            BorderEdge::Bottom | BorderEdge::Top => p.x,
        }
    }

    /// Box corner shared by two edges, found by intersecting the edge segments.
    ///
    /// Opposite edges and an edge paired with itself have no single corner.
    #[must_use]
    pub fn corner(&self, a: BorderEdge, b: BorderEdge) -> Option<Coord> {
        if a == b {
            return None;
        }
        self.edge(a).intersect(&self.edge(b), CORNER_EPS)
    }

    /// Inclusive bounds test with a per-axis slack.
    #[must_use]
    pub fn contains(&self, p: Coord, t_slack: f64, p_slack: f64) -> bool {
        p.x >= self.t_min - t_slack
            && p.x <= self.t_max + t_slack
            && p.y >= self.p_min - p_slack
            && p.y <= self.p_max + p_slack
    }

    /// Part of `seg` inside the rectangle (Liang-Barsky), or `None` when it misses entirely.
    #[must_use]
    pub fn clip(&self, seg: Segment) -> Option<Segment> {
        let d = seg.b - seg.a;
        let (mut t0, mut t1) = (0.0_f64, 1.0_f64);
        for (p, q) in [
            (-d.x, seg.a.x - self.t_min),
            (d.x, self.t_max - seg.a.x),
            (-d.y, seg.a.y - self.p_min),
            (d.y, self.p_max - seg.a.y),
        ] {
            if p == 0.0 {
                if q < 0.0 {
                    return None;
                }
                continue;
            }
            let r = q / p;
            if p < 0.0 {
                if r > t1 {
                    return None;
                }
                t0 = t0.max(r);
            } else {
                if r < t0 {
                    return None;
                }
                t1 = t1.min(r);
            }
        }
        Some(Segment::new(seg.a + d * t0, seg.a + d * t1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box() -> Domain {
        Domain::new(0.0, 10.0, 0.0, 10.0).unwrap()
    }

    #[test]
    fn rejects_empty_and_non_finite_ranges() {
        assert!(matches!(
            Domain::new(5.0, 5.0, 0.0, 1.0),
            Err(DomainError::EmptyRange {
                axis: "temperature",
                ..
            })
        ));
        assert!(matches!(
            Domain::new(0.0, 1.0, 3.0, 2.0),
            Err(DomainError::EmptyRange { axis: "pressure", .. })
        ));
        assert!(matches!(
            Domain::new(0.0, f64::NAN, 0.0, 1.0),
            Err(DomainError::NonFinite { name: "t_max", .. })
        ));
    }

    #[test]
    fn adjacent_edges_meet_at_box_corners() {
        let d = unit_box();
        assert_eq!(
            d.corner(BorderEdge::Left, BorderEdge::Top),
            Some(Coord::new(0.0, 10.0))
        );
        assert_eq!(
            d.corner(BorderEdge::Bottom, BorderEdge::Right),
            Some(Coord::new(10.0, 0.0))
        );
        assert_eq!(d.corner(BorderEdge::Left, BorderEdge::Right), None);
        assert_eq!(d.corner(BorderEdge::Top, BorderEdge::Top), None);
    }

    #[test]
    fn ccw_walk_visits_every_edge() {
        let mut e = BorderEdge::Bottom;
        let mut seen = vec![e];
        for _ in 0..3 {
            e = e.ccw_next();
            seen.push(e);
        }
        assert_eq!(e.ccw_next(), BorderEdge::Bottom);
        for edge in BorderEdge::ALL {
            assert!(seen.contains(&edge));
        }
    }

    #[test]
    fn ccw_sign_follows_walk_direction() {
        let d = unit_box();
        for edge in BorderEdge::ALL {
            let seg = d.edge(edge);
            // The corner reached walking ccw lies at the far end of the edge in ccw_sign units.
            let next_corner = d.corner(edge, edge.ccw_next()).unwrap();
            let from = if seg.a == next_corner { seg.b } else { seg.a };
            let delta = d.position_along(edge, next_corner) - d.position_along(edge, from);
            assert_eq!(delta.signum(), edge.ccw_sign());
        }
    }

    #[test]
    fn contains_respects_slack() {
        let d = unit_box();
        assert!(d.contains(Coord::new(10.0, 10.0), 0.0, 0.0));
        assert!(!d.contains(Coord::new(10.5, 5.0), 0.0, 0.0));
        assert!(d.contains(Coord::new(10.5, 5.0), 1.0, 0.0));
    }

    #[test]
    fn clip_keeps_only_the_inside_part() {
        let d = unit_box();
        let crossing = Segment::new(Coord::new(-5.0, 5.0), Coord::new(5.0, 15.0));
        assert_eq!(
            d.clip(crossing),
            Some(Segment::new(Coord::new(0.0, 10.0), Coord::new(0.0, 10.0)))
        );

        let through = Segment::new(Coord::new(4.0, 8.0), Coord::new(8.0, 14.0));
        let inside = d.clip(through).unwrap();
        assert_eq!(inside.a, Coord::new(4.0, 8.0));
        assert!((inside.b.x - 4.0 - 4.0 / 3.0).abs() < 1e-12);
        assert!((inside.b.y - 10.0).abs() < 1e-12);

        let outside = Segment::new(Coord::new(11.0, 0.0), Coord::new(12.0, 10.0));
        assert_eq!(d.clip(outside), None);

        let contained = Segment::new(Coord::new(1.0, 1.0), Coord::new(2.0, 3.0));
        assert_eq!(d.clip(contained), Some(contained));
    }
}
