//! Metrics over closed rings (implicitly closed: the last point connects back to the first).

use cavalier_contours::polyline::{PlineOrientation, PlineSource, PlineVertex, Polyline};
use fieldstitch_core::Coord;

use crate::segment::Segment;

/// Closed, straight-edged cavalier polyline for `ring`.
#[must_use]
pub fn to_polyline(ring: &[Coord]) -> Polyline<f64> {
    let mut pl = Polyline::new_closed();
    for c in ring {
        pl.vertex_data.push(PlineVertex::new(c.x, c.y, 0.0));
    }
    pl
}

/// Signed area, positive for counter-clockwise rings. Rings under three points have none.
#[must_use]
pub fn signed_area(ring: &[Coord]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }
    to_polyline(ring).area()
}

#[must_use]
pub fn is_counter_clockwise(ring: &[Coord]) -> bool {
    ring.len() >= 3 && to_polyline(ring).orientation() == PlineOrientation::CounterClockwise
}

/// Drop consecutive repeats and a trailing copy of the first point.
#[must_use]
pub fn dedup(points: Vec<Coord>, eps: f64) -> Vec<Coord> {
    let mut out: Vec<Coord> = Vec::with_capacity(points.len());
    for p in points {
        if out.last().map_or(true, |q| !q.approx_eq(&p, eps)) {
            out.push(p);
        }
    }
    while out.len() > 1 && out[out.len() - 1].approx_eq(&out[0], eps) {
        out.pop();
    }
    out
}

#[must_use]
pub fn distinct_points(ring: &[Coord], eps: f64) -> usize {
    let mut seen: Vec<Coord> = Vec::new();
    for p in ring {
        if !seen.iter().any(|q| q.approx_eq(p, eps)) {
            seen.push(*p);
        }
    }
    seen.len()
}

/// True when no two non-adjacent edges of the ring touch.
///
/// Quadratic in the ring size; diagram rings are a few hundred points at most.
#[must_use]
pub fn is_simple(ring: &[Coord], eps: f64) -> bool {
    let n = ring.len();
    if n < 3 {
        return false;
    }
    let edges: Vec<Segment> = (0..n)
        .map(|i| Segment::new(ring[i], ring[(i + 1) % n]))
        .collect();
    for i in 0..n {
        for j in (i + 2)..n {
            if i == 0 && j == n - 1 {
                continue;
            }
            if edges[i].intersect(&edges[j], eps).is_some() {
                return false;
            }
        }
    }
    true
}
