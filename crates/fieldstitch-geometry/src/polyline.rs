//! Free functions over open polylines stored as `&[Coord]`.
//!
//! A one-point polyline behaves as a degenerate segment so that isolated points still take
//! part in distance and intersection queries.

use fieldstitch_core::Coord;

use crate::segment::{ClosestPair, Segment};

/// Which end of an open polyline an operation applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum End {
    Start,
    End,
}

impl End {
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            End::Start => End::End,
            End::End => End::Start,
        }
    }
}

pub fn segments(points: &[Coord]) -> impl Iterator<Item = Segment> + '_ {
    let single = (points.len() == 1).then(|| Segment::new(points[0], points[0]));
    points
        .windows(2)
        .map(|w| Segment::new(w[0], w[1]))
        .chain(single)
}

#[must_use]
pub fn endpoint(points: &[Coord], end: End) -> Option<Coord> {
    match end {
        End::Start => points.first().copied(),
        End::End => points.last().copied(),
    }
}

/// Every point where `a` meets `b`, in the order `a`'s segments are walked.
///
/// Shared segment vertices can report the same crossing twice; those repeats within `eps`
/// are collapsed.
#[must_use]
pub fn intersections(a: &[Coord], b: &[Coord], eps: f64) -> Vec<Coord> {
    let mut out: Vec<Coord> = Vec::new();
    for sa in segments(a) {
        for sb in segments(b) {
            if let Some(p) = sa.intersect(&sb, eps) {
                if !out.iter().any(|q| q.approx_eq(&p, eps)) {
                    out.push(p);
                }
            }
        }
    }
    out
}

/// Closest approach between two polylines. `None` when either is empty.
#[must_use]
pub fn closest_pair(a: &[Coord], b: &[Coord]) -> Option<ClosestPair> {
    let mut best: Option<ClosestPair> = None;
    for sa in segments(a) {
        for sb in segments(b) {
            let pair = sa.closest_pair(&sb);
            if best.map_or(true, |cur| pair.distance < cur.distance) {
                best = Some(pair);
            }
            if pair.distance == 0.0 {
                return best;
            }
        }
    }
    best
}

/// Copy of `points` with one extra point projected past `end` along its last segment.
///
/// Returns `None` for polylines shorter than two points, which have no direction.
#[must_use]
pub fn extrapolated(points: &[Coord], end: End, ratio: f64) -> Option<Vec<Coord>> {
    let n = points.len();
    if n < 2 {
        return None;
    }
    let mut out = points.to_vec();
    match end {
        End::End => out.push(points[n - 1].extrapolate_from(points[n - 2], ratio)),
        End::Start => out.insert(0, points[0].extrapolate_from(points[1], ratio)),
    }
    Some(out)
}

#[must_use]
pub fn length(points: &[Coord]) -> f64 {
    points.windows(2).map(|w| w[0].distance(&w[1])).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn pts(raw: &[(f64, f64)]) -> Vec<Coord> {
        raw.iter().copied().map(Coord::from).collect()
    }

    #[test]
    fn single_point_has_one_degenerate_segment() {
        let p = pts(&[(1.0, 2.0)]);
        let segs: Vec<_> = segments(&p).collect();
        assert_eq!(segs.len(), 1);
        assert!(segs[0].is_degenerate());
        assert_eq!(segments(&[]).count(), 0);
    }

    #[test]
    fn crossing_through_shared_vertex_is_reported_once() {
        let a = pts(&[(0.0, 0.0), (1.0, 1.0), (2.0, 2.0)]);
        let b = pts(&[(0.0, 2.0), (2.0, 0.0)]);
        let hits = intersections(&a, &b, 1e-9);
        assert_eq!(hits.len(), 1);
        assert_abs_diff_eq!(hits[0].x, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn closest_pair_between_parallel_runs() {
        let a = pts(&[(0.0, 0.0), (5.0, 0.0)]);
        let b = pts(&[(7.0, 0.0), (9.0, 0.0)]);
        let pair = closest_pair(&a, &b).unwrap();
        assert_abs_diff_eq!(pair.distance, 2.0, epsilon = 1e-12);
        assert_eq!(pair.near, Coord::new(5.0, 0.0));
        assert!(closest_pair(&a, &[]).is_none());
    }

    #[test]
    fn extrapolation_extends_requested_end() {
        let line = pts(&[(0.0, 0.0), (1.0, 0.0), (2.0, 1.0)]);
        let fwd = extrapolated(&line, End::End, 2.0).unwrap();
        assert_eq!(fwd.len(), 4);
        assert_eq!(fwd[3], Coord::new(4.0, 3.0));

        let back = extrapolated(&line, End::Start, 0.5).unwrap();
        assert_eq!(back[0], Coord::new(-0.5, 0.0));
        assert_eq!(&back[1..], &line[..]);

        assert!(extrapolated(&line[..1], End::End, 1.0).is_none());
    }

    #[test]
    fn length_sums_segments() {
        assert_abs_diff_eq!(
            length(&pts(&[(0.0, 0.0), (3.0, 4.0), (3.0, 6.0)])),
            7.0,
            epsilon = 1e-12
        );
    }
}
