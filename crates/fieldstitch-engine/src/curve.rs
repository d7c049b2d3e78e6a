use fieldstitch_core::{Coord, StitchConfig};
use fieldstitch_geometry::polyline::{self, End};
use fieldstitch_geometry::{BorderEdge, Domain};
use serde::Serialize;
use tracing::warn;

/// Where a curve's recorded data stops at the plotting rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BorderHit {
    pub edge: BorderEdge,
    pub point: Coord,
    /// Curve end the hit belongs to, in stored point order.
    pub end: End,
}

/// How [`BoundaryCurve::merge`] lined the two curves up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeJoin {
    TailToHead,
    TailToTail,
    HeadToHead,
    HeadToTail,
}

/// Outcome of searching for the point where two curves meet.
#[derive(Debug, Clone, PartialEq)]
pub enum Bridge {
    Hit(BridgeHit),
    /// No intersection; closest approach seen across every combination tried.
    Miss { distance: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct BridgeHit {
    pub point: Coord,
    /// End of `self` the intersection was attached to.
    pub self_end: End,
    /// End of the other curve nearest the intersection.
    pub other_end: End,
    /// `self`'s points with `point` appended, reversed first when attached at the start.
    pub extended: Vec<Coord>,
}

/// An open polyline separating two fields of a diagram.
///
/// Labels are relative to the stored point order: `left` is the field on the left when
/// walking from the first point to the last.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundaryCurve {
    points: Vec<Coord>,
    left: Option<String>,
    right: Option<String>,
    border_hits: Vec<BorderHit>,
}

impl BoundaryCurve {
    #[must_use]
    pub fn new(left: Option<String>, right: Option<String>) -> Self {
        Self {
            points: Vec::new(),
            left,
            right,
            border_hits: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_points(
        points: impl IntoIterator<Item = Coord>,
        left: Option<String>,
        right: Option<String>,
    ) -> Self {
        let mut curve = Self::new(left, right);
        curve.points.extend(points);
        curve
    }

    #[must_use]
    pub fn points(&self) -> &[Coord] {
        &self.points
    }

    #[must_use]
    pub fn left(&self) -> Option<&str> {
        self.left.as_deref()
    }

    #[must_use]
    pub fn right(&self) -> Option<&str> {
        self.right.as_deref()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Does this curve bound `label` on either side?
    #[must_use]
    pub fn bounds(&self, label: &str) -> bool {
        self.left() == Some(label) || self.right() == Some(label)
    }

    #[must_use]
    pub fn endpoint(&self, end: End) -> Option<Coord> {
        polyline::endpoint(&self.points, end)
    }

    #[must_use]
    pub fn border_hits(&self) -> &[BorderHit] {
        &self.border_hits
    }

    /// All border hits recorded at `end`; two when the curve stops in a box corner.
    pub fn hits_at(&self, end: End) -> impl Iterator<Item = &BorderHit> + '_ {
        self.border_hits.iter().filter(move |h| h.end == end)
    }

    #[must_use]
    pub fn hit_at(&self, end: End) -> Option<&BorderHit> {
        self.hits_at(end).next()
    }

    /// Flip the walking direction. Labels swap so each field stays on the same geometric side.
    pub fn reverse(&mut self) {
        self.points.reverse();
        std::mem::swap(&mut self.left, &mut self.right);
        for hit in &mut self.border_hits {
            hit.end = hit.end.opposite();
        }
    }

    /// Absorb `other` when one of its ends lies within (`t_thresh`, `p_thresh`) of one of ours.
    ///
    /// Pairings are tried tail-to-head, tail-to-tail, head-to-head, then head-to-tail, and the
    /// first match wins. `self` keeps its walking direction; `other` is reversed as needed.
    /// A join point repeated on both sides (within `eq_thresh`) is stored once.
    pub fn merge(&mut self, other: &BoundaryCurve, cfg: &StitchConfig) -> Option<MergeJoin> {
        let (head, tail) = (self.endpoint(End::Start)?, self.endpoint(End::End)?);
        let (o_head, o_tail) = (other.endpoint(End::Start)?, other.endpoint(End::End)?);
        let close = |a: Coord, b: Coord| a.within(&b, cfg.t_thresh, cfg.p_thresh);

        let join = if close(tail, o_head) {
            MergeJoin::TailToHead
        } else if close(tail, o_tail) {
            MergeJoin::TailToTail
        } else if close(head, o_head) {
            MergeJoin::HeadToHead
        } else if close(head, o_tail) {
            MergeJoin::HeadToTail
        } else {
            return None;
        };

        let mut incoming = other.points.clone();
        let ours = std::mem::take(&mut self.points);
        self.points = match join {
            MergeJoin::TailToHead => splice(ours, &incoming, cfg.eq_thresh),
            MergeJoin::TailToTail => {
                incoming.reverse();
                splice(ours, &incoming, cfg.eq_thresh)
            }
            MergeJoin::HeadToHead => {
                incoming.reverse();
                splice(incoming, &ours, cfg.eq_thresh)
            }
            MergeJoin::HeadToTail => splice(incoming, &ours, cfg.eq_thresh),
        };
        self.border_hits.clear();
        Some(join)
    }

    /// Points with one extra point projected past `end`, or `None` when the curve already
    /// stops on the border there or is too short to have a direction.
    #[must_use]
    pub fn extrapolate(&self, end: End, ratio: f64) -> Option<Vec<Coord>> {
        if self.hit_at(end).is_some() {
            return None;
        }
        polyline::extrapolated(&self.points, end, ratio)
    }

    /// Extrapolate every end that is free to extend.
    #[must_use]
    pub fn extrapolate_both(&self, ratio: f64) -> Vec<Coord> {
        let mut out = self.points.clone();
        if out.len() < 2 {
            return out;
        }
        let n = self.points.len();
        if self.hit_at(End::Start).is_none() {
            out.insert(0, self.points[0].extrapolate_from(self.points[1], ratio));
        }
        if self.hit_at(End::End).is_none() {
            out.push(self.points[n - 1].extrapolate_from(self.points[n - 2], ratio));
        }
        out
    }

    /// Recompute where this curve meets the domain border.
    ///
    /// Each end is checked against each edge. An exact crossing counts only when it sits within
    /// (`t_thresh`, `p_thresh`) of that end; when rounding makes the exact test miss, the border
    /// point nearest to the end is accepted under the same tolerance. At most two hits are kept.
    pub fn find_border_hits(&mut self, domain: &Domain, cfg: &StitchConfig) {
        self.border_hits.clear();
        let (Some(first), Some(last)) = (self.endpoint(End::Start), self.endpoint(End::End))
        else {
            return;
        };
        let tol = |a: &Coord, b: &Coord| a.within(b, cfg.t_thresh, cfg.p_thresh);
        // A single point has one end.
        let ends = [(End::Start, first), (End::End, last)];
        let ends = &ends[..self.points.len().min(2)];

        let mut hits: Vec<BorderHit> = Vec::new();
        for (edge, seg) in domain.edges() {
            let crossings = polyline::intersections(&self.points, &[seg.a, seg.b], cfg.eq_thresh);
            for &(end, tip) in ends {
                let exact = crossings
                    .iter()
                    .copied()
                    .filter(|p| tol(p, &tip))
                    .min_by(|a, b| a.distance(&tip).total_cmp(&b.distance(&tip)));
                let point = exact.or_else(|| {
                    let on_border = seg.closest_point(tip);
                    tol(&tip, &on_border).then_some(on_border)
                });
                if let Some(point) = point {
                    hits.push(BorderHit { edge, point, end });
                }
            }
        }

        if hits.len() > 2 {
            warn!(
                hits = hits.len(),
                left = ?self.left,
                right = ?self.right,
                "curve touches more than two border edges, keeping the closest per end"
            );
            hits = keep_closest_hits(hits, first, last);
        }
        self.border_hits = hits;
    }

    /// Look for the point where `self` meets `other`, extending either curve by `ratio` when
    /// they stop short of each other.
    ///
    /// Combinations are tried with `self` unextrapolated first, then extended at its end, then
    /// at its start; each against `other` unextrapolated, end-extended, and start-extended.
    /// Intersections outside `domain` are ignored, and the miss distance is measured between
    /// the parts of each combination that lie inside it.
    #[must_use]
    pub fn intersect_with_extrapolation(
        &self,
        other: &BoundaryCurve,
        domain: &Domain,
        ratio: f64,
        cfg: &StitchConfig,
    ) -> Bridge {
        let mine = variants(self, ratio);
        let theirs = variants(other, ratio);
        let mut closest = f64::INFINITY;

        for a in &mine {
            for b in &theirs {
                let hit = polyline::intersections(a, b, cfg.eq_thresh)
                    .into_iter()
                    .filter(|p| domain.contains(*p, 0.0, 0.0))
                    .min_by(|p, q| {
                        self.end_distance(p).total_cmp(&self.end_distance(q))
                    });
                if let Some(point) = hit {
                    return Bridge::Hit(self.attach(point, other));
                }
                if let Some(gap) = gap_inside(a, b, domain) {
                    closest = closest.min(gap);
                }
            }
        }
        Bridge::Miss { distance: closest }
    }

    /// Walk the configured extrapolation schedule until the curves meet.
    #[must_use]
    pub fn bridge(&self, other: &BoundaryCurve, domain: &Domain, cfg: &StitchConfig) -> Bridge {
        let mut closest = f64::INFINITY;
        for ratio in cfg.extrap_schedule() {
            match self.intersect_with_extrapolation(other, domain, ratio, cfg) {
                hit @ Bridge::Hit(_) => return hit,
                Bridge::Miss { distance } => closest = closest.min(distance),
            }
        }
        Bridge::Miss { distance: closest }
    }

    fn end_distance(&self, p: &Coord) -> f64 {
        [End::Start, End::End]
            .into_iter()
            .filter_map(|e| self.endpoint(e))
            .map(|e| e.distance(p))
            .fold(f64::INFINITY, f64::min)
    }

    fn nearest_end(&self, p: &Coord) -> End {
        match (self.endpoint(End::Start), self.endpoint(End::End)) {
            (Some(s), Some(e)) if e.distance(p) < s.distance(p) => End::End,
            _ => End::Start,
        }
    }

    fn attach(&self, point: Coord, other: &BoundaryCurve) -> BridgeHit {
        let self_end = self.nearest_end(&point);
        let mut extended = self.points.clone();
        if self_end == End::Start {
            extended.reverse();
        }
        if extended.last().map_or(true, |q| *q != point) {
            extended.push(point);
        }
        BridgeHit {
            point,
            self_end,
            other_end: other.nearest_end(&point),
            extended,
        }
    }
}

fn variants(curve: &BoundaryCurve, ratio: f64) -> Vec<Vec<Coord>> {
    let mut out = vec![curve.points.clone()];
    out.extend(curve.extrapolate(End::End, ratio));
    out.extend(curve.extrapolate(End::Start, ratio));
    out
}

fn splice(mut front: Vec<Coord>, back: &[Coord], eps: f64) -> Vec<Coord> {
    let skip = match (front.last(), back.first()) {
        (Some(a), Some(b)) if a.approx_eq(b, eps) => 1,
        _ => 0,
    };
    front.extend_from_slice(&back[skip..]);
    front
}

/// Closest approach between the in-domain parts of two polylines. A crossing that was
/// rejected outside the domain is not a zero gap.
fn gap_inside(a: &[Coord], b: &[Coord], domain: &Domain) -> Option<f64> {
    let clipped = |pts: &[Coord]| -> Vec<_> {
        polyline::segments(pts)
            .filter_map(|s| domain.clip(s))
            .collect()
    };
    let (a, b) = (clipped(a), clipped(b));
    a.iter()
        .flat_map(|sa| b.iter().map(move |sb| sa.closest_pair(sb).distance))
        .reduce(f64::min)
}

fn keep_closest_hits(mut hits: Vec<BorderHit>, first: Coord, last: Coord) -> Vec<BorderHit> {
    let gap = |h: &BorderHit| match h.end {
        End::Start => h.point.distance(&first),
        End::End => h.point.distance(&last),
    };
    hits.sort_by(|a, b| gap(a).total_cmp(&gap(b)));

    let mut kept: Vec<BorderHit> = Vec::with_capacity(2);
    for end in [End::Start, End::End] {
        if let Some(h) = hits.iter().find(|h| h.end == end) {
            kept.push(*h);
        }
    }
    for h in hits {
        if kept.len() >= 2 {
            break;
        }
        if !kept.contains(&h) {
            kept.push(h);
        }
    }
    kept
}
