//! Loop assembly for one field.
//!
//! Every curve bounding the field is walked with the field on its left, so closed loops come
//! out counter-clockwise. At an interior end the nearest free endpoint is joined; at a border
//! end the sweep follows the rectangle counter-clockwise, turning corners until it reaches the
//! next curve (or the loop head) that leaves the same edge.

use fieldstitch_core::{Coord, StitchConfig};
use fieldstitch_geometry::polyline::End;
use fieldstitch_geometry::{ring, BorderEdge, Domain};
use serde::Serialize;
use tracing::{debug, instrument, trace};

use crate::curve::{BorderHit, BoundaryCurve, Bridge};
use crate::group::CurveId;

/// A curve reference plus the direction it is walked in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Oriented {
    pub id: CurveId,
    pub reversed: bool,
}

impl Oriented {
    /// Stored end corresponding to `end` in walking order.
    #[must_use]
    pub fn stored(self, end: End) -> End {
        if self.reversed {
            end.opposite()
        } else {
            end
        }
    }
}

/// One step of a loop.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Piece {
    Curve(Oriented),
    /// Box corner inserted while sweeping along the border.
    Corner(Coord),
    /// Intersection of two extrapolated curves across an interior gap.
    Junction(Coord),
}

/// A closed sequence of pieces; closure back to the first piece is implicit.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AssembledLoop {
    pub pieces: Vec<Piece>,
}

impl AssembledLoop {
    /// Concatenated coordinates with repeated join points removed.
    #[must_use]
    pub fn ring(&self, curves: &[BoundaryCurve], eps: f64) -> Vec<Coord> {
        let mut out = Vec::new();
        for piece in &self.pieces {
            match piece {
                Piece::Curve(o) => {
                    let pts = curves[o.id].points();
                    if o.reversed {
                        out.extend(pts.iter().rev().copied());
                    } else {
                        out.extend_from_slice(pts);
                    }
                }
                Piece::Corner(c) | Piece::Junction(c) => out.push(*c),
            }
        }
        ring::dedup(out, eps)
    }

    #[must_use]
    pub fn curve_ids(&self) -> Vec<CurveId> {
        self.pieces
            .iter()
            .filter_map(|p| match p {
                Piece::Curve(o) => Some(o.id),
                _ => None,
            })
            .collect()
    }

    /// Number of corner and junction points that were not part of any input curve.
    #[must_use]
    pub fn synthesized(&self) -> usize {
        self.pieces
            .iter()
            .filter(|p| !matches!(p, Piece::Curve(_)))
            .count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    #[error("swept the whole border from the {edge:?} edge without finding a curve")]
    BorderCircuit { edge: BorderEdge },
    #[error("no progress after {steps} border turns")]
    Stalled { steps: usize },
    #[error("gave up after {steps} steps")]
    StepBudget { steps: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub enum StitchOutcome {
    Closed(Vec<AssembledLoop>),
    /// The field could not be closed; every curve bounding it is handed back.
    Failed {
        reason: FailureReason,
        curves: Vec<CurveId>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum LoopState {
    SeedingLoop,
    ExtendingAtBorder(BorderHit),
    ExtendingAtInterior,
    ClosingLoop,
    Failed(FailureReason),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Next {
    Head,
    Curve(Oriented),
}

/// Assemble every curve in `candidates` bounding `label` into closed loops.
#[instrument(level = "debug", skip_all, fields(label = %label, curves = candidates.len()))]
pub fn stitch_field(
    label: &str,
    curves: &[BoundaryCurve],
    candidates: &[CurveId],
    domain: &Domain,
    cfg: &StitchConfig,
) -> StitchOutcome {
    LoopBuilder::new(label, curves, candidates, domain, cfg).run()
}

struct LoopBuilder<'a> {
    label: &'a str,
    curves: &'a [BoundaryCurve],
    domain: &'a Domain,
    cfg: &'a StitchConfig,
    all: Vec<CurveId>,
    remaining: Vec<CurveId>,
    pieces: Vec<Piece>,
    loops: Vec<AssembledLoop>,
    next_seed: Option<Oriented>,
    closed_by_walk: bool,
    stall: usize,
    steps: usize,
    budget: usize,
}

impl<'a> LoopBuilder<'a> {
    fn new(
        label: &'a str,
        curves: &'a [BoundaryCurve],
        candidates: &[CurveId],
        domain: &'a Domain,
        cfg: &'a StitchConfig,
    ) -> Self {
        // Each curve is appended once; each append may follow a full border sweep.
        let budget = candidates
            .len()
            .saturating_add(1)
            .saturating_mul(cfg.max_stall.saturating_add(4))
            .saturating_mul(2);
        Self {
            label,
            curves,
            domain,
            cfg,
            all: candidates.to_vec(),
            remaining: candidates.to_vec(),
            pieces: Vec::new(),
            loops: Vec::new(),
            next_seed: None,
            closed_by_walk: false,
            stall: 0,
            steps: 0,
            budget,
        }
    }

    fn run(mut self) -> StitchOutcome {
        let mut state = LoopState::SeedingLoop;
        loop {
            self.steps += 1;
            if self.steps > self.budget && !matches!(state, LoopState::Failed(_)) {
                state = LoopState::Failed(FailureReason::StepBudget { steps: self.budget });
            }
            trace!(?state, "loop step");
            state = match state {
                LoopState::SeedingLoop => {
                    if !self.seed() {
                        debug!(loops = self.loops.len(), "field closed");
                        return StitchOutcome::Closed(self.loops);
                    }
                    self.after_append()
                }
                LoopState::ExtendingAtBorder(hit) => self.extend_at_border(hit),
                LoopState::ExtendingAtInterior => self.extend_at_interior(),
                LoopState::ClosingLoop => self.close_loop(),
                LoopState::Failed(reason) => {
                    debug!(%reason, "field abandoned");
                    return StitchOutcome::Failed {
                        reason,
                        curves: self.all,
                    };
                }
            };
        }
    }

    /// Walking direction that keeps this field on the left.
    fn default_orientation(&self, id: CurveId) -> Oriented {
        let c = &self.curves[id];
        Oriented {
            id,
            reversed: c.right() == Some(self.label) && c.left() != Some(self.label),
        }
    }

    fn point(&self, o: Oriented, end: End) -> Option<Coord> {
        self.curves[o.id].endpoint(o.stored(end))
    }

    fn hits(&self, o: Oriented, end: End) -> impl Iterator<Item = &'a BorderHit> + 'a {
        let curves = self.curves;
        curves[o.id].hits_at(o.stored(end))
    }

    fn head(&self) -> Option<Oriented> {
        match self.pieces.first() {
            Some(Piece::Curve(o)) => Some(*o),
            _ => None,
        }
    }

    fn tail(&self) -> Option<Oriented> {
        self.pieces.iter().rev().find_map(|p| match p {
            Piece::Curve(o) => Some(*o),
            _ => None,
        })
    }

    fn take_remaining(&mut self, id: CurveId) {
        self.remaining.retain(|r| *r != id);
    }

    fn seed(&mut self) -> bool {
        let seed = self
            .next_seed
            .take()
            .or_else(|| self.remaining.first().map(|&id| self.default_orientation(id)));
        let Some(o) = seed else {
            return false;
        };
        self.take_remaining(o.id);
        self.pieces.push(Piece::Curve(o));
        trace!(id = o.id, reversed = o.reversed, "seeded loop");
        true
    }

    fn append(&mut self, o: Oriented) -> LoopState {
        self.take_remaining(o.id);
        self.pieces.push(Piece::Curve(o));
        self.stall = 0;
        self.after_append()
    }

    fn after_append(&self) -> LoopState {
        match self.tail_hit() {
            Some(hit) => LoopState::ExtendingAtBorder(hit),
            None => LoopState::ExtendingAtInterior,
        }
    }

    /// Border hit at the loop's open end. A curve ending in a box corner hits two edges; the
    /// sweep leaves along the one that follows the other counter-clockwise.
    fn tail_hit(&self) -> Option<BorderHit> {
        let tail = self.tail()?;
        let hits: Vec<&BorderHit> = self.hits(tail, End::End).collect();
        match hits.as_slice() {
            [] => None,
            [only] => Some(**only),
            [a, b, ..] if a.edge.ccw_next() == b.edge => Some(**b),
            [a, ..] => Some(**a),
        }
    }

    /// A corner the loop already passes through, because the tail stops in it or the head
    /// starts from it, adds nothing to the ring.
    fn touches_loop_ends(&self, corner: Coord) -> bool {
        let eps = self.cfg.eq_thresh;
        let last = match self.pieces.last() {
            Some(Piece::Curve(o)) => self.point(*o, End::End),
            Some(Piece::Corner(c) | Piece::Junction(c)) => Some(*c),
            None => None,
        };
        let first = self.head().and_then(|o| self.point(o, End::Start));
        [last, first]
            .into_iter()
            .flatten()
            .any(|p| p.approx_eq(&corner, eps))
    }

    fn edge_tolerance(&self, edge: BorderEdge) -> f64 {
        match edge {
            BorderEdge::Left | BorderEdge::Right => self.cfg.p_thresh,
            BorderEdge::Bottom | BorderEdge::Top => self.cfg.t_thresh,
        }
    }

    /// Nearest curve end on `edge` at or past `from` in the counter-clockwise direction.
    fn border_candidate(&self, edge: BorderEdge, from: Coord) -> Option<Next> {
        let s = self.domain.position_along(edge, from);
        let sign = edge.ccw_sign();
        let tol = self.edge_tolerance(edge);
        let ahead = |point: Coord| {
            let delta = (self.domain.position_along(edge, point) - s) * sign;
            (delta > -tol).then_some(delta)
        };

        let mut best: Option<(f64, Next)> = None;
        let mut offer = |delta: f64, next: Next| {
            if best.map_or(true, |(d, _)| delta < d) {
                best = Some((delta, next));
            }
        };
        for &id in &self.remaining {
            for hit in self.curves[id].border_hits() {
                if hit.edge != edge {
                    continue;
                }
                if let Some(delta) = ahead(hit.point) {
                    let reversed = hit.end == End::End;
                    offer(delta, Next::Curve(Oriented { id, reversed }));
                }
            }
        }
        if let Some(head) = self.head() {
            for hit in self.hits(head, End::Start).filter(|h| h.edge == edge) {
                if let Some(delta) = ahead(hit.point) {
                    offer(delta, Next::Head);
                }
            }
        }
        best.map(|(_, next)| next)
    }

    fn extend_at_border(&mut self, hit: BorderHit) -> LoopState {
        let mut edge = hit.edge;
        let mut from = hit.point;
        for turn in 0..=BorderEdge::ALL.len() {
            match self.border_candidate(edge, from) {
                Some(Next::Head) => {
                    self.closed_by_walk = true;
                    return LoopState::ClosingLoop;
                }
                Some(Next::Curve(o)) => {
                    trace!(id = o.id, ?edge, turns = turn, "joined along border");
                    return self.append(o);
                }
                None => {}
            }
            if turn == BorderEdge::ALL.len() {
                break;
            }
            let next_edge = edge.ccw_next();
            let Some(corner) = self.domain.corner(edge, next_edge) else {
                break;
            };
            if !self.touches_loop_ends(corner) {
                self.pieces.push(Piece::Corner(corner));
            }
            self.stall += 1;
            if self.stall > self.cfg.max_stall {
                return LoopState::Failed(FailureReason::Stalled { steps: self.stall });
            }
            edge = next_edge;
            from = corner;
        }
        LoopState::Failed(FailureReason::BorderCircuit { edge: hit.edge })
    }

    fn extend_at_interior(&mut self) -> LoopState {
        let Some(tail) = self.tail().and_then(|o| self.point(o, End::End)) else {
            return LoopState::ClosingLoop;
        };

        let mut best: Option<(f64, Next)> = None;
        for &id in &self.remaining {
            for end in [End::Start, End::End] {
                let Some(p) = self.curves[id].endpoint(end) else {
                    continue;
                };
                let d = tail.distance(&p);
                if best.map_or(true, |(bd, _)| d < bd) {
                    let reversed = end == End::End;
                    best = Some((d, Next::Curve(Oriented { id, reversed })));
                }
            }
        }
        if let Some(head) = self.head() {
            if self.hits(head, End::Start).next().is_none() {
                if let Some(p) = self.point(head, End::Start) {
                    let d = tail.distance(&p);
                    if best.map_or(true, |(bd, _)| d < bd) {
                        best = Some((d, Next::Head));
                    }
                }
            }
        }

        match best {
            None | Some((_, Next::Head)) => LoopState::ClosingLoop,
            Some((d, Next::Curve(o))) if d > self.cfg.dist_thresh => {
                debug!(gap = d, id = o.id, "gap too wide, starting a new loop");
                self.take_remaining(o.id);
                self.next_seed = Some(self.default_orientation(o.id));
                LoopState::ClosingLoop
            }
            Some((d, Next::Curve(o))) => {
                if d > self.cfg.eq_thresh {
                    self.splice_junction(o);
                }
                self.append(o)
            }
        }
    }

    /// Insert the point where the tail and `next` meet when extrapolated, if it lies close to
    /// the gap being closed.
    fn splice_junction(&mut self, next: Oriented) {
        let Some(tail) = self.tail() else {
            return;
        };
        let (Some(tail_end), Some(next_start)) =
            (self.point(tail, End::End), self.point(next, End::Start))
        else {
            return;
        };
        let a = &self.curves[tail.id];
        let b = &self.curves[next.id];
        match a.bridge(b, self.domain, self.cfg) {
            Bridge::Hit(hit)
                if hit.point.distance(&tail_end) <= self.cfg.dist_thresh
                    && hit.point.distance(&next_start) <= self.cfg.dist_thresh =>
            {
                trace!(x = hit.point.x, y = hit.point.y, "spliced junction");
                self.pieces.push(Piece::Junction(hit.point));
            }
            Bridge::Hit(_) => trace!("extrapolated junction too far from the gap"),
            Bridge::Miss { distance } => trace!(distance, "curves do not meet"),
        }
    }

    fn close_loop(&mut self) -> LoopState {
        if !self.pieces.is_empty() {
            let pieces = std::mem::take(&mut self.pieces);
            trace!(pieces = pieces.len(), closed_by_walk = self.closed_by_walk, "closed loop");
            self.loops.push(AssembledLoop { pieces });
        }
        self.closed_by_walk = false;
        self.stall = 0;
        LoopState::SeedingLoop
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::CurveSet;

    fn cfg() -> StitchConfig {
        StitchConfig {
            t_thresh: 0.5,
            p_thresh: 0.5,
            eq_thresh: 1e-6,
            dist_thresh: 5.0,
            ..StitchConfig::default()
        }
    }

    fn curve(raw: &[(f64, f64)], left: &str, right: Option<&str>) -> BoundaryCurve {
        BoundaryCurve::with_points(
            raw.iter().copied().map(Coord::from),
            Some(left.to_owned()),
            right.map(str::to_owned),
        )
    }

    fn stitch(set: &CurveSet, label: &str, domain: &Domain, cfg: &StitchConfig) -> StitchOutcome {
        stitch_field(label, set.curves(), &set.bounding(label), domain, cfg)
    }

    fn closed(outcome: StitchOutcome) -> Vec<AssembledLoop> {
        match outcome {
            StitchOutcome::Closed(loops) => loops,
            StitchOutcome::Failed { reason, .. } => panic!("field failed: {reason}"),
        }
    }

    #[test]
    fn strip_between_two_verticals_uses_both_curves() {
        let domain = Domain::new(0.0, 30.0, 0.0, 10.0).unwrap();
        let mut set = CurveSet::from_curves(vec![
            curve(&[(10.0, 0.0), (10.0, 10.0)], "A", Some("B")),
            curve(&[(20.0, 0.0), (20.0, 10.0)], "B", Some("C")),
        ]);
        set.compute_border_hits(&domain, &cfg());

        let loops = closed(stitch(&set, "B", &domain, &cfg()));
        assert_eq!(loops.len(), 1);
        assert_eq!(loops[0].curve_ids(), vec![0, 1]);
        assert_eq!(loops[0].synthesized(), 0);
        let ring = loops[0].ring(set.curves(), 1e-9);
        assert_eq!(ring.len(), 4);
        assert!(ring::is_counter_clockwise(&ring));
    }

    #[test]
    fn huge_stall_limit_still_bounds_the_walk() {
        let domain = Domain::new(0.0, 30.0, 0.0, 10.0).unwrap();
        let cfg = StitchConfig {
            max_stall: usize::MAX,
            ..cfg()
        };
        let mut set = CurveSet::from_curves(vec![
            curve(&[(10.0, 0.0), (10.0, 10.0)], "A", Some("B")),
            curve(&[(20.0, 0.0), (20.0, 10.0)], "B", Some("C")),
        ]);
        set.compute_border_hits(&domain, &cfg);

        let loops = closed(stitch(&set, "B", &domain, &cfg));
        assert_eq!(loops.len(), 1);
        assert_eq!(loops[0].curve_ids(), vec![0, 1]);
    }

    #[test]
    fn edge_field_turns_corners() {
        let domain = Domain::new(0.0, 30.0, 0.0, 10.0).unwrap();
        let mut set = CurveSet::from_curves(vec![curve(
            &[(10.0, 0.0), (10.0, 10.0)],
            "A",
            Some("B"),
        )]);
        set.compute_border_hits(&domain, &cfg());

        let a = closed(stitch(&set, "A", &domain, &cfg()));
        assert_eq!(
            a[0].pieces[1..],
            [
                Piece::Corner(Coord::new(0.0, 10.0)),
                Piece::Corner(Coord::new(0.0, 0.0))
            ]
        );

        let b = closed(stitch(&set, "B", &domain, &cfg()));
        assert_eq!(b[0].synthesized(), 2);
        assert!(b[0].pieces[0] == Piece::Curve(Oriented { id: 0, reversed: true }));
        let ring = b[0].ring(set.curves(), 1e-9);
        assert!(ring.contains(&Coord::new(30.0, 0.0)));
        assert!(ring.contains(&Coord::new(30.0, 10.0)));
    }

    fn two_peaks() -> (Domain, CurveSet) {
        let domain = Domain::new(-100.0, 100.0, -100.0, 100.0).unwrap();
        let mut set = CurveSet::from_curves(vec![
            curve(&[(0.0, 0.0), (5.0, 8.0), (10.0, 0.0)], "X", None),
            curve(&[(16.0, 0.0), (21.0, 8.0), (26.0, 0.0)], "X", None),
        ]);
        set.compute_border_hits(&domain, &cfg());
        (domain, set)
    }

    #[test]
    fn interior_gap_wider_than_threshold_splits_loops() {
        let (domain, set) = two_peaks();
        let loops = closed(stitch(&set, "X", &domain, &cfg()));
        assert_eq!(loops.len(), 2);
        assert_eq!(loops[0].curve_ids(), vec![0]);
        assert_eq!(loops[1].curve_ids(), vec![1]);
    }

    #[test]
    fn bridged_gap_gets_the_extrapolated_junction() {
        let (domain, set) = two_peaks();
        let wide = StitchConfig {
            dist_thresh: 7.0,
            ..cfg()
        };
        let loops = closed(stitch(&set, "X", &domain, &wide));
        assert_eq!(loops.len(), 1);
        assert_eq!(loops[0].synthesized(), 1);
        let Piece::Junction(j) = loops[0].pieces[1] else {
            panic!("expected a junction, got {:?}", loops[0].pieces);
        };
        approx::assert_abs_diff_eq!(j.x, 13.0, epsilon = 1e-9);
        approx::assert_abs_diff_eq!(j.y, -4.8, epsilon = 1e-9);
        assert_eq!(loops[0].ring(set.curves(), 1e-9).len(), 7);
    }

    #[test]
    fn one_step_without_progress_is_tolerated_only_up_to_max_stall() {
        let domain = Domain::new(0.0, 30.0, 0.0, 10.0).unwrap();
        let mut set = CurveSet::from_curves(vec![curve(
            &[(10.0, 0.0), (10.0, 10.0)],
            "A",
            Some("B"),
        )]);
        set.compute_border_hits(&domain, &cfg());
        let tight = StitchConfig {
            max_stall: 1,
            ..cfg()
        };
        match stitch(&set, "A", &domain, &tight) {
            StitchOutcome::Failed { reason, curves } => {
                assert_eq!(reason, FailureReason::Stalled { steps: 2 });
                assert_eq!(curves, vec![0]);
            }
            StitchOutcome::Closed(_) => panic!("two corners exceed a stall budget of one"),
        }
    }

    #[test]
    fn lone_border_end_with_nothing_to_meet_sweeps_the_whole_circuit() {
        let domain = Domain::new(0.0, 10.0, 0.0, 10.0).unwrap();
        // Leaves the left edge and stops inside; the head never comes back to the border.
        let mut set = CurveSet::from_curves(vec![curve(
            &[(5.0, 5.0), (0.0, 5.0)],
            "X",
            None,
        )]);
        set.compute_border_hits(&domain, &cfg());
        match stitch(&set, "X", &domain, &cfg()) {
            StitchOutcome::Failed { reason, .. } => {
                assert_eq!(
                    reason,
                    FailureReason::BorderCircuit {
                        edge: BorderEdge::Left
                    }
                );
            }
            StitchOutcome::Closed(_) => panic!("nothing to close against"),
        }
    }
}
