use fieldstitch_core::Coord;
use fieldstitch_geometry::{polyline, ring};
use serde::Serialize;

use crate::curve::BoundaryCurve;
use crate::group::CurveId;
use crate::stitch::FailureReason;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PolygonIssue {
    TooFewPoints,
    ZeroArea,
    SelfIntersecting,
}

/// A reconstructed field. Validity is reported, not enforced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldPolygon {
    pub label: String,
    /// Closed ring; the last point connects back to the first.
    pub ring: Vec<Coord>,
    pub area: f64,
    pub counter_clockwise: bool,
    pub valid: bool,
    pub issues: Vec<PolygonIssue>,
    /// Curves the ring was built from, in walking order.
    pub curves: Vec<CurveId>,
    /// Corner and junction points added while closing the ring.
    pub synthesized: usize,
}

impl FieldPolygon {
    #[must_use]
    pub fn assemble(
        label: &str,
        ring: Vec<Coord>,
        curves: Vec<CurveId>,
        synthesized: usize,
        eps: f64,
    ) -> Self {
        let signed = ring::signed_area(&ring);
        let mut issues = Vec::new();
        if ring::distinct_points(&ring, eps) < 3 {
            issues.push(PolygonIssue::TooFewPoints);
        }
        if signed.abs() <= eps * perimeter(&ring) {
            issues.push(PolygonIssue::ZeroArea);
        }
        if ring.len() >= 3 && !ring::is_simple(&ring, eps) {
            issues.push(PolygonIssue::SelfIntersecting);
        }
        Self {
            label: label.to_owned(),
            counter_clockwise: signed > 0.0,
            area: signed.abs(),
            valid: issues.is_empty(),
            issues,
            ring,
            curves,
            synthesized,
        }
    }
}

fn perimeter(ring: &[Coord]) -> f64 {
    let closing = match (ring.first(), ring.last()) {
        (Some(a), Some(b)) => a.distance(b),
        _ => 0.0,
    };
    polyline::length(ring) + closing
}

/// A field the loop builder could not close, with the curves it was working from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedField {
    pub label: String,
    pub reason: FailureReason,
    pub curve_ids: Vec<CurveId>,
    pub curves: Vec<BoundaryCurve>,
}
