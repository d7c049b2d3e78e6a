use fieldstitch_core::{Coord, StitchConfig};
use fieldstitch_geometry::Domain;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::curve::BoundaryCurve;
use crate::error::EngineError;
use crate::group::CurveSet;
use crate::polygon::{FailedField, FieldPolygon};
use crate::stitch::{stitch_field, StitchOutcome};

/// One boundary fragment as it comes out of the diagram calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawFragment {
    pub points: Vec<Coord>,
    #[serde(default)]
    pub left: Option<String>,
    #[serde(default)]
    pub right: Option<String>,
}

impl RawFragment {
    #[must_use]
    pub fn new(
        points: impl IntoIterator<Item = impl Into<Coord>>,
        left: Option<&str>,
        right: Option<&str>,
    ) -> Self {
        Self {
            points: points.into_iter().map(Into::into).collect(),
            left: left.map(str::to_owned),
            right: right.map(str::to_owned),
        }
    }

    fn into_curve(self) -> Result<BoundaryCurve, &'static str> {
        let label = |l: Option<String>| l.filter(|s| !s.trim().is_empty());
        let (left, right) = (label(self.left), label(self.right));
        if self.points.is_empty() {
            return Err("no points");
        }
        if self.points.iter().any(|p| !p.is_finite()) {
            return Err("non-finite coordinate");
        }
        if left.is_none() && right.is_none() {
            return Err("no field label");
        }
        Ok(BoundaryCurve::with_points(self.points, left, right))
    }
}

/// Everything one reconstruction pass produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Reconstruction {
    pub polygons: Vec<FieldPolygon>,
    pub failed: Vec<FailedField>,
    pub skipped_fragments: usize,
    /// Merged curves; polygon and failure curve ids index into this list.
    pub curves: Vec<BoundaryCurve>,
}

impl Reconstruction {
    pub fn polygons_for<'a>(&'a self, label: &'a str) -> impl Iterator<Item = &'a FieldPolygon> {
        self.polygons.iter().filter(move |p| p.label == label)
    }

    pub fn failed_curves(&self) -> impl Iterator<Item = &BoundaryCurve> {
        self.failed.iter().flat_map(|f| f.curves.iter())
    }
}

/// Reconstructs field polygons for one diagram domain under fixed tolerances.
#[derive(Debug, Clone)]
pub struct Engine {
    config: StitchConfig,
    domain: Domain,
}

impl Engine {
    pub fn new(config: StitchConfig, domain: Domain) -> Result<Self, EngineError> {
        config.validate()?;
        domain.validate()?;
        Ok(Self { config, domain })
    }

    #[must_use]
    pub fn config(&self) -> &StitchConfig {
        &self.config
    }

    #[must_use]
    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    /// Group, merge, and stitch `fragments` into one polygon per closed loop of each field.
    ///
    /// Fields that cannot be closed are reported in [`Reconstruction::failed`] and do not stop
    /// the others. Fragments without points or labels are skipped.
    pub fn reconstruct(&self, fragments: impl IntoIterator<Item = RawFragment>) -> Reconstruction {
        let mut skipped = 0;
        let curves: Vec<BoundaryCurve> = fragments
            .into_iter()
            .enumerate()
            .filter_map(|(idx, frag)| match frag.into_curve() {
                Ok(curve) => Some(curve),
                Err(why) => {
                    warn!(fragment = idx, reason = why, "skipping malformed fragment");
                    skipped += 1;
                    None
                }
            })
            .collect();

        let mut set = CurveSet::group(curves, &self.config);
        set.compute_border_hits(&self.domain, &self.config);

        let mut polygons = Vec::new();
        let mut failed = Vec::new();
        for label in set.labels() {
            let candidates = set.bounding(&label);
            match stitch_field(&label, set.curves(), &candidates, &self.domain, &self.config) {
                StitchOutcome::Closed(loops) => {
                    for lp in loops {
                        let ring = lp.ring(set.curves(), self.config.eq_thresh);
                        let polygon = FieldPolygon::assemble(
                            &label,
                            ring,
                            lp.curve_ids(),
                            lp.synthesized(),
                            self.config.eq_thresh,
                        );
                        if !polygon.valid {
                            debug!(label = %label, issues = ?polygon.issues, "invalid polygon");
                        }
                        polygons.push(polygon);
                    }
                }
                StitchOutcome::Failed { reason, curves } => {
                    warn!(label = %label, %reason, curves = curves.len(), "could not close field");
                    failed.push(FailedField {
                        curves: curves
                            .iter()
                            .filter_map(|&id| set.get(id).cloned())
                            .collect(),
                        label,
                        reason,
                        curve_ids: curves,
                    });
                }
            }
        }

        info!(
            polygons = polygons.len(),
            failed = failed.len(),
            skipped,
            "reconstruction finished"
        );
        Reconstruction {
            polygons,
            failed,
            skipped_fragments: skipped,
            curves: set.into_curves(),
        }
    }
}

/// One independent diagram of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagram {
    pub name: String,
    pub domain: Domain,
    #[serde(default)]
    pub fragments: Vec<RawFragment>,
}

/// Reconstruct each diagram in parallel. Results keep the input order.
pub fn reconstruct_batch(
    config: &StitchConfig,
    diagrams: &[Diagram],
) -> Vec<Result<Reconstruction, EngineError>> {
    diagrams
        .par_iter()
        .map(|d| -> Result<Reconstruction, EngineError> {
            let engine = Engine::new(config.clone(), d.domain)?;
            debug!(diagram = %d.name, fragments = d.fragments.len(), "reconstructing");
            Ok(engine.reconstruct(d.fragments.iter().cloned()))
        })
        .collect()
}
