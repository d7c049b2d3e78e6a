//! Phase-field reconstruction: stitch unordered, noisy boundary fragments of a
//! temperature × pressure diagram into one closed polygon per field.
//!
//! The pipeline runs in four stages:
//! 1. fragments are grouped by the pair of fields they separate and merged ([`CurveSet`]),
//! 2. each merged curve records where it meets the domain border ([`BoundaryCurve`]),
//! 3. every field's curves are walked into closed loops ([`stitch_field`]),
//! 4. loops become [`FieldPolygon`]s with their validity issues attached.

mod curve;
mod engine;
mod error;
mod group;
mod polygon;
mod stitch;

pub use curve::{BorderHit, BoundaryCurve, Bridge, BridgeHit, MergeJoin};
pub use engine::{reconstruct_batch, Diagram, Engine, RawFragment, Reconstruction};
pub use error::EngineError;
pub use group::{CurveId, CurveSet};
pub use polygon::{FailedField, FieldPolygon, PolygonIssue};
pub use stitch::{stitch_field, AssembledLoop, FailureReason, Oriented, Piece, StitchOutcome};

pub use fieldstitch_core::{Coord, StitchConfig};
pub use fieldstitch_geometry::{BorderEdge, Domain, End};
