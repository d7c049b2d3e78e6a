//! 2D geometry primitives and operations for diagram-space polylines.

pub mod domain;
pub mod polyline;
pub mod ring;
pub mod segment;

pub use domain::{BorderEdge, Domain, DomainError};
pub use polyline::End;
pub use segment::{ClosestPair, Segment};
