//! Shared value types for the fieldstitch workspace: diagram coordinates and the
//! tolerance configuration every reconstruction pass runs under.

mod config;
mod coord;
mod error;

pub use config::StitchConfig;
pub use coord::Coord;
pub use error::ConfigError;
