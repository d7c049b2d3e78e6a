use fieldstitch_core::ConfigError;
use fieldstitch_geometry::DomainError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid tolerances: {0}")]
    Config(#[from] ConfigError),
    #[error("invalid domain: {0}")]
    Domain(#[from] DomainError),
}
