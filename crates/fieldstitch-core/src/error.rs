use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse tolerance config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("tolerance \"{name}\" must be a positive finite number (got {value})")]
    NotPositive { name: &'static str, value: f64 },

    #[error("max_extrap ({max}) must be at least extrap_ratio ({ratio})")]
    ExtrapolationRange { ratio: f64, max: f64 },

    #[error("max_stall must be at least 1")]
    ZeroStall,
}
