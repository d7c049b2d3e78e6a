use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Tolerances shared by every stage of a reconstruction pass.
///
/// Missing keys in a config document fall back to the defaults below, which are tuned for
/// theriak-domino output in degrees C and bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StitchConfig {
    /// Endpoint match tolerance on the temperature (x) axis.
    pub t_thresh: f64,
    /// Endpoint match tolerance on the pressure (y) axis.
    pub p_thresh: f64,
    /// Near-exact equality epsilon, used to drop duplicated join points.
    pub eq_thresh: f64,
    /// First extrapolation ratio tried when bridging a gap.
    pub extrap_ratio: f64,
    /// Largest extrapolation ratio; the schedule doubles from `extrap_ratio` up to this.
    pub max_extrap: f64,
    /// Interior gaps wider than this end the current loop instead of being joined.
    pub dist_thresh: f64,
    /// Consecutive non-progress steps tolerated before a field is abandoned.
    pub max_stall: usize,
}

impl Default for StitchConfig {
    fn default() -> Self {
        Self {
            t_thresh: 1.5,
            p_thresh: 50.0,
            eq_thresh: 1e-4,
            extrap_ratio: 50.0,
            max_extrap: 200.0,
            dist_thresh: 50.0,
            max_stall: 8,
        }
    }
}

impl StitchConfig {
    /// Parse a YAML (or JSON) tolerance document and validate it.
    pub fn from_yaml_str(src: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_yaml::from_str(src)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("t_thresh", self.t_thresh),
            ("p_thresh", self.p_thresh),
            ("eq_thresh", self.eq_thresh),
            ("extrap_ratio", self.extrap_ratio),
            ("max_extrap", self.max_extrap),
            ("dist_thresh", self.dist_thresh),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::NotPositive { name, value });
            }
        }
        if self.max_extrap < self.extrap_ratio {
            return Err(ConfigError::ExtrapolationRange {
                ratio: self.extrap_ratio,
                max: self.max_extrap,
            });
        }
        if self.max_stall == 0 {
            return Err(ConfigError::ZeroStall);
        }
        Ok(())
    }

    /// Ratios tried when searching for an out-of-range intersection, smallest first.
    pub fn extrap_schedule(&self) -> impl Iterator<Item = f64> + '_ {
        std::iter::successors(Some(self.extrap_ratio), |r| Some(r * 2.0))
            .take_while(move |r| *r <= self.max_extrap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_document_keeps_defaults() {
        let cfg = StitchConfig::from_yaml_str("dist_thresh: 25\nt_thresh: 2.0\n").unwrap();
        assert_eq!(cfg.dist_thresh, 25.0);
        assert_eq!(cfg.t_thresh, 2.0);
        assert_eq!(cfg.p_thresh, StitchConfig::default().p_thresh);
    }

    #[test]
    fn json_documents_parse_too() {
        let cfg = StitchConfig::from_yaml_str(r#"{"max_stall": 3}"#).unwrap();
        assert_eq!(cfg.max_stall, 3);
    }

    #[test]
    fn rejects_unknown_keys() {
        assert!(matches!(
            StitchConfig::from_yaml_str("t_tresh: 1.0"),
            Err(ConfigError::Yaml(_))
        ));
    }

    #[test]
    fn rejects_non_positive_tolerance() {
        let cfg = StitchConfig {
            p_thresh: 0.0,
            ..StitchConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::NotPositive { name: "p_thresh", .. })
        ));
    }

    #[test]
    fn rejects_inverted_extrapolation_range() {
        let cfg = StitchConfig {
            extrap_ratio: 10.0,
            max_extrap: 5.0,
            ..StitchConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::ExtrapolationRange { .. })
        ));
    }

    #[test]
    fn schedule_doubles_up_to_max() {
        let cfg = StitchConfig {
            extrap_ratio: 50.0,
            max_extrap: 300.0,
            ..StitchConfig::default()
        };
        let ratios: Vec<f64> = cfg.extrap_schedule().collect();
        assert_eq!(ratios, vec![50.0, 100.0, 200.0]);
    }
}
