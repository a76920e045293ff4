//! Declarative regularizer configuration.
//!
//! A [`RegularizerConfig`] describes a regularizer without binding it to an
//! optimizer, so training code can receive one up front and attach the
//! regularizer once it has built its optimizer:
//!
//! ```
//! use imitation_regularization::RegularizerConfig;
//!
//! let config = RegularizerConfig::from_json_str(r#"{
//!     "initial_lambda": 0.5,
//!     "penalty": { "type": "lp", "p": 2 },
//!     "updater": { "type": "interval", "scaling_factor": 0.1, "tolerable_interval": [0.9, 1.1] }
//! }"#).unwrap();
//! assert_eq!(config.initial_lambda, 0.5);
//! ```

use super::penalties::Penalty;
use super::regularizer::{Regularizer, SharedOptimizer};
use super::updaters::{ConstantParamScaler, IntervalParamScaler, LambdaUpdater};
use crate::logging::SharedRecorder;
use crate::{TrainError, TrainResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Which penalty to apply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PenaltyConfig {
    /// Lp loss penalty of order `p`.
    Lp {
        /// Norm order, at least 1.
        p: u32,
    },
    /// Weight decay penalty.
    WeightDecay,
}

impl PenaltyConfig {
    /// Build the penalty.
    pub fn build(&self) -> TrainResult<Penalty> {
        match self {
            PenaltyConfig::Lp { p } => Penalty::lp(*p),
            PenaltyConfig::WeightDecay => Ok(Penalty::weight_decay()),
        }
    }
}

/// How lambda is adapted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UpdaterConfig {
    /// Keep lambda fixed.
    Constant,
    /// Scale lambda when the val/train loss ratio leaves an interval.
    Interval {
        /// Fraction to scale lambda by.
        scaling_factor: f64,
        /// `(low, high)` bounds on the ratio.
        tolerable_interval: (f64, f64),
    },
}

impl UpdaterConfig {
    /// Build the updater.
    pub fn build(&self) -> TrainResult<Box<dyn LambdaUpdater>> {
        Ok(match self {
            UpdaterConfig::Constant => Box::new(ConstantParamScaler),
            UpdaterConfig::Interval {
                scaling_factor,
                tolerable_interval,
            } => Box::new(IntervalParamScaler::new(
                *scaling_factor,
                *tolerable_interval,
            )?),
        })
    }
}

/// Configuration for a [`Regularizer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegularizerConfig {
    /// Initial regularization strength.
    pub initial_lambda: f64,
    /// Penalty to apply.
    pub penalty: PenaltyConfig,
    /// Lambda update strategy.
    pub updater: UpdaterConfig,
}

impl Default for RegularizerConfig {
    fn default() -> Self {
        Self {
            initial_lambda: 0.0,
            penalty: PenaltyConfig::WeightDecay,
            updater: UpdaterConfig::Constant,
        }
    }
}

impl RegularizerConfig {
    /// Parse a configuration from JSON and validate it.
    pub fn from_json_str(json: &str) -> TrainResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| TrainError::ConfigError(format!("Invalid regularizer config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read a configuration from a JSON file and validate it.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> TrainResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            TrainError::ConfigError(format!("Failed to read config {:?}: {}", path, e))
        })?;
        Self::from_json_str(&json)
    }

    /// Serialize the configuration to pretty-printed JSON.
    pub fn to_json_string(&self) -> TrainResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| TrainError::ConfigError(format!("Failed to serialize config: {}", e)))
    }

    /// Check every field without building anything.
    pub fn validate(&self) -> TrainResult<()> {
        if !self.initial_lambda.is_finite() {
            return Err(TrainError::ConfigError(format!(
                "initial_lambda must be finite, got {}",
                self.initial_lambda
            )));
        }
        self.penalty.build()?;
        self.updater.build()?;
        Ok(())
    }

    /// Attach a regularizer described by this configuration to `optimizer`.
    pub fn build(
        &self,
        optimizer: SharedOptimizer,
        logger: SharedRecorder,
    ) -> TrainResult<Regularizer> {
        self.validate()?;
        Regularizer::new(
            optimizer,
            self.initial_lambda,
            self.updater.build()?,
            logger,
            self.penalty.build()?,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InMemoryRecorder, OptimizerConfig, ParamGroup, SgdOptimizer, LAMBDA_KEY};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_default_config() {
        let config = RegularizerConfig::default();
        assert_eq!(config.penalty, PenaltyConfig::WeightDecay);
        assert_eq!(config.updater, UpdaterConfig::Constant);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_config() {
        let config = RegularizerConfig::from_json_str(
            r#"{
                "initial_lambda": 0.25,
                "penalty": { "type": "lp", "p": 1 },
                "updater": {
                    "type": "interval",
                    "scaling_factor": 0.2,
                    "tolerable_interval": [0.8, 1.2]
                }
            }"#,
        )
        .unwrap();

        assert_eq!(config.initial_lambda, 0.25);
        assert_eq!(config.penalty, PenaltyConfig::Lp { p: 1 });
        assert_eq!(
            config.updater,
            UpdaterConfig::Interval {
                scaling_factor: 0.2,
                tolerable_interval: (0.8, 1.2)
            }
        );
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config = RegularizerConfig::from_json_str(r#"{ "initial_lambda": 1.0 }"#).unwrap();
        assert_eq!(config.penalty, PenaltyConfig::WeightDecay);
        assert_eq!(config.updater, UpdaterConfig::Constant);
    }

    #[test]
    fn test_invalid_configs() {
        assert!(matches!(
            RegularizerConfig::from_json_str("not json"),
            Err(TrainError::ConfigError(_))
        ));
        assert!(matches!(
            RegularizerConfig::from_json_str(r#"{ "penalty": { "type": "lp", "p": 0 } }"#),
            Err(TrainError::InvalidParameter(_))
        ));
        assert!(RegularizerConfig::from_json_str(
            r#"{ "updater": { "type": "interval", "scaling_factor": 1.5, "tolerable_interval": [0.9, 1.1] } }"#
        )
        .is_err());
        assert!(RegularizerConfig::from_json_str(r#"{ "penalty": { "type": "l7" } }"#).is_err());

        let config = RegularizerConfig {
            initial_lambda: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_json_round_trip_preserves_config() {
        let config = RegularizerConfig {
            initial_lambda: 0.1,
            penalty: PenaltyConfig::Lp { p: 2 },
            updater: UpdaterConfig::Interval {
                scaling_factor: 0.5,
                tolerable_interval: (0.5, 2.0),
            },
        };
        let json = config.to_json_string().unwrap();
        assert_eq!(RegularizerConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn test_build_attaches_regularizer() {
        let optimizer = Rc::new(RefCell::new(
            SgdOptimizer::with_groups(OptimizerConfig::default(), vec![ParamGroup::new(0.1)])
                .unwrap(),
        ));
        let recorder = Rc::new(RefCell::new(InMemoryRecorder::new()));

        let config = RegularizerConfig {
            initial_lambda: 0.3,
            penalty: PenaltyConfig::Lp { p: 2 },
            updater: UpdaterConfig::Constant,
        };
        let regularizer = config.build(optimizer, recorder.clone()).unwrap();

        assert!(regularizer.is_loss_regularizer());
        assert_eq!(regularizer.lambda(), 0.3);
        assert_eq!(recorder.borrow().values(LAMBDA_KEY), vec![0.3]);
    }

    #[test]
    fn test_from_json_file() {
        let path = std::env::temp_dir().join("imitation_regularization_config_test.json");
        std::fs::write(&path, r#"{ "initial_lambda": 2.0 }"#).unwrap();

        let config = RegularizerConfig::from_json_file(&path).unwrap();
        assert_eq!(config.initial_lambda, 2.0);

        let _ = std::fs::remove_file(&path);
        assert!(RegularizerConfig::from_json_file(&path).is_err());
    }
}
