//! Adaptive regularization for imitation-learning training loops.
//!
//! **Version**: 0.1.0
//!
//! This crate provides:
//! - Regularizers that attach to an optimizer and penalize either the loss
//!   (Lp norms) or the weights directly (weight decay)
//! - Lambda updaters that adapt the regularization strength from the ratio
//!   of validation to training loss
//! - A minimal optimizer abstraction over parameter groups, with SGD
//! - Scalar loss values carrying their parameter gradients
//! - Step-oriented scalar logging with console, file and JSON lines backends
//! - Declarative, serde-backed regularizer configuration
//!
//! # Example
//!
//! ```
//! use imitation_regularization::{
//!     ConstantParamScaler, InMemoryRecorder, Loss, Optimizer, OptimizerConfig, ParamGroup,
//!     Regularizer, SgdOptimizer,
//! };
//! use scirs2_core::ndarray::arr0;
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let group = ParamGroup::new(0.1).with_param("w", arr0(2.0).into_dyn());
//! let optimizer = Rc::new(RefCell::new(
//!     SgdOptimizer::with_groups(OptimizerConfig::default(), vec![group]).unwrap(),
//! ));
//! let recorder = Rc::new(RefCell::new(InMemoryRecorder::new()));
//!
//! let regularizer = Regularizer::weight_decay(
//!     optimizer.clone(),
//!     0.5,
//!     Box::new(ConstantParamScaler),
//!     recorder,
//! )
//! .unwrap();
//! regularizer.regularize(Loss::scalar(1.0)).unwrap();
//!
//! // 2.0 - 0.5 * 0.1 * 2.0
//! let w = optimizer.borrow().param_groups()[0].params[0].data.sum();
//! assert!((w - 1.9).abs() < 1e-12);
//! ```

mod error;
mod logging;
mod loss;
mod optimizers;
mod params;
mod regularization;

#[cfg(feature = "structured-logging")]
pub mod structured_logging;

pub use error::{TrainError, TrainResult};
pub use logging::{
    ConsoleLogger, FileLogger, InMemoryRecorder, JsonlLogger, LoggingBackend, MetricsLogger,
    ScalarRecorder, SharedRecorder,
};
pub use loss::{Loss, LossValue, PenaltyTerm};
pub use optimizers::{
    compute_gradient_norm, GradClipMode, Optimizer, OptimizerConfig, SgdOptimizer,
};
pub use params::{ParamGroup, Parameter};
pub use regularization::{
    updater_fn, ConstantParamScaler, FnUpdater, IntervalParamScaler, LambdaUpdater, LossPenalty,
    LpPenalty, Penalty, PenaltyConfig, Regularizer, RegularizerConfig, SharedOptimizer,
    UpdaterConfig, WeightDecayPenalty, WeightPenalty, LAMBDA_KEY, REGULARIZED_LOSS_KEY,
};
