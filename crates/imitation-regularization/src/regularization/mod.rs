//! Adaptive regularization attached to an optimizer.
//!
//! A [`Regularizer`] applies one [`Penalty`] per training step and adapts
//! its strength with a [`LambdaUpdater`]:
//!
//! - [`LpPenalty`]: loss family, adds `lambda * sum(||w||_p ^ p)` to the loss
//! - [`WeightDecayPenalty`]: weight family, moves each weight by `-lambda * lr * w`
//! - [`IntervalParamScaler`]: scales lambda when the val/train loss ratio
//!   leaves a tolerable interval
//! - [`ConstantParamScaler`]: keeps lambda fixed

mod config;
mod penalties;
mod regularizer;
mod updaters;

pub use config::{PenaltyConfig, RegularizerConfig, UpdaterConfig};
pub use penalties::{LossPenalty, LpPenalty, Penalty, WeightDecayPenalty, WeightPenalty};
pub use regularizer::{Regularizer, SharedOptimizer, LAMBDA_KEY, REGULARIZED_LOSS_KEY};
pub use updaters::{
    updater_fn, ConstantParamScaler, FnUpdater, IntervalParamScaler, LambdaUpdater,
};
