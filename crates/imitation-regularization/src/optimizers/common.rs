//! Common optimizer utilities and traits.

use crate::{ParamGroup, TrainResult};
use std::collections::HashMap;

/// Compute the global L2 norm of all gradients held by `groups`.
///
/// Parameters without a gradient contribute nothing.
pub fn compute_gradient_norm(groups: &[ParamGroup]) -> f64 {
    let mut total_norm_sq = 0.0;

    for group in groups {
        for grad in group.params.iter().filter_map(|p| p.grad.as_ref()) {
            for &g in grad.iter() {
                total_norm_sq += g * g;
            }
        }
    }

    total_norm_sq.sqrt()
}

/// Gradient clipping mode.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum GradClipMode {
    /// Clip by value (element-wise).
    Value,
    /// Clip by global L2 norm.
    Norm,
}

/// Configuration for optimizers.
#[derive(Debug, Clone)]
pub struct OptimizerConfig {
    /// Learning rate given to groups added without an explicit one.
    pub learning_rate: f64,
    /// Momentum (for SGD).
    pub momentum: f64,
    /// Gradient clipping threshold (None = no clipping).
    pub grad_clip: Option<f64>,
    /// Gradient clipping mode.
    pub grad_clip_mode: GradClipMode,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.001,
            momentum: 0.9,
            grad_clip: None,
            grad_clip_mode: GradClipMode::Value,
        }
    }
}

/// Trait for optimizers.
///
/// An optimizer owns an ordered sequence of [`ParamGroup`]s. Regularizers
/// read and mutate those groups in place between the backward pass and
/// [`Optimizer::step`].
pub trait Optimizer {
    /// Parameter groups, in registration order.
    fn param_groups(&self) -> &[ParamGroup];

    /// Mutable access to the parameter groups.
    fn param_groups_mut(&mut self) -> &mut [ParamGroup];

    /// Update parameters with their accumulated gradients.
    fn step(&mut self) -> TrainResult<()>;

    /// Zero all gradients.
    fn zero_grad(&mut self) {
        for group in self.param_groups_mut() {
            for param in group.params.iter_mut() {
                param.zero_grad();
            }
        }
    }

    /// Get the learning rate of the first group.
    fn get_lr(&self) -> f64 {
        self.param_groups().first().map_or(0.0, |g| g.lr)
    }

    /// Set the learning rate of every group.
    fn set_lr(&mut self, lr: f64) {
        for group in self.param_groups_mut() {
            group.lr = lr;
        }
    }

    /// Snapshot of the per-parameter velocity state, keyed `velocity_{name}`.
    fn state_dict(&self) -> HashMap<String, Vec<f64>>;

    /// Restore velocity state from a snapshot.
    ///
    /// Entries for unknown parameters or with the wrong length are skipped.
    fn load_state_dict(&mut self, state: HashMap<String, Vec<f64>>);
}
