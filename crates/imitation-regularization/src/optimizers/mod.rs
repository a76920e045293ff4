//! Optimizers that own parameter groups and apply gradient updates.
//!
//! # Available Optimizers
//! - [`SgdOptimizer`]: Stochastic Gradient Descent with momentum
//!
//! # Common Types
//! - [`Optimizer`]: Core trait exposing parameter groups and learning rates
//! - [`OptimizerConfig`]: Configuration for optimizer parameters
//! - [`GradClipMode`]: Gradient clipping modes (by value or by norm)

pub mod common;
pub mod sgd;

pub use common::{compute_gradient_norm, GradClipMode, Optimizer, OptimizerConfig};
pub use sgd::SgdOptimizer;
