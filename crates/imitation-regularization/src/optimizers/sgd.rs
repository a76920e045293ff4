//! SGD optimizer with momentum.

use super::common::{compute_gradient_norm, GradClipMode, Optimizer, OptimizerConfig};
use crate::params::find_param;
use crate::{ParamGroup, TrainError, TrainResult};
use scirs2_core::ndarray::{Array, ArrayD, IxDyn};
use std::collections::{HashMap, HashSet};

/// SGD optimizer with momentum.
///
/// Every group steps with its own learning rate.
#[derive(Debug)]
pub struct SgdOptimizer {
    config: OptimizerConfig,
    groups: Vec<ParamGroup>,
    /// Momentum buffers for each parameter.
    velocity: HashMap<String, ArrayD<f64>>,
}

impl SgdOptimizer {
    /// Create a new SGD optimizer without parameters.
    pub fn new(config: OptimizerConfig) -> Self {
        Self {
            config,
            groups: Vec::new(),
            velocity: HashMap::new(),
        }
    }

    /// Create an optimizer over the given groups.
    pub fn with_groups(config: OptimizerConfig, groups: Vec<ParamGroup>) -> TrainResult<Self> {
        let mut optimizer = Self::new(config);
        for group in groups {
            optimizer.add_param_group(group)?;
        }
        Ok(optimizer)
    }

    /// Register a parameter group.
    ///
    /// Parameter names must be unique across all groups.
    pub fn add_param_group(&mut self, group: ParamGroup) -> TrainResult<()> {
        group.validate()?;

        let mut names: HashSet<&str> = self
            .groups
            .iter()
            .flat_map(|g| g.params.iter().map(|p| p.name.as_str()))
            .collect();
        for param in &group.params {
            if !names.insert(param.name.as_str()) {
                return Err(TrainError::InvalidParameter(format!(
                    "duplicate parameter name: {}",
                    param.name
                )));
            }
        }

        self.groups.push(group);
        Ok(())
    }

    /// Register a group using the configured default learning rate.
    pub fn add_params(&mut self, params: Vec<crate::Parameter>) -> TrainResult<()> {
        let group = ParamGroup {
            params,
            lr: self.config.learning_rate,
        };
        self.add_param_group(group)
    }

    /// Scale applied to every gradient when clipping by global norm.
    fn norm_clip_scale(&self) -> Option<f64> {
        match (self.config.grad_clip, self.config.grad_clip_mode) {
            (Some(clip_value), GradClipMode::Norm) => {
                let total_norm = compute_gradient_norm(&self.groups);
                (total_norm > clip_value).then(|| clip_value / total_norm)
            }
            _ => None,
        }
    }
}

impl Optimizer for SgdOptimizer {
    fn param_groups(&self) -> &[ParamGroup] {
        &self.groups
    }

    fn param_groups_mut(&mut self) -> &mut [ParamGroup] {
        &mut self.groups
    }

    fn step(&mut self) -> TrainResult<()> {
        let norm_scale = self.norm_clip_scale();
        let config = &self.config;
        let velocity = &mut self.velocity;

        for group in self.groups.iter_mut() {
            let lr = group.lr;
            for param in group.params.iter_mut() {
                let Some(grad) = param.grad.as_ref() else {
                    continue;
                };
                if grad.shape() != param.data.shape() {
                    return Err(TrainError::OptimizerError(format!(
                        "gradient of '{}' has shape {:?}, parameter has {:?}",
                        param.name,
                        grad.shape(),
                        param.data.shape()
                    )));
                }

                let mut grad = grad.clone();
                match (config.grad_clip, config.grad_clip_mode) {
                    (Some(clip_value), GradClipMode::Value) => {
                        grad.mapv_inplace(|g| g.max(-clip_value).min(clip_value));
                    }
                    (Some(_), GradClipMode::Norm) => {
                        if let Some(scale) = norm_scale {
                            grad.mapv_inplace(|g| g * scale);
                        }
                    }
                    (None, _) => {}
                }

                let v = velocity
                    .entry(param.name.clone())
                    .or_insert_with(|| Array::zeros(param.data.raw_dim()));

                // v = momentum * v + lr * grad
                v.mapv_inplace(|x| config.momentum * x);
                v.scaled_add(lr, &grad);

                // param = param - v
                param.data -= &*v;
            }
        }

        Ok(())
    }

    fn state_dict(&self) -> HashMap<String, Vec<f64>> {
        let mut state = HashMap::new();
        for (name, velocity) in &self.velocity {
            state.insert(
                format!("velocity_{}", name),
                velocity.iter().copied().collect(),
            );
        }
        state
    }

    fn load_state_dict(&mut self, state: HashMap<String, Vec<f64>>) {
        for (key, values) in state {
            if let Some(name) = key.strip_prefix("velocity_") {
                let Some(param) = find_param(&self.groups, name) else {
                    continue;
                };
                let shape = IxDyn(param.shape());
                if let Ok(new_velocity) = Array::from_shape_vec(shape, values) {
                    self.velocity.insert(name.to_string(), new_velocity);
                }
            }
        }
    }
}
