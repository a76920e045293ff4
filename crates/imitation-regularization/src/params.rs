//! Trainable parameters and the groups an optimizer organizes them into.

use crate::{TrainError, TrainResult};
use scirs2_core::ndarray::ArrayD;

/// A named trainable tensor and its accumulated gradient.
#[derive(Debug, Clone)]
pub struct Parameter {
    /// Unique name of the parameter within its optimizer.
    pub name: String,
    /// Current value.
    pub data: ArrayD<f64>,
    /// Gradient accumulated by the last backward pass(es), if any.
    pub grad: Option<ArrayD<f64>>,
}

impl Parameter {
    /// Create a parameter without a gradient.
    pub fn new(name: impl Into<String>, data: ArrayD<f64>) -> Self {
        Self {
            name: name.into(),
            data,
            grad: None,
        }
    }

    /// Lp vector norm of the parameter's entries, taken over every element
    /// regardless of the tensor's shape.
    pub fn lp_norm(&self, p: u32) -> f64 {
        let p = f64::from(p);
        self.data
            .iter()
            .map(|x| x.abs().powf(p))
            .sum::<f64>()
            .powf(1.0 / p)
    }

    /// Shape of the parameter.
    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    /// Add `grad` to the accumulated gradient.
    pub fn accumulate_grad(&mut self, grad: &ArrayD<f64>) -> TrainResult<()> {
        if grad.shape() != self.data.shape() {
            return Err(TrainError::ShapeMismatch {
                name: self.name.clone(),
                expected: self.data.shape().to_vec(),
                actual: grad.shape().to_vec(),
            });
        }

        match self.grad.as_mut() {
            Some(existing) => *existing += grad,
            None => self.grad = Some(grad.clone()),
        }
        Ok(())
    }

    /// Drop the accumulated gradient.
    pub fn zero_grad(&mut self) {
        self.grad = None;
    }
}

/// A collection of parameters sharing a learning rate.
#[derive(Debug, Clone)]
pub struct ParamGroup {
    /// Parameters in this group.
    pub params: Vec<Parameter>,
    /// Learning rate applied to every parameter of the group.
    pub lr: f64,
}

impl ParamGroup {
    /// Create an empty group with the given learning rate.
    pub fn new(lr: f64) -> Self {
        Self {
            params: Vec::new(),
            lr,
        }
    }

    /// Add a parameter to the group (builder style).
    pub fn with_param(mut self, name: impl Into<String>, data: ArrayD<f64>) -> Self {
        self.params.push(Parameter::new(name, data));
        self
    }

    /// Number of parameters in the group.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Whether the group holds no parameters.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Look up a parameter by name.
    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Check the learning rate is usable.
    pub fn validate(&self) -> TrainResult<()> {
        if !self.lr.is_finite() || self.lr < 0.0 {
            return Err(TrainError::InvalidParameter(format!(
                "learning rate must be finite and non-negative, got {}",
                self.lr
            )));
        }
        Ok(())
    }
}

/// Find a parameter by name across all groups.
pub fn find_param<'a>(groups: &'a [ParamGroup], name: &str) -> Option<&'a Parameter> {
    groups.iter().find_map(|g| g.get(name))
}
