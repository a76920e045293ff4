//! Loss values and differentiable training objectives.
//!
//! A [`Loss`] carries its scalar value together with the gradient of that
//! value with respect to named parameters, as produced by the model that
//! computed it. Calling [`Loss::backward`] pushes those gradients into the
//! matching [`Parameter`](crate::Parameter)s of an optimizer, accumulating
//! the way an autograd engine would.

use crate::{ParamGroup, TrainError, TrainResult};
use scirs2_core::ndarray::{arr0, ArrayD};
use std::collections::{HashMap, HashSet};

/// A loss value handed to a lambda updater: a plain float or a tensor.
///
/// Only scalars (floats or zero-dimensional tensors) are meaningful; see
/// [`LossValue::scalar`].
#[derive(Debug, Clone, PartialEq)]
pub enum LossValue {
    /// Plain floating point loss.
    Float(f64),
    /// Tensor-valued loss.
    Tensor(ArrayD<f64>),
}

impl LossValue {
    /// Number of dimensions; zero for floats.
    pub fn ndim(&self) -> usize {
        match self {
            LossValue::Float(_) => 0,
            LossValue::Tensor(t) => t.ndim(),
        }
    }

    /// Whether the value is a scalar.
    pub fn is_scalar(&self) -> bool {
        self.ndim() == 0
    }

    /// Read the value as an `f64`, failing for non-scalar tensors.
    pub fn scalar(&self) -> TrainResult<f64> {
        match self {
            LossValue::Float(v) => Ok(*v),
            LossValue::Tensor(t) => tensor_scalar(t),
        }
    }
}

impl From<f64> for LossValue {
    fn from(value: f64) -> Self {
        LossValue::Float(value)
    }
}

impl From<ArrayD<f64>> for LossValue {
    fn from(value: ArrayD<f64>) -> Self {
        LossValue::Tensor(value)
    }
}

impl From<&Loss> for LossValue {
    fn from(loss: &Loss) -> Self {
        LossValue::Tensor(loss.value.clone())
    }
}

fn tensor_scalar(t: &ArrayD<f64>) -> TrainResult<f64> {
    if t.ndim() != 0 {
        return Err(TrainError::NonScalarLoss { ndim: t.ndim() });
    }
    t.iter()
        .next()
        .copied()
        .ok_or(TrainError::NonScalarLoss { ndim: 0 })
}

/// Additive term produced by a loss-family penalty.
#[derive(Debug, Clone, Default)]
pub struct PenaltyTerm {
    /// Value added to the loss.
    pub value: f64,
    /// Gradient of the term with respect to each parameter it depends on.
    pub gradients: HashMap<String, ArrayD<f64>>,
}

impl PenaltyTerm {
    /// A term with a value and no gradients.
    pub fn new(value: f64) -> Self {
        Self {
            value,
            gradients: HashMap::new(),
        }
    }

    /// Scale the value and every gradient by `factor`.
    pub fn scaled(mut self, factor: f64) -> Self {
        self.value *= factor;
        for grad in self.gradients.values_mut() {
            grad.mapv_inplace(|g| g * factor);
        }
        self
    }
}

/// A differentiable training objective.
#[derive(Debug, Clone)]
pub struct Loss {
    value: ArrayD<f64>,
    gradients: HashMap<String, ArrayD<f64>>,
}

impl Loss {
    /// Create a scalar loss without gradients.
    pub fn scalar(value: f64) -> Self {
        Self::from_tensor(arr0(value).into_dyn())
    }

    /// Create a loss from a tensor value. Only scalar tensors can be
    /// back-propagated.
    pub fn from_tensor(value: ArrayD<f64>) -> Self {
        Self {
            value,
            gradients: HashMap::new(),
        }
    }

    /// Attach the gradient of this loss with respect to parameter `name`.
    pub fn with_gradient(mut self, name: impl Into<String>, grad: ArrayD<f64>) -> Self {
        self.gradients.insert(name.into(), grad);
        self
    }

    /// The raw loss value.
    pub fn value(&self) -> &ArrayD<f64> {
        &self.value
    }

    /// Number of dimensions of the loss value.
    pub fn ndim(&self) -> usize {
        self.value.ndim()
    }

    /// Read the loss as an `f64`, failing for non-scalar values.
    pub fn item(&self) -> TrainResult<f64> {
        tensor_scalar(&self.value)
    }

    /// Gradient with respect to the named parameter.
    pub fn gradient(&self, name: &str) -> Option<&ArrayD<f64>> {
        self.gradients.get(name)
    }

    /// All gradients carried by this loss.
    pub fn gradients(&self) -> &HashMap<String, ArrayD<f64>> {
        &self.gradients
    }

    /// Sum this loss and an additive term, values and gradients alike.
    pub fn add_term(mut self, term: PenaltyTerm) -> TrainResult<Self> {
        self.value.mapv_inplace(|v| v + term.value);

        for (name, grad) in term.gradients {
            match self.gradients.get_mut(&name) {
                Some(existing) => {
                    if existing.shape() != grad.shape() {
                        return Err(TrainError::ShapeMismatch {
                            name,
                            expected: existing.shape().to_vec(),
                            actual: grad.shape().to_vec(),
                        });
                    }
                    *existing += &grad;
                }
                None => {
                    self.gradients.insert(name, grad);
                }
            }
        }

        Ok(self)
    }

    /// Accumulate this loss's gradients into the parameters of `groups`.
    ///
    /// The loss must be scalar. Gradients for parameters that are not part
    /// of any group are ignored. Every gradient is shape-checked before any
    /// is accumulated, so on error no parameter has changed.
    pub fn backward(&self, groups: &mut [ParamGroup]) -> TrainResult<()> {
        self.item()?;

        for param in groups.iter().flat_map(|g| g.params.iter()) {
            if let Some(grad) = self.gradients.get(&param.name) {
                if grad.shape() != param.data.shape() {
                    return Err(TrainError::ShapeMismatch {
                        name: param.name.clone(),
                        expected: param.data.shape().to_vec(),
                        actual: grad.shape().to_vec(),
                    });
                }
            }
        }

        let mut seen = HashSet::new();
        for group in groups.iter_mut() {
            for param in group.params.iter_mut() {
                if let Some(grad) = self.gradients.get(&param.name) {
                    param.accumulate_grad(grad)?;
                    seen.insert(param.name.clone());
                }
            }
        }

        for name in self.gradients.keys().filter(|n| !seen.contains(*n)) {
            tracing::debug!(parameter = %name, "gradient has no matching optimizer parameter");
        }

        Ok(())
    }
}
