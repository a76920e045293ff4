//! The regularizer: binds a penalty to an optimizer and adapts its strength.

use super::penalties::Penalty;
use super::updaters::LambdaUpdater;
use crate::logging::SharedRecorder;
use crate::{Loss, LossValue, Optimizer, Parameter, TrainError, TrainResult};
use scirs2_core::ndarray::ArrayD;
use std::cell::{BorrowMutError, RefCell};
use std::fmt;
use std::rc::Rc;

/// Key under which the regularization strength is recorded.
pub const LAMBDA_KEY: &str = "regularization_lambda";

/// Key under which loss-family regularizers record the combined loss.
pub const REGULARIZED_LOSS_KEY: &str = "regularized_loss";

/// An optimizer shared between the training loop and a regularizer.
pub type SharedOptimizer = Rc<RefCell<dyn Optimizer>>;

/// Applies a penalty during each training step and adapts its strength
/// (lambda) from the ratio of validation to training loss.
///
/// The optimizer and logger are owned by the caller. Both are borrowed only
/// for the duration of a single call, and a call that finds either one
/// already borrowed fails with [`TrainError::Reentrant`]. A regularizer and
/// its optimizer are meant to be driven from one thread, one call at a time.
pub struct Regularizer {
    optimizer: SharedOptimizer,
    lambda: f64,
    updater: Box<dyn LambdaUpdater>,
    logger: SharedRecorder,
    penalty: Penalty,
}

impl fmt::Debug for Regularizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Regularizer")
            .field("lambda", &self.lambda)
            .field("penalty", &self.penalty)
            .field("noop_updater", &self.updater.is_noop())
            .finish()
    }
}

impl Regularizer {
    /// Create a regularizer and record the initial lambda.
    ///
    /// # Arguments
    /// * `optimizer` - Optimizer whose parameter groups are regularized
    /// * `initial_lambda` - Initial regularization strength
    /// * `updater` - Strategy adapting lambda in [`update_params`](Self::update_params)
    /// * `logger` - Recorder receiving lambda and regularized loss values
    /// * `penalty` - Penalty to apply
    pub fn new(
        optimizer: SharedOptimizer,
        initial_lambda: f64,
        updater: Box<dyn LambdaUpdater>,
        logger: SharedRecorder,
        penalty: Penalty,
    ) -> TrainResult<Self> {
        let regularizer = Self {
            optimizer,
            lambda: initial_lambda,
            updater,
            logger,
            penalty,
        };
        regularizer.record(LAMBDA_KEY, initial_lambda)?;
        Ok(regularizer)
    }

    /// Create an Lp loss regularizer of order `p`.
    pub fn lp(
        optimizer: SharedOptimizer,
        initial_lambda: f64,
        updater: Box<dyn LambdaUpdater>,
        logger: SharedRecorder,
        p: u32,
    ) -> TrainResult<Self> {
        Self::new(optimizer, initial_lambda, updater, logger, Penalty::lp(p)?)
    }

    /// Create a weight decay regularizer.
    pub fn weight_decay(
        optimizer: SharedOptimizer,
        initial_lambda: f64,
        updater: Box<dyn LambdaUpdater>,
        logger: SharedRecorder,
    ) -> TrainResult<Self> {
        Self::new(
            optimizer,
            initial_lambda,
            updater,
            logger,
            Penalty::weight_decay(),
        )
    }

    /// Current regularization strength.
    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    /// The penalty this regularizer applies.
    pub fn penalty(&self) -> &Penalty {
        &self.penalty
    }

    /// Whether the penalty is added to the loss rather than to the weights.
    pub fn is_loss_regularizer(&self) -> bool {
        self.penalty.is_loss_penalty()
    }

    /// The optimizer this regularizer is attached to.
    pub fn optimizer(&self) -> &SharedOptimizer {
        &self.optimizer
    }

    /// Regularize one training step and compute gradients.
    ///
    /// - Loss penalties: adds the penalty term to `loss`, runs the backward
    ///   pass on the sum, records the sum under [`REGULARIZED_LOSS_KEY`] and
    ///   returns it.
    /// - Weight penalties: runs the backward pass on `loss` unchanged, then
    ///   adds the penalty's delta to every parameter of every group in place
    ///   and returns `loss`. Nothing is recorded.
    ///
    /// Every delta and gradient is checked before the first parameter is
    /// touched, so an error leaves the optimizer and logger unchanged.
    pub fn regularize(&self, loss: Loss) -> TrainResult<Loss> {
        let mut optimizer = self
            .optimizer
            .try_borrow_mut()
            .map_err(|_| TrainError::Reentrant("optimizer is already borrowed".to_string()))?;
        let groups = optimizer.param_groups_mut();

        match &self.penalty {
            Penalty::Loss(penalty) => {
                let term = penalty.penalty(self.lambda, &loss, groups)?;
                let regularized = loss.add_term(term)?;
                let value = regularized.item()?;

                let mut logger = self.logger.try_borrow_mut().map_err(logger_busy)?;
                regularized.backward(groups)?;

                tracing::debug!(regularized_loss = value, lambda = self.lambda, "Loss penalty applied");
                logger.record(REGULARIZED_LOSS_KEY, value);
                Ok(regularized)
            }
            Penalty::Weight(penalty) => {
                let mut deltas = Vec::new();
                for group in groups.iter() {
                    for param in &group.params {
                        let delta = penalty.delta(self.lambda, param, group)?;
                        deltas.push(broadcast_delta(param, delta)?);
                    }
                }

                loss.backward(groups)?;

                let params = groups.iter_mut().flat_map(|g| g.params.iter_mut());
                for (param, delta) in params.zip(&deltas) {
                    tracing::trace!(parameter = %param.name, "Weight penalty applied");
                    param.data += delta;
                }
                Ok(loss)
            }
        }
    }

    /// Adapt lambda from the latest training and validation losses.
    ///
    /// Does nothing for no-op updaters. Otherwise the updater's result
    /// becomes the new lambda and is recorded under [`LAMBDA_KEY`].
    pub fn update_params(
        &mut self,
        train_loss: impl Into<LossValue>,
        val_loss: impl Into<LossValue>,
    ) -> TrainResult<()> {
        if self.updater.is_noop() {
            return Ok(());
        }

        let train_loss = train_loss.into();
        let val_loss = val_loss.into();
        let new_lambda = self.updater.update(self.lambda, &train_loss, &val_loss)?;

        if !new_lambda.is_finite() {
            tracing::warn!(lambda = new_lambda, "Regularization lambda is not finite");
        }
        tracing::debug!(old = self.lambda, new = new_lambda, "Regularization lambda updated");

        let mut logger = self.logger.try_borrow_mut().map_err(logger_busy)?;
        self.lambda = new_lambda;
        logger.record(LAMBDA_KEY, new_lambda);
        Ok(())
    }

    fn record(&self, key: &str, value: f64) -> TrainResult<()> {
        self.logger
            .try_borrow_mut()
            .map_err(logger_busy)?
            .record(key, value);
        Ok(())
    }
}

fn logger_busy(_: BorrowMutError) -> TrainError {
    TrainError::Reentrant("logger is already borrowed".to_string())
}

/// Expand `delta` to the shape of `param`.
fn broadcast_delta(param: &Parameter, delta: ArrayD<f64>) -> TrainResult<ArrayD<f64>> {
    if delta.shape() == param.data.shape() {
        return Ok(delta);
    }
    match delta.broadcast(param.data.raw_dim()) {
        Some(view) => Ok(view.to_owned()),
        None => Err(TrainError::ShapeMismatch {
            name: param.name.clone(),
            expected: param.data.shape().to_vec(),
            actual: delta.shape().to_vec(),
        }),
    }
}
