//! Strategies that adapt the regularization strength between updates.
//!
//! A [`LambdaUpdater`] maps `(lambda, train_loss, val_loss)` to a new lambda.
//! Implementations must be free of side effects: the same arguments always
//! produce the same result, and only construction-time hyperparameters may
//! be stored.

use crate::{LossValue, TrainError, TrainResult};
use std::fmt;

/// Computes a new regularization strength from the current one and a pair
/// of losses.
pub trait LambdaUpdater {
    /// Return the new lambda.
    ///
    /// # Arguments
    /// * `lambda` - Current regularization strength
    /// * `train_loss` - Loss on the training set
    /// * `val_loss` - Loss on the validation set
    fn update(&self, lambda: f64, train_loss: &LossValue, val_loss: &LossValue)
        -> TrainResult<f64>;

    /// Whether this updater never changes lambda.
    ///
    /// Regularizers skip the update (and the lambda record that follows it)
    /// entirely for no-op updaters.
    fn is_noop(&self) -> bool {
        false
    }
}

/// Updater that always keeps lambda unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConstantParamScaler;

impl LambdaUpdater for ConstantParamScaler {
    fn update(
        &self,
        lambda: f64,
        _train_loss: &LossValue,
        _val_loss: &LossValue,
    ) -> TrainResult<f64> {
        Ok(lambda)
    }

    fn is_noop(&self) -> bool {
        true
    }
}

/// Scales lambda by a constant factor based on the validation/training loss
/// ratio.
///
/// Lambda grows by `scaling_factor` when the ratio is above the tolerable
/// interval (validation loss disproportionately large) and shrinks by it
/// when the ratio is below. A ratio equal to either bound counts as inside
/// the interval.
///
/// Edge cases:
/// - Negative losses are rejected with [`TrainError::InvalidLoss`].
/// - A zero training loss gives an infinite ratio when the validation loss
///   is positive (scale up) and a NaN ratio when it is zero (no change).
/// - Any NaN loss leaves lambda unchanged.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntervalParamScaler {
    scaling_factor: f64,
    tolerable_interval: (f64, f64),
}

impl IntervalParamScaler {
    /// Create a new interval scaler.
    ///
    /// # Arguments
    /// * `scaling_factor` - Fraction to scale lambda by, in the open interval (0, 1)
    /// * `tolerable_interval` - `(low, high)` bounds on the val/train ratio,
    ///   with `0 <= low < high`
    pub fn new(scaling_factor: f64, tolerable_interval: (f64, f64)) -> TrainResult<Self> {
        if !(scaling_factor > 0.0 && scaling_factor < 1.0) {
            return Err(TrainError::InvalidParameter(format!(
                "scaling_factor must be in (0, 1), got {}",
                scaling_factor
            )));
        }

        let (low, high) = tolerable_interval;
        if !(low >= 0.0 && low < high) {
            return Err(TrainError::InvalidParameter(format!(
                "tolerable_interval must satisfy 0 <= low < high, got ({}, {})",
                low, high
            )));
        }

        Ok(Self {
            scaling_factor,
            tolerable_interval,
        })
    }

    /// Fraction lambda is scaled by.
    pub fn scaling_factor(&self) -> f64 {
        self.scaling_factor
    }

    /// Bounds on the validation/training loss ratio.
    pub fn tolerable_interval(&self) -> (f64, f64) {
        self.tolerable_interval
    }
}

impl LambdaUpdater for IntervalParamScaler {
    fn update(
        &self,
        lambda: f64,
        train_loss: &LossValue,
        val_loss: &LossValue,
    ) -> TrainResult<f64> {
        let train = train_loss.scalar()?;
        let val = val_loss.scalar()?;

        if train < 0.0 || val < 0.0 {
            return Err(TrainError::InvalidLoss(format!(
                "losses must be non-negative, got train={} val={}",
                train, val
            )));
        }

        let ratio = val / train;
        let (low, high) = self.tolerable_interval;

        let new_lambda = if ratio > high {
            lambda * (1.0 + self.scaling_factor)
        } else if ratio < low {
            lambda * (1.0 - self.scaling_factor)
        } else {
            lambda
        };

        Ok(new_lambda)
    }
}

/// Adapter turning a plain function or closure into a [`LambdaUpdater`].
///
/// Create one with [`updater_fn`].
#[derive(Clone, Copy)]
pub struct FnUpdater<F> {
    f: F,
}

impl<F> fmt::Debug for FnUpdater<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnUpdater").finish_non_exhaustive()
    }
}

/// Wrap `f` as a [`LambdaUpdater`].
///
/// ```
/// use imitation_regularization::{updater_fn, LambdaUpdater, LossValue};
///
/// let halve = updater_fn(|lambda, _: &LossValue, _: &LossValue| Ok(lambda / 2.0));
/// let next = halve.update(1.0, &1.0.into(), &1.0.into()).unwrap();
/// assert_eq!(next, 0.5);
/// ```
pub fn updater_fn<F>(f: F) -> FnUpdater<F>
where
    F: Fn(f64, &LossValue, &LossValue) -> TrainResult<f64>,
{
    FnUpdater { f }
}

impl<F> LambdaUpdater for FnUpdater<F>
where
    F: Fn(f64, &LossValue, &LossValue) -> TrainResult<f64>,
{
    fn update(
        &self,
        lambda: f64,
        train_loss: &LossValue,
        val_loss: &LossValue,
    ) -> TrainResult<f64> {
        (self.f)(lambda, train_loss, val_loss)
    }
}
