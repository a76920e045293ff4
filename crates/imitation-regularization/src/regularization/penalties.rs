//! The two penalty families and their concrete penalties.
//!
//! - Loss penalties return an additive term; the regularizer adds it to the
//!   loss and back-propagates the sum.
//! - Weight penalties return a per-parameter delta; the regularizer
//!   back-propagates the unmodified loss and then adds the delta to each
//!   parameter in place.

use crate::{Loss, ParamGroup, Parameter, PenaltyTerm, TrainError, TrainResult};
use scirs2_core::ndarray::ArrayD;
use std::fmt;

/// A penalty applied as an additive loss term.
pub trait LossPenalty: fmt::Debug {
    /// Compute the term to add to `loss`, not the regularized loss itself.
    ///
    /// Implementations must not run backward passes or record values; the
    /// regularizer does both on the combined loss.
    fn penalty(&self, lambda: f64, loss: &Loss, groups: &[ParamGroup]) -> TrainResult<PenaltyTerm>;
}

/// A penalty applied as a direct adjustment of each weight.
pub trait WeightPenalty: fmt::Debug {
    /// Compute the delta added to `param`, which belongs to `group`.
    ///
    /// The delta must have the parameter's shape or broadcast to it.
    fn delta(&self, lambda: f64, param: &Parameter, group: &ParamGroup)
        -> TrainResult<ArrayD<f64>>;
}

/// The penalty a regularizer applies, tagged by family.
#[derive(Debug)]
pub enum Penalty {
    /// Additive loss term.
    Loss(Box<dyn LossPenalty>),
    /// In-place weight adjustment.
    Weight(Box<dyn WeightPenalty>),
}

impl Penalty {
    /// Lp penalty of order `p`.
    pub fn lp(p: u32) -> TrainResult<Self> {
        Ok(Penalty::Loss(Box::new(LpPenalty::new(p)?)))
    }

    /// Weight decay penalty.
    pub fn weight_decay() -> Self {
        Penalty::Weight(Box::new(WeightDecayPenalty))
    }

    /// Whether this is a loss-family penalty.
    pub fn is_loss_penalty(&self) -> bool {
        matches!(self, Penalty::Loss(_))
    }
}

/// Lp regularization: `lambda * sum(||w||_p ^ p)` over every parameter of
/// every group.
///
/// The loss value itself does not enter the penalty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LpPenalty {
    p: u32,
}

impl LpPenalty {
    /// Create an Lp penalty of order `p >= 1`.
    pub fn new(p: u32) -> TrainResult<Self> {
        if p == 0 {
            return Err(TrainError::InvalidParameter(
                "Lp penalty order p must be at least 1".to_string(),
            ));
        }
        Ok(Self { p })
    }

    /// Order of the norm.
    pub fn p(&self) -> u32 {
        self.p
    }
}

/// Sign with `sign(0) == 0`, the subgradient choice at the origin.
fn sign(w: f64) -> f64 {
    if w > 0.0 {
        1.0
    } else if w < 0.0 {
        -1.0
    } else {
        0.0
    }
}

impl LossPenalty for LpPenalty {
    fn penalty(&self, lambda: f64, _loss: &Loss, groups: &[ParamGroup]) -> TrainResult<PenaltyTerm> {
        let p = f64::from(self.p);
        let mut term = PenaltyTerm::default();

        for group in groups {
            for param in &group.params {
                term.value += param.lp_norm(self.p).powf(p);

                // d/dw |w|^p = p * |w|^(p-1) * sign(w)
                let grad = param.data.mapv(|w| p * w.abs().powf(p - 1.0) * sign(w));
                term.gradients.insert(param.name.clone(), grad);
            }
        }

        Ok(term.scaled(lambda))
    }
}

/// Weight decay: each weight moves by `-lambda * lr * w`, using the learning
/// rate of the group the weight belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WeightDecayPenalty;

impl WeightPenalty for WeightDecayPenalty {
    fn delta(
        &self,
        lambda: f64,
        param: &Parameter,
        group: &ParamGroup,
    ) -> TrainResult<ArrayD<f64>> {
        let scale = -lambda * group.lr;
        Ok(param.data.mapv(|w| scale * w))
    }
}
