//! Example: Watching lambda adaptation through `tracing`
//!
//! Regularizers emit `tracing` events for every lambda update and every
//! regularized loss. This example installs a subscriber and prints them.
//!
//! Run with: cargo run --example 02_structured_logging --features structured-logging

use imitation_regularization::structured_logging::{LogFormat, LogLevel, TracingLogger};
use imitation_regularization::{
    InMemoryRecorder, IntervalParamScaler, Loss, OptimizerConfig, ParamGroup, Regularizer,
    SgdOptimizer,
};
use scirs2_core::ndarray::array;
use std::cell::RefCell;
use std::rc::Rc;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Structured Logging Example ===\n");

    let logger = TracingLogger::builder()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Trace)
        .with_targets(true)
        .build()?;
    tracing::info!(format = ?logger.format(), "Subscriber installed");

    let group = ParamGroup::new(0.1).with_param("w", array![0.5, -1.5, 2.0].into_dyn());
    let optimizer = Rc::new(RefCell::new(SgdOptimizer::with_groups(
        OptimizerConfig::default(),
        vec![group],
    )?));
    let recorder = Rc::new(RefCell::new(InMemoryRecorder::new()));

    let mut lp = Regularizer::lp(
        optimizer.clone(),
        0.1,
        Box::new(IntervalParamScaler::new(0.1, (0.9, 1.1))?),
        recorder.clone(),
        2,
    )?;
    let decay = Regularizer::weight_decay(
        optimizer,
        0.01,
        Box::new(IntervalParamScaler::new(0.1, (0.9, 1.1))?),
        recorder.clone(),
    )?;

    // (train, val) losses per epoch: overfitting, balanced, underfitting
    let epochs = [(0.8, 1.2), (0.7, 0.72), (0.9, 0.6)];
    for (epoch, (train, val)) in epochs.into_iter().enumerate() {
        let span = tracing::info_span!("epoch", epoch = epoch);
        let _enter = span.enter();

        // debug: regularized loss
        lp.regularize(Loss::scalar(train))?;
        // trace: per-parameter adjustment
        decay.regularize(Loss::scalar(train))?;

        // debug: old and new lambda
        lp.update_params(train, val)?;
    }

    // warn: lambda overflow
    let mut overflow = Regularizer::weight_decay(
        Rc::new(RefCell::new(SgdOptimizer::new(OptimizerConfig::default()))),
        f64::MAX,
        Box::new(IntervalParamScaler::new(0.5, (0.9, 1.1))?),
        recorder.clone(),
    )?;
    overflow.update_params(1.0, 10.0)?;

    println!("\nRecorded values:");
    for (key, value) in recorder.borrow().records() {
        println!("  {} = {}", key, value);
    }

    Ok(())
}
