//! Integration tests for imitation-regularization
//!
//! These tests drive regularizers through full training steps: forward loss,
//! regularize, optimizer step and lambda updates between epochs.

use approx::assert_abs_diff_eq;
use imitation_regularization::{
    updater_fn, ConstantParamScaler, InMemoryRecorder, IntervalParamScaler, JsonlLogger,
    LambdaUpdater, Loss, LossValue, MetricsLogger, Optimizer, OptimizerConfig, ParamGroup,
    PenaltyConfig, Regularizer, RegularizerConfig, SgdOptimizer, TrainError, UpdaterConfig,
    LAMBDA_KEY, REGULARIZED_LOSS_KEY,
};
use scirs2_core::ndarray::{array, ArrayD};
use std::cell::RefCell;
use std::rc::Rc;

/// Samples of `y = 2 * x0 - x1`.
fn dataset() -> Vec<([f64; 2], f64)> {
    vec![
        ([1.0, 0.0], 2.0),
        ([0.0, 1.0], -1.0),
        ([1.0, 1.0], 1.0),
        ([2.0, 1.0], 3.0),
    ]
}

/// Mean squared error of the linear model `w` with its gradient under the
/// parameter name `"w"`.
fn mse(w: &ArrayD<f64>, data: &[([f64; 2], f64)]) -> Loss {
    let n = data.len() as f64;
    let mut value = 0.0;
    let mut grad = array![0.0, 0.0];

    for (x, y) in data {
        let err = w[[0]] * x[0] + w[[1]] * x[1] - y;
        value += err * err / n;
        grad[0] += 2.0 * err * x[0] / n;
        grad[1] += 2.0 * err * x[1] / n;
    }

    Loss::scalar(value).with_gradient("w", grad.into_dyn())
}

fn sgd(lr: f64, w: ArrayD<f64>) -> Rc<RefCell<SgdOptimizer>> {
    let config = OptimizerConfig {
        learning_rate: lr,
        momentum: 0.0,
        ..Default::default()
    };
    let group = ParamGroup::new(lr).with_param("w", w);
    Rc::new(RefCell::new(SgdOptimizer::with_groups(config, vec![group]).unwrap()))
}

fn weights(optimizer: &Rc<RefCell<SgdOptimizer>>) -> ArrayD<f64> {
    optimizer.borrow().param_groups()[0].params[0].data.clone()
}

/// One training step; returns the loss before regularization.
fn train_step(
    regularizer: &Regularizer,
    optimizer: &Rc<RefCell<SgdOptimizer>>,
) -> Result<f64, TrainError> {
    let w = weights(optimizer);
    let loss = mse(&w, &dataset());
    let raw = loss.item()?;

    optimizer.borrow_mut().zero_grad();
    regularizer.regularize(loss)?;
    optimizer.borrow_mut().step()?;
    Ok(raw)
}

/// Test: weight decay shrinks the learned weights relative to plain SGD
#[test]
fn test_weight_decay_training_shrinks_weights() -> Result<(), TrainError> {
    let plain = sgd(0.1, array![0.0, 0.0].into_dyn());
    let decayed = sgd(0.1, array![0.0, 0.0].into_dyn());

    let no_reg = Regularizer::weight_decay(
        plain.clone(),
        0.0,
        Box::new(ConstantParamScaler),
        Rc::new(RefCell::new(InMemoryRecorder::new())),
    )?;
    let reg = Regularizer::weight_decay(
        decayed.clone(),
        0.5,
        Box::new(ConstantParamScaler),
        Rc::new(RefCell::new(InMemoryRecorder::new())),
    )?;

    let mut first_loss = None;
    let mut last_loss = 0.0;
    for _ in 0..200 {
        last_loss = train_step(&no_reg, &plain)?;
        first_loss.get_or_insert(last_loss);
        train_step(&reg, &decayed)?;
    }

    // Unregularized SGD fits the data
    assert!(last_loss < first_loss.unwrap_or(f64::MAX));
    let w = weights(&plain);
    assert_abs_diff_eq!(w[[0]], 2.0, epsilon = 1e-3);
    assert_abs_diff_eq!(w[[1]], -1.0, epsilon = 1e-3);

    // Decay pulls every weight toward zero
    let wd = weights(&decayed);
    assert!(wd[[0]].abs() < w[[0]].abs());
    assert!(wd[[1]].abs() < w[[1]].abs());

    Ok(())
}

/// Test: an Lp regularizer adds its penalty before the optimizer step
#[test]
fn test_lp_regularizer_training_step() -> Result<(), TrainError> {
    let optimizer = sgd(0.1, array![1.0, 1.0].into_dyn());
    let recorder = Rc::new(RefCell::new(InMemoryRecorder::new()));
    let regularizer = Regularizer::lp(
        optimizer.clone(),
        0.1,
        Box::new(ConstantParamScaler),
        recorder.clone(),
        2,
    )?;

    let loss = mse(&weights(&optimizer), &dataset());
    let raw = loss.item()?;
    let regularized = regularizer.regularize(loss)?;

    // raw + 0.1 * (1 + 1)
    assert_abs_diff_eq!(regularized.item()?, raw + 0.2, epsilon = 1e-12);
    assert_eq!(recorder.borrow().values(REGULARIZED_LOSS_KEY), vec![regularized.item()?]);

    // The weights change only when the optimizer steps
    assert_eq!(weights(&optimizer), array![1.0, 1.0].into_dyn());
    let expected_grad = {
        let base = mse(&array![1.0, 1.0].into_dyn(), &dataset());
        base.gradient("w").unwrap().mapv(|v| v + 0.1 * 2.0 * 1.0)
    };
    optimizer.borrow_mut().step()?;

    let w = weights(&optimizer);
    for i in 0..2 {
        assert_abs_diff_eq!(w[[i]], 1.0 - 0.1 * expected_grad[[i]], epsilon = 1e-12);
    }

    Ok(())
}

/// Test: lambda adapts between epochs from the val/train loss ratio
#[test]
fn test_lambda_adapts_over_epochs() -> Result<(), TrainError> {
    let optimizer = sgd(0.05, array![0.0, 0.0].into_dyn());
    let recorder = Rc::new(RefCell::new(InMemoryRecorder::new()));
    let scaler = IntervalParamScaler::new(0.1, (0.9, 1.1))?;
    let mut regularizer = Regularizer::weight_decay(
        optimizer.clone(),
        1.0,
        Box::new(scaler),
        recorder.clone(),
    )?;

    // (train, val) pairs: overfitting, balanced, underfitting, bound
    let epochs = [(1.0, 1.5), (1.0, 1.0), (2.0, 1.0), (1.0, 1.1)];
    let mut expected = vec![1.0];
    let mut lambda = 1.0;

    for (train, val) in epochs {
        train_step(&regularizer, &optimizer)?;
        regularizer.update_params(train, val)?;
        lambda = scaler.update(lambda, &train.into(), &val.into())?;
        expected.push(lambda);
        assert_abs_diff_eq!(regularizer.lambda(), lambda, epsilon = 1e-12);
    }

    // 1.0 -> 1.1 -> 1.1 -> 0.99 -> 0.99
    assert_abs_diff_eq!(regularizer.lambda(), 0.99, epsilon = 1e-12);
    let recorded = recorder.borrow().values(LAMBDA_KEY);
    assert_eq!(recorded.len(), expected.len());
    for (got, want) in recorded.iter().zip(&expected) {
        assert_abs_diff_eq!(*got, *want, epsilon = 1e-12);
    }

    Ok(())
}

/// Test: losses handed over as tensors and as `Loss` values are accepted
#[test]
fn test_update_accepts_loss_values_and_tensors() -> Result<(), TrainError> {
    let optimizer = sgd(0.1, array![0.5, 0.5].into_dyn());
    let mut regularizer = Regularizer::lp(
        optimizer,
        1.0,
        Box::new(IntervalParamScaler::new(0.5, (0.9, 1.1))?),
        Rc::new(RefCell::new(InMemoryRecorder::new())),
        1,
    )?;

    let train = Loss::scalar(1.0);
    let val = scirs2_core::ndarray::arr0(3.0).into_dyn();
    regularizer.update_params(&train, val)?;
    assert_abs_diff_eq!(regularizer.lambda(), 1.5, epsilon = 1e-12);

    let result = regularizer.update_params(array![1.0, 2.0].into_dyn(), 1.0);
    assert!(matches!(result, Err(TrainError::NonScalarLoss { ndim: 1 })));
    assert_abs_diff_eq!(regularizer.lambda(), 1.5, epsilon = 1e-12);

    Ok(())
}

/// Test: a metrics logger receives lambda and regularized losses per step
#[test]
fn test_metrics_logger_records_regularization() -> Result<(), TrainError> {
    let path = std::env::temp_dir().join("imitation_regularization_integration.jsonl");
    let mut metrics = MetricsLogger::new();
    metrics.add_backend(JsonlLogger::new(&path)?);
    let metrics = Rc::new(RefCell::new(metrics));

    let optimizer = sgd(0.1, array![1.0, -1.0].into_dyn());
    let mut regularizer = Regularizer::lp(
        optimizer.clone(),
        0.2,
        Box::new(IntervalParamScaler::new(0.1, (0.9, 1.1))?),
        metrics.clone(),
        2,
    )?;

    for _ in 0..3 {
        let train = train_step(&regularizer, &optimizer)?;
        regularizer.update_params(train, train * 2.0)?;
        metrics.borrow_mut().dump()?;
    }
    metrics.borrow_mut().flush()?;

    let logger = metrics.borrow();
    assert_eq!(logger.current_step(), 3);
    assert_abs_diff_eq!(
        logger.last_value(LAMBDA_KEY).unwrap_or_default(),
        0.2 * 1.1 * 1.1 * 1.1,
        epsilon = 1e-12
    );
    assert!(logger.last_value(REGULARIZED_LOSS_KEY).is_some());

    let contents = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<serde_json::Value> = contents
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    // Two keys per step
    assert_eq!(lines.len(), 6);
    assert_eq!(lines[0]["step"], 0);
    assert_eq!(lines[0]["key"], LAMBDA_KEY);
    assert_eq!(lines[5]["step"], 2);
    assert_eq!(lines[5]["key"], REGULARIZED_LOSS_KEY);

    let _ = std::fs::remove_file(&path);
    Ok(())
}

/// Test: a regularizer built from JSON behaves like one built by hand
#[test]
fn test_config_built_regularizer_matches_manual() -> Result<(), TrainError> {
    let config = RegularizerConfig::from_json_str(
        r#"{
            "initial_lambda": 0.5,
            "penalty": { "type": "weight_decay" },
            "updater": { "type": "interval", "scaling_factor": 0.1, "tolerable_interval": [0.9, 1.1] }
        }"#,
    )?;
    assert_eq!(config.penalty, PenaltyConfig::WeightDecay);
    assert!(matches!(config.updater, UpdaterConfig::Interval { .. }));

    let from_config_opt = sgd(0.1, array![2.0, -2.0].into_dyn());
    let manual_opt = sgd(0.1, array![2.0, -2.0].into_dyn());

    let mut from_config = config.build(
        from_config_opt.clone(),
        Rc::new(RefCell::new(InMemoryRecorder::new())),
    )?;
    let mut manual = Regularizer::weight_decay(
        manual_opt.clone(),
        0.5,
        Box::new(IntervalParamScaler::new(0.1, (0.9, 1.1))?),
        Rc::new(RefCell::new(InMemoryRecorder::new())),
    )?;

    for (train, val) in [(1.0, 2.0), (1.0, 0.5)] {
        train_step(&from_config, &from_config_opt)?;
        train_step(&manual, &manual_opt)?;
        from_config.update_params(train, val)?;
        manual.update_params(train, val)?;
    }

    assert_eq!(from_config.lambda(), manual.lambda());
    assert_eq!(weights(&from_config_opt), weights(&manual_opt));
    Ok(())
}

/// Test: plain closures work as lambda updaters
#[test]
fn test_closure_updater_in_training_loop() -> Result<(), TrainError> {
    let optimizer = sgd(0.1, array![1.0, 1.0].into_dyn());
    let recorder = Rc::new(RefCell::new(InMemoryRecorder::new()));

    // Shrink lambda whenever validation loss improves on training loss
    let updater = updater_fn(|lambda, train: &LossValue, val: &LossValue| {
        if val.scalar()? < train.scalar()? {
            Ok(lambda * 0.5)
        } else {
            Ok(lambda)
        }
    });
    assert!(!updater.is_noop());

    let mut regularizer =
        Regularizer::weight_decay(optimizer.clone(), 0.8, Box::new(updater), recorder.clone())?;

    train_step(&regularizer, &optimizer)?;
    regularizer.update_params(1.0, 0.5)?;
    regularizer.update_params(1.0, 2.0)?;

    assert_abs_diff_eq!(regularizer.lambda(), 0.4, epsilon = 1e-12);
    assert_eq!(recorder.borrow().values(LAMBDA_KEY), vec![0.8, 0.4, 0.4]);
    Ok(())
}

/// Test: zero and negative losses follow the documented edge-case rules
#[test]
fn test_degenerate_losses() -> Result<(), TrainError> {
    let optimizer = sgd(0.1, array![1.0, 1.0].into_dyn());
    let mut regularizer = Regularizer::lp(
        optimizer,
        1.0,
        Box::new(IntervalParamScaler::new(0.1, (0.9, 1.1))?),
        Rc::new(RefCell::new(InMemoryRecorder::new())),
        2,
    )?;

    // 0 / 0 is not a ratio: unchanged
    regularizer.update_params(0.0, 0.0)?;
    assert_eq!(regularizer.lambda(), 1.0);

    // x / 0 is an infinitely large ratio: scale up
    regularizer.update_params(0.0, 1.0)?;
    assert_abs_diff_eq!(regularizer.lambda(), 1.1, epsilon = 1e-12);

    // NaN never moves lambda
    regularizer.update_params(f64::NAN, 1.0)?;
    assert_abs_diff_eq!(regularizer.lambda(), 1.1, epsilon = 1e-12);

    assert!(matches!(
        regularizer.update_params(-1.0, 1.0),
        Err(TrainError::InvalidLoss(_))
    ));
    assert_abs_diff_eq!(regularizer.lambda(), 1.1, epsilon = 1e-12);
    Ok(())
}

/// Test: two regularizers may share one optimizer and one logger
#[test]
fn test_shared_optimizer_and_logger() -> Result<(), TrainError> {
    let optimizer = sgd(0.1, array![2.0, 2.0].into_dyn());
    let recorder = Rc::new(RefCell::new(InMemoryRecorder::new()));

    let decay = Regularizer::weight_decay(
        optimizer.clone(),
        0.5,
        Box::new(ConstantParamScaler),
        recorder.clone(),
    )?;
    let lp = Regularizer::lp(
        optimizer.clone(),
        0.5,
        Box::new(ConstantParamScaler),
        recorder.clone(),
        1,
    )?;

    decay.regularize(Loss::scalar(0.0))?;
    // 2.0 - 0.5 * 0.1 * 2.0
    let w = weights(&optimizer);
    assert_abs_diff_eq!(w[[0]], 1.9, epsilon = 1e-12);
    assert_abs_diff_eq!(w[[1]], 1.9, epsilon = 1e-12);

    let regularized = lp.regularize(Loss::scalar(0.0))?;
    // 0.5 * (1.9 + 1.9)
    assert_abs_diff_eq!(regularized.item()?, 1.9, epsilon = 1e-12);

    assert_eq!(recorder.borrow().count(LAMBDA_KEY), 2);
    assert_eq!(recorder.borrow().count(REGULARIZED_LOSS_KEY), 1);
    Ok(())
}
