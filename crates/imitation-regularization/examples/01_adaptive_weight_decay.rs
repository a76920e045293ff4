//! Adaptive weight decay on a small linear regression.
//!
//! This example demonstrates:
//! - Attaching a weight decay regularizer to an SGD optimizer
//! - Adapting lambda from the validation/training loss ratio each epoch
//! - Logging lambda through a `MetricsLogger` with a console backend
//! - Building an equivalent Lp regularizer from a JSON configuration

use imitation_regularization::{
    ConsoleLogger, IntervalParamScaler, Loss, MetricsLogger, Optimizer, OptimizerConfig,
    ParamGroup, Regularizer, RegularizerConfig, SgdOptimizer, LAMBDA_KEY,
};
use scirs2_core::ndarray::{Array1, Array2, ArrayD};
use std::cell::RefCell;
use std::rc::Rc;

/// Mean squared error of `x . w` against `y`, with the gradient for `"w"`.
fn mse(w: &ArrayD<f64>, x: &Array2<f64>, y: &Array1<f64>) -> Loss {
    let w = Array1::from_iter(w.iter().copied());
    let err = x.dot(&w) - y;
    let n = y.len() as f64;

    let value = err.mapv(|e| e * e).sum() / n;
    let grad = x.t().dot(&err).mapv(|g| 2.0 * g / n);
    Loss::scalar(value).with_gradient("w", grad.into_dyn())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Adaptive Weight Decay Example ===\n");

    // y = 1.5 * x0 - 2 * x1 + 0.5 * x2, with few training samples and a
    // noisy target so the model can overfit
    let truth = [1.5, -2.0, 0.5];
    let make = |rows: usize, offset: f64| {
        let x = Array2::from_shape_fn((rows, 3), |(i, j)| ((i * 3 + j) as f64 * 0.7 + offset).sin());
        let y = Array1::from_shape_fn(rows, |i| {
            (0..3).map(|j| truth[j] * x[[i, j]]).sum::<f64>() + 0.3 * (i as f64 * 1.3).cos()
        });
        (x, y)
    };
    let (train_x, train_y) = make(8, 0.0);
    let (val_x, val_y) = make(32, 0.4);

    let config = OptimizerConfig {
        learning_rate: 0.1,
        momentum: 0.5,
        ..Default::default()
    };
    let group = ParamGroup::new(config.learning_rate).with_param("w", ArrayD::zeros(vec![3]));
    let optimizer = Rc::new(RefCell::new(SgdOptimizer::with_groups(config, vec![group])?));

    let mut metrics = MetricsLogger::new();
    metrics.add_backend(ConsoleLogger::without_timestamp());
    let metrics = Rc::new(RefCell::new(metrics));

    let mut regularizer = Regularizer::weight_decay(
        optimizer.clone(),
        0.05,
        Box::new(IntervalParamScaler::new(0.2, (0.9, 1.1))?),
        metrics.clone(),
    )?;

    for epoch in 0..10 {
        for _ in 0..20 {
            let w = optimizer.borrow().param_groups()[0].params[0].data.clone();
            optimizer.borrow_mut().zero_grad();
            regularizer.regularize(mse(&w, &train_x, &train_y))?;
            optimizer.borrow_mut().step()?;
        }

        let w = optimizer.borrow().param_groups()[0].params[0].data.clone();
        let train_loss = mse(&w, &train_x, &train_y).item()?;
        let val_loss = mse(&w, &val_x, &val_y).item()?;
        regularizer.update_params(train_loss, val_loss)?;

        metrics.borrow_mut().record_mean("train_loss", train_loss);
        metrics.borrow_mut().record_mean("val_loss", val_loss);
        metrics
            .borrow_mut()
            .log_message(&format!("epoch {}: val/train = {:.3}", epoch, val_loss / train_loss))?;
        metrics.borrow_mut().dump()?;
    }

    println!(
        "\nFinal lambda: {:.4}",
        metrics.borrow().last_value(LAMBDA_KEY).unwrap_or_default()
    );
    println!(
        "Final weights: {:?} (truth {:?})\n",
        optimizer.borrow().param_groups()[0].params[0].data.as_slice(),
        truth
    );

    // The same kind of regularizer, described declaratively
    let lp_config = RegularizerConfig::from_json_str(
        r#"{
            "initial_lambda": 0.01,
            "penalty": { "type": "lp", "p": 1 },
            "updater": { "type": "interval", "scaling_factor": 0.2, "tolerable_interval": [0.9, 1.1] }
        }"#,
    )?;
    println!("Lp configuration:\n{}", lp_config.to_json_string()?);

    let lp = lp_config.build(optimizer.clone(), metrics.clone())?;
    let w = optimizer.borrow().param_groups()[0].params[0].data.clone();
    let regularized = lp.regularize(mse(&w, &train_x, &train_y))?;
    println!("\nL1-regularized training loss: {:.6}", regularized.item()?);

    Ok(())
}
