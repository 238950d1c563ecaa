use std::sync::atomic::Ordering;
use std::time::Instant;

use log::info;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::math::matrix::Matrix;
use crate::network::model::Model;
use crate::train::callbacks::{Callback, CallbackAction};
use crate::train::epoch_stats::EpochStats;
use crate::train::train_config::TrainConfig;

/// Outcome of a [`fit`] run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitReport {
    pub epochs_run: usize,
    /// True when a callback or the stop flag ended the run before
    /// `config.epochs`.
    pub stopped_early: bool,
    pub final_train_loss: f64,
    pub final_val_loss: f64,
}

/// Trains a compiled `model` for up to `config.epochs` full-batch epochs.
///
/// Each epoch runs one [`Model::train_step`] on the whole training set,
/// evaluates the validation set (or reuses the training loss when there is
/// none) and hands the resulting [`EpochStats`] to every callback.
///
/// # Early termination
/// The loop breaks early if:
/// - any callback returns [`CallbackAction::Stop`], **or**
/// - `config.stop_flag` is set to `true` (checked before each epoch).
pub fn fit(
    model: &mut Model,
    x_train: &Matrix,
    y_train: &Matrix,
    validation: Option<(&Matrix, &Matrix)>,
    config: &TrainConfig,
    callbacks: &mut [&mut dyn Callback],
) -> Result<FitReport> {
    config.validate()?;
    if !model.is_compiled() {
        return Err(Error::value("fit", "compile the model before training"));
    }
    check_samples("fit", x_train, y_train)?;
    if let Some((x_val, y_val)) = validation {
        check_samples("fit (validation)", x_val, y_val)?;
    }

    for callback in callbacks.iter_mut() {
        callback.on_train_begin();
    }
    info!(
        "training for {} epochs on {} samples{}",
        config.epochs,
        x_train.rows(),
        if validation.is_some() { " with validation" } else { "" }
    );

    let mut report = FitReport {
        epochs_run: 0,
        stopped_early: false,
        final_train_loss: f64::NAN,
        final_val_loss: f64::NAN,
    };

    for epoch in 1..=config.epochs {
        if let Some(ref flag) = config.stop_flag {
            if flag.load(Ordering::Relaxed) {
                info!("stop requested before epoch {epoch}");
                report.stopped_early = true;
                break;
            }
        }

        let t_start = Instant::now();
        let train_loss = model.train_step(x_train, y_train)?;
        let val_loss = match validation {
            Some((x_val, y_val)) => model.evaluate(x_val, y_val)?,
            None => train_loss,
        };

        let stats = EpochStats {
            epoch,
            total_epochs: config.epochs,
            train_loss,
            val_loss,
            has_validation: validation.is_some(),
            elapsed_ms: t_start.elapsed().as_millis() as u64,
        };

        let mut stop = false;
        for callback in callbacks.iter_mut() {
            if callback.on_epoch_end(&stats) == CallbackAction::Stop {
                stop = true;
            }
        }

        if epoch == 1 || epoch == config.epochs || epoch % config.log_interval == 0 {
            info!("Epoch [{}/{}] Loss: {:.6} | Val Loss: {:.6}", epoch, config.epochs, train_loss, val_loss);
        }

        report.epochs_run = epoch;
        report.final_train_loss = train_loss;
        report.final_val_loss = val_loss;

        if stop {
            report.stopped_early = epoch < config.epochs;
            break;
        }
    }

    for callback in callbacks.iter_mut() {
        callback.on_train_end();
    }
    info!(
        "training finished after {} epochs (final loss {:.6})",
        report.epochs_run, report.final_train_loss
    );
    Ok(report)
}

fn check_samples(context: &'static str, inputs: &Matrix, targets: &Matrix) -> Result<()> {
    if inputs.rows() != targets.rows() {
        return Err(Error::value(
            context,
            format!("{} input rows but {} target rows", inputs.rows(), targets.rows()),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;

    use crate::activation::activation::ActivationFunction;
    use crate::layers::dense::Dense;
    use crate::loss::loss::Loss;
    use crate::optim::sgd::Sgd;
    use crate::train::callbacks::History;

    fn compiled_model() -> Model {
        let mut model = Model::with_seed(Dense::new(1, ActivationFunction::Linear), 3);
        model.compile(Loss::mse(), Box::new(Sgd::new(0.01).unwrap()));
        model
    }

    fn data() -> (Matrix, Matrix) {
        let x = Matrix::new(vec![1.0, 2.0, 3.0], 3, 1).unwrap();
        let y = Matrix::new(vec![2.0, 4.0, 6.0], 3, 1).unwrap();
        (x, y)
    }

    #[test]
    fn runs_every_epoch_without_callbacks() {
        let mut model = compiled_model();
        let (x, y) = data();
        let report = model.fit(&x, &y, None, &TrainConfig::new(5), &mut []).unwrap();
        assert_eq!(report.epochs_run, 5);
        assert!(!report.stopped_early);
        assert_eq!(report.final_train_loss, report.final_val_loss);
    }

    #[test]
    fn stop_flag_prevents_any_epoch() {
        let mut model = compiled_model();
        let (x, y) = data();
        let flag = Arc::new(AtomicBool::new(true));
        let config = TrainConfig::new(5).with_stop_flag(flag);
        let mut history = History::new();
        let report = model.fit(&x, &y, None, &config, &mut [&mut history]).unwrap();
        assert_eq!(report.epochs_run, 0);
        assert!(report.stopped_early);
        assert!(history.epochs().is_empty());
    }

    #[test]
    fn rejects_mismatched_sample_counts_and_bad_config() {
        let mut model = compiled_model();
        let (x, _) = data();
        let y = Matrix::ones(2, 1).unwrap();
        assert!(matches!(
            model.fit(&x, &y, None, &TrainConfig::new(1), &mut []),
            Err(Error::Value { .. })
        ));
        let (x, y) = data();
        assert!(model.fit(&x, &y, None, &TrainConfig::new(0), &mut []).is_err());
    }

    #[test]
    fn fit_requires_compile() {
        let mut model = Model::with_seed(Dense::new(1, ActivationFunction::Linear), 3);
        let (x, y) = data();
        assert!(model.fit(&x, &y, None, &TrainConfig::new(1), &mut []).is_err());
    }
}
