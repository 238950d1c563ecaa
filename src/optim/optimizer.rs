use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::error::{ensure_shape, Error, Result};
use crate::optim::adam::Adam;
use crate::optim::sgd::Sgd;
use crate::params::store::{ParamId, ParamStore};

/// Parameter update rule.
///
/// `setup` binds the optimizer to the ids it should update; `step` reads the
/// gradients stored next to those parameters and mutates the values in place.
/// Every id is validated before any value is touched, so a failing step
/// leaves the parameters unchanged.
pub trait Optimizer: Debug {
    fn setup(&mut self, params: Vec<ParamId>);

    fn params(&self) -> &[ParamId];

    fn step(&mut self, store: &mut ParamStore) -> Result<()>;

    fn learning_rate(&self) -> f64;

    fn name(&self) -> &'static str;
}

/// Serializable optimizer choice, used by `NetworkSpec`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OptimizerSpec {
    Sgd {
        learning_rate: f64,
    },
    Adam {
        learning_rate: f64,
        #[serde(default = "default_beta1")]
        beta1: f64,
        #[serde(default = "default_beta2")]
        beta2: f64,
        #[serde(default = "default_epsilon")]
        epsilon: f64,
    },
}

fn default_beta1() -> f64 {
    0.9
}

fn default_beta2() -> f64 {
    0.999
}

fn default_epsilon() -> f64 {
    1e-8
}

impl OptimizerSpec {
    pub fn build(&self) -> Result<Box<dyn Optimizer>> {
        Ok(match *self {
            OptimizerSpec::Sgd { learning_rate } => Box::new(Sgd::new(learning_rate)?),
            OptimizerSpec::Adam { learning_rate, beta1, beta2, epsilon } => {
                Box::new(Adam::with_hyperparams(learning_rate, beta1, beta2, epsilon)?)
            }
        })
    }
}

/// Learning rate must lie in (0, 1].
pub(crate) fn validate_learning_rate(learning_rate: f64) -> Result<()> {
    if !(learning_rate.is_finite() && learning_rate > 0.0 && learning_rate <= 1.0) {
        return Err(Error::value(
            "Optimizer",
            format!("learning rate must be in (0, 1], got {learning_rate}"),
        ));
    }
    Ok(())
}

/// Checks that every id resolves and carries a gradient of its own shape.
pub(crate) fn validate_params(store: &ParamStore, params: &[ParamId]) -> Result<()> {
    for &id in params {
        ensure_shape("Optimizer::step", store.value(id)?.shape(), store.grad(id)?.shape())?;
    }
    Ok(())
}
