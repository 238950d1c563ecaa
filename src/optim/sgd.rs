use crate::error::Result;
use crate::optim::optimizer::{validate_learning_rate, validate_params, Optimizer};
use crate::params::store::{ParamId, ParamStore};

/// Plain gradient descent: `param -= learning_rate * grad`.
#[derive(Debug, Clone)]
pub struct Sgd {
    learning_rate: f64,
    params: Vec<ParamId>,
}

impl Sgd {
    pub fn new(learning_rate: f64) -> Result<Sgd> {
        validate_learning_rate(learning_rate)?;
        Ok(Sgd { learning_rate, params: Vec::new() })
    }
}

impl Optimizer for Sgd {
    fn setup(&mut self, params: Vec<ParamId>) {
        self.params = params;
    }

    fn params(&self) -> &[ParamId] {
        &self.params
    }

    fn step(&mut self, store: &mut ParamStore) -> Result<()> {
        validate_params(store, &self.params)?;

        for &id in &self.params {
            let (value, grad) = store.value_and_grad_mut(id)?;
            for (w, g) in value.as_mut_slice().iter_mut().zip(grad.as_slice()) {
                *w -= self.learning_rate * g;
            }
        }
        Ok(())
    }

    fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    fn name(&self) -> &'static str {
        "sgd"
    }
}
