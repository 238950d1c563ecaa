use log::debug;
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::math::matrix::Matrix;
use crate::optim::optimizer::{validate_learning_rate, validate_params, Optimizer};
use crate::params::store::{ParamId, ParamStore};

#[derive(Debug, Clone)]
struct Moments {
    /// Running mean of the gradient.
    m: Matrix,
    /// Running mean of the squared gradient.
    v: Matrix,
}

/// Adam (bias-corrected adaptive moments).
///
/// Moment tables are allocated lazily on the first `step` for each parameter
/// and keyed by `ParamId`, so calling `setup` again with an overlapping
/// parameter list keeps the history of the unchanged parameters.
#[derive(Debug, Clone)]
pub struct Adam {
    learning_rate: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
    t: u64,
    params: Vec<ParamId>,
    moments: HashMap<ParamId, Moments>,
}

impl Adam {
    /// Adam with the usual defaults (0.9, 0.999, 1e-8).
    pub fn new(learning_rate: f64) -> Result<Adam> {
        Adam::with_hyperparams(learning_rate, 0.9, 0.999, 1e-8)
    }

    pub fn with_hyperparams(learning_rate: f64, beta1: f64, beta2: f64, epsilon: f64) -> Result<Adam> {
        validate_learning_rate(learning_rate)?;
        for (name, beta) in [("beta1", beta1), ("beta2", beta2)] {
            if !(beta.is_finite() && (0.0..1.0).contains(&beta)) {
                return Err(Error::value("Adam", format!("{name} must be in [0, 1), got {beta}")));
            }
        }
        if !(epsilon.is_finite() && epsilon > 0.0) {
            return Err(Error::value("Adam", format!("epsilon must be > 0, got {epsilon}")));
        }

        Ok(Adam {
            learning_rate,
            beta1,
            beta2,
            epsilon,
            t: 0,
            params: Vec::new(),
            moments: HashMap::new(),
        })
    }

    /// Number of completed steps.
    pub fn steps(&self) -> u64 {
        self.t
    }

    /// Allocates zeroed moments for parameters seen for the first time, or
    /// whose shape changed since.
    fn ensure_moments(&mut self, store: &ParamStore) -> Result<()> {
        for &id in &self.params {
            let shape = store.value(id)?.shape();
            let stale = self.moments.get(&id).map_or(true, |mom| mom.m.shape() != shape);
            if stale {
                let zeros = store.value(id)?.zeros_like();
                debug!("adam: allocating moments for parameter {} {:?}", id.index(), shape);
                self.moments.insert(id, Moments { m: zeros.clone(), v: zeros });
            }
        }
        Ok(())
    }
}

impl Optimizer for Adam {
    /// Moments of ids no longer in `params` are dropped.
    fn setup(&mut self, params: Vec<ParamId>) {
        self.moments.retain(|id, _| params.contains(id));
        self.params = params;
    }

    fn params(&self) -> &[ParamId] {
        &self.params
    }

    fn step(&mut self, store: &mut ParamStore) -> Result<()> {
        validate_params(store, &self.params)?;
        self.ensure_moments(store)?;

        self.t += 1;
        let corr1 = 1.0 - self.beta1.powf(self.t as f64);
        let corr2 = 1.0 - self.beta2.powf(self.t as f64);
        let (beta1, beta2) = (self.beta1, self.beta2);

        for &id in &self.params {
            let (value, grad) = store.value_and_grad_mut(id)?;
            let moments = self.moments.get_mut(&id)
                .ok_or_else(|| Error::value("Adam::step", "missing moment state"))?;

            let params = value.as_mut_slice().iter_mut();
            let m = moments.m.as_mut_slice().iter_mut();
            let v = moments.v.as_mut_slice().iter_mut();
            for (((w, g), m), v) in params.zip(grad.as_slice()).zip(m).zip(v) {
                *m = beta1 * *m + (1.0 - beta1) * g;
                *v = beta2 * *v + (1.0 - beta2) * g * g;

                let m_hat = *m / corr1;
                let v_hat = *v / corr2;
                *w -= self.learning_rate * m_hat / (v_hat.sqrt() + self.epsilon);
            }
        }
        Ok(())
    }

    fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    fn name(&self) -> &'static str {
        "adam"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn rejects_bad_hyperparams() {
        assert!(Adam::with_hyperparams(0.01, 1.0, 0.999, 1e-8).is_err());
        assert!(Adam::with_hyperparams(0.01, 0.9, -0.1, 1e-8).is_err());
        assert!(Adam::with_hyperparams(0.01, 0.9, 0.999, 0.0).is_err());
        assert!(Adam::new(0.0).is_err());
    }

    #[test]
    fn first_step_has_unit_magnitude_per_element() {
        let mut store = ParamStore::with_seed(0);
        let w = store.insert(Matrix::from_data(vec![vec![1.0, 1.0]]).unwrap());
        store.set_grad(w, Matrix::from_data(vec![vec![0.3, -7.0]]).unwrap()).unwrap();

        let mut adam = Adam::with_hyperparams(0.1, 0.9, 0.999, 1e-12).unwrap();
        adam.setup(vec![w]);
        adam.step(&mut store).unwrap();

        // m_hat = g and v_hat = g², so the update is lr * sign(g).
        let value = store.value(w).unwrap().as_slice();
        assert_abs_diff_eq!(value[0], 0.9, epsilon = 1e-9);
        assert_abs_diff_eq!(value[1], 1.1, epsilon = 1e-9);
        assert_eq!(adam.steps(), 1);
    }

    #[test]
    fn moments_survive_a_fresh_setup() {
        let mut store = ParamStore::with_seed(0);
        let w = store.insert(Matrix::ones(1, 1).unwrap());
        store.set_grad(w, Matrix::ones(1, 1).unwrap()).unwrap();

        let mut adam = Adam::new(0.1).unwrap();
        adam.setup(vec![w]);
        adam.step(&mut store).unwrap();
        let m_after_one = adam.moments[&w].m.as_slice()[0];

        let b = store.insert(Matrix::ones(1, 2).unwrap());
        adam.setup(vec![w, b]);
        adam.step(&mut store).unwrap();

        // Second update of m continues from the first instead of restarting.
        let expected = 0.9 * m_after_one + 0.1;
        assert_abs_diff_eq!(adam.moments[&w].m.as_slice()[0], expected, epsilon = 1e-12);
        assert_eq!(adam.moments[&b].m.shape(), (1, 2));
    }

    #[test]
    fn setup_drops_moments_of_removed_parameters() {
        let mut store = ParamStore::with_seed(0);
        let w = store.insert(Matrix::ones(1, 1).unwrap());
        let b = store.insert(Matrix::ones(1, 3).unwrap());

        let mut adam = Adam::new(0.1).unwrap();
        adam.setup(vec![w, b]);
        adam.step(&mut store).unwrap();
        assert_eq!(adam.moments.len(), 2);

        adam.setup(vec![b]);
        assert_eq!(adam.moments.len(), 1);
        assert!(adam.moments.contains_key(&b));
        assert!(!adam.moments.contains_key(&w));
    }

    #[test]
    fn unknown_parameter_fails_before_any_update() {
        let mut store = ParamStore::with_seed(0);
        let w = store.insert(Matrix::ones(1, 1).unwrap());
        store.set_grad(w, Matrix::ones(1, 1).unwrap()).unwrap();

        let mut foreign = ParamStore::with_seed(0);
        foreign.insert(Matrix::ones(1, 1).unwrap());
        let stray = foreign.insert(Matrix::ones(1, 1).unwrap());

        let mut adam = Adam::new(0.5).unwrap();
        adam.setup(vec![w, stray]);
        assert!(adam.step(&mut store).is_err());
        assert_eq!(store.value(w).unwrap().as_slice(), &[1.0]);
        assert_eq!(adam.steps(), 0);
        assert!(adam.moments.is_empty());
    }

    #[test]
    fn bias_correction_holds_past_many_steps() {
        let mut store = ParamStore::with_seed(0);
        let w = store.insert(Matrix::ones(1, 1).unwrap());
        store.set_grad(w, Matrix::ones(1, 1).unwrap()).unwrap();

        let mut adam = Adam::new(0.1).unwrap();
        adam.setup(vec![w]);
        adam.t = u64::from(u32::MAX);
        adam.step(&mut store).unwrap();

        // beta^t underflows to zero, so m_hat = 0.1 and v_hat = 0.001.
        let expected = 1.0 - 0.1 * 0.1 / (0.001_f64.sqrt() + 1e-8);
        assert_abs_diff_eq!(store.value(w).unwrap().as_slice()[0], expected, epsilon = 1e-9);
    }
}
