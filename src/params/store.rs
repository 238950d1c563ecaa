use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::{ensure_shape, Error, Result};
use crate::math::matrix::Matrix;

/// Stable handle to one trainable table inside a [`ParamStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParamId(usize);

impl ParamId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
struct ParamSlot {
    value: Matrix,
    grad: Matrix,
}

/// Arena owning every trainable table of a network together with its
/// gradient.
///
/// Operations and layers refer to slots by [`ParamId`]; the optimizer mutates
/// values through the same ids. A slot's gradient always has the shape of its
/// value. The store also owns the random generator used to initialise new
/// weights, so seeding the store makes a whole network deterministic.
#[derive(Debug, Clone)]
pub struct ParamStore {
    slots: Vec<ParamSlot>,
    rng: StdRng,
}

impl ParamStore {
    /// Store whose initialiser is seeded from system entropy.
    pub fn new() -> ParamStore {
        ParamStore { slots: Vec::new(), rng: StdRng::from_entropy() }
    }

    /// Store with a deterministic initialiser.
    pub fn with_seed(seed: u64) -> ParamStore {
        ParamStore { slots: Vec::new(), rng: StdRng::seed_from_u64(seed) }
    }

    /// Adds a parameter table with a zeroed gradient.
    pub fn insert(&mut self, value: Matrix) -> ParamId {
        let grad = value.zeros_like();
        self.slots.push(ParamSlot { value, grad });
        ParamId(self.slots.len() - 1)
    }

    /// Adds a Xavier-initialised `fan_in x fan_out` table.
    pub fn insert_xavier(&mut self, fan_in: usize, fan_out: usize) -> Result<ParamId> {
        let value = Matrix::xavier(fan_in, fan_out, &mut self.rng)?;
        Ok(self.insert(value))
    }

    pub fn insert_zeros(&mut self, rows: usize, cols: usize) -> Result<ParamId> {
        let value = Matrix::zeros(rows, cols)?;
        Ok(self.insert(value))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn value(&self, id: ParamId) -> Result<&Matrix> {
        Ok(&self.slot(id)?.value)
    }

    pub fn grad(&self, id: ParamId) -> Result<&Matrix> {
        Ok(&self.slot(id)?.grad)
    }

    /// Overwrites a parameter's value. The new value must keep the shape.
    pub fn set_value(&mut self, id: ParamId, value: Matrix) -> Result<()> {
        let slot = self.slot_mut(id)?;
        ensure_shape("ParamStore::set_value", slot.value.shape(), value.shape())?;
        slot.value = value;
        Ok(())
    }

    /// Records a freshly computed gradient. The gradient must match the
    /// parameter's shape.
    pub fn set_grad(&mut self, id: ParamId, grad: Matrix) -> Result<()> {
        let slot = self.slot_mut(id)?;
        ensure_shape("ParamStore::set_grad", slot.value.shape(), grad.shape())?;
        slot.grad = grad;
        Ok(())
    }

    /// Mutable value together with its current gradient.
    pub fn value_and_grad_mut(&mut self, id: ParamId) -> Result<(&mut Matrix, &Matrix)> {
        let slot = self.slot_mut(id)?;
        Ok((&mut slot.value, &slot.grad))
    }

    /// Every id in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = ParamId> + '_ {
        (0..self.slots.len()).map(ParamId)
    }

    fn slot(&self, id: ParamId) -> Result<&ParamSlot> {
        let len = self.slots.len();
        self.slots.get(id.0).ok_or(Error::Index { axis: "parameter", index: id.0, len })
    }

    fn slot_mut(&mut self, id: ParamId) -> Result<&mut ParamSlot> {
        let len = self.slots.len();
        self.slots.get_mut(id.0).ok_or(Error::Index { axis: "parameter", index: id.0, len })
    }
}

impl Default for ParamStore {
    fn default() -> Self {
        ParamStore::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gradients_start_zeroed_with_the_parameter_shape() {
        let mut store = ParamStore::with_seed(1);
        let id = store.insert_xavier(3, 4).unwrap();
        assert_eq!(store.value(id).unwrap().shape(), (3, 4));
        assert_eq!(store.grad(id).unwrap().shape(), (3, 4));
        assert_eq!(store.grad(id).unwrap().sum(), 0.0);
    }

    #[test]
    fn gradient_shape_must_match_parameter() {
        let mut store = ParamStore::with_seed(1);
        let id = store.insert_zeros(1, 4).unwrap();
        let bad = Matrix::zeros(4, 1).unwrap();
        assert!(matches!(store.set_grad(id, bad), Err(Error::ShapeMismatch { .. })));
        assert!(store.set_grad(id, Matrix::ones(1, 4).unwrap()).is_ok());
        assert_eq!(store.grad(id).unwrap().sum(), 4.0);
    }

    #[test]
    fn unknown_ids_are_index_errors() {
        let store = ParamStore::with_seed(1);
        let mut other = ParamStore::with_seed(1);
        let id = other.insert_zeros(1, 1).unwrap();
        assert!(matches!(store.value(id), Err(Error::Index { .. })));
    }

    #[test]
    fn same_seed_gives_same_weights() {
        let mut a = ParamStore::with_seed(42);
        let mut b = ParamStore::with_seed(42);
        let ia = a.insert_xavier(5, 2).unwrap();
        let ib = b.insert_xavier(5, 2).unwrap();
        assert_eq!(a.value(ia).unwrap(), b.value(ib).unwrap());
        assert_eq!(ia, ib);
    }
}
