use crate::error::Result;
use crate::layers::layer::{Layer, LayerInfo};
use crate::math::matrix::Matrix;
use crate::params::store::{ParamId, ParamStore};

/// Ordered container of layers, itself a layer.
///
/// Forward runs the children first to last, backward last to first. An empty
/// container is the identity.
#[derive(Debug, Default)]
pub struct Sequential {
    layers: Vec<Box<dyn Layer>>,
}

impl Sequential {
    pub fn new() -> Sequential {
        Sequential { layers: Vec::new() }
    }

    pub fn from_layers(layers: Vec<Box<dyn Layer>>) -> Sequential {
        Sequential { layers }
    }

    /// Appends a layer. Parameters of the new layer show up in `param_ids`
    /// as soon as it is built.
    pub fn add<L: Layer + 'static>(&mut self, layer: L) -> &mut Self {
        self.layers.push(Box::new(layer));
        self
    }

    /// Builder-style [`add`](Self::add).
    pub fn with<L: Layer + 'static>(mut self, layer: L) -> Self {
        self.add(layer);
        self
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn layers(&self) -> &[Box<dyn Layer>] {
        &self.layers
    }
}

impl Layer for Sequential {
    fn forward(&mut self, input: &Matrix, params: &mut ParamStore) -> Result<Matrix> {
        let mut current = input.clone();
        for layer in &mut self.layers {
            current = layer.forward(&current, params)?;
        }
        Ok(current)
    }

    fn backward(&mut self, output_grad: &Matrix, params: &mut ParamStore) -> Result<Matrix> {
        let mut grad = output_grad.clone();
        for layer in self.layers.iter_mut().rev() {
            grad = layer.backward(&grad, params)?;
        }
        Ok(grad)
    }

    fn param_ids(&self) -> Vec<ParamId> {
        self.layers.iter().flat_map(|layer| layer.param_ids()).collect()
    }

    fn layer_type(&self) -> &'static str {
        "sequential"
    }

    fn units(&self) -> Option<usize> {
        self.layers.last().and_then(|layer| layer.units())
    }

    fn describe(&self, params: &ParamStore, out: &mut Vec<LayerInfo>) {
        for layer in &self.layers {
            layer.describe(params, out);
        }
    }
}
