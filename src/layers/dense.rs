use log::debug;

use crate::activation::activation::ActivationFunction;
use crate::error::{ensure_shape, Error, Result};
use crate::layers::layer::Layer;
use crate::math::matrix::Matrix;
use crate::ops::operation::Operation;
use crate::params::store::{ParamId, ParamStore};

/// A Dense layer is either waiting for its first input or fully built.
#[derive(Debug)]
enum DenseState {
    Uninitialized,
    Built {
        weights: ParamId,
        bias: ParamId,
        ops: Vec<Operation>,
    },
}

/// Fully connected layer: `activation(input . W + b)`.
///
/// The fan-in is not known until the first batch arrives, so `W`
/// (`fan_in x neurons`, Xavier) and `b` (`1 x neurons`, zeros) are allocated
/// on the first forward call. Later calls reuse the same operation chain.
#[derive(Debug)]
pub struct Dense {
    neurons: usize,
    activation: ActivationFunction,
    state: DenseState,
    output: Option<Matrix>,
}

impl Dense {
    pub fn new(neurons: usize, activation: ActivationFunction) -> Dense {
        Dense { neurons, activation, state: DenseState::Uninitialized, output: None }
    }

    pub fn neurons(&self) -> usize {
        self.neurons
    }

    pub fn activation(&self) -> ActivationFunction {
        self.activation
    }

    pub fn is_built(&self) -> bool {
        matches!(self.state, DenseState::Built { .. })
    }

    pub fn weights(&self) -> Option<ParamId> {
        match self.state {
            DenseState::Built { weights, .. } => Some(weights),
            DenseState::Uninitialized => None,
        }
    }

    pub fn bias(&self) -> Option<ParamId> {
        match self.state {
            DenseState::Built { bias, .. } => Some(bias),
            DenseState::Uninitialized => None,
        }
    }

    fn build(&mut self, input: &Matrix, params: &mut ParamStore) -> Result<()> {
        let fan_in = input.cols();
        let weights = params.insert_xavier(fan_in, self.neurons)?;
        let bias = params.insert_zeros(1, self.neurons)?;
        let ops = vec![
            Operation::weight_multiply(weights),
            Operation::add_bias(bias, params)?,
            Operation::activation(self.activation),
        ];

        debug!("dense layer built: {fan_in} -> {} ({})", self.neurons, self.activation.name());
        self.state = DenseState::Built { weights, bias, ops };
        Ok(())
    }
}

impl Layer for Dense {
    fn forward(&mut self, input: &Matrix, params: &mut ParamStore) -> Result<Matrix> {
        if !self.is_built() {
            self.build(input, params)?;
        }

        let ops = match &mut self.state {
            DenseState::Built { ops, .. } => ops,
            DenseState::Uninitialized => return Err(Error::value("Dense::forward", "layer was not built")),
        };

        let mut current = input.clone();
        for op in ops.iter_mut() {
            current = op.forward(&current, params)?;
        }

        self.output = Some(current.clone());
        Ok(current)
    }

    fn backward(&mut self, output_grad: &Matrix, params: &mut ParamStore) -> Result<Matrix> {
        let output = self.output.as_ref()
            .ok_or_else(|| Error::value("Dense::backward", "backward called before forward"))?;
        ensure_shape("Dense::backward", output.shape(), output_grad.shape())?;

        let ops = match &mut self.state {
            DenseState::Built { ops, .. } => ops,
            DenseState::Uninitialized => return Err(Error::value("Dense::backward", "layer was not built")),
        };

        let mut grad = output_grad.clone();
        for op in ops.iter_mut().rev() {
            grad = op.backward(&grad, params)?;
        }
        Ok(grad)
    }

    fn param_ids(&self) -> Vec<ParamId> {
        match self.state {
            DenseState::Built { weights, bias, .. } => vec![weights, bias],
            DenseState::Uninitialized => Vec::new(),
        }
    }

    fn layer_type(&self) -> &'static str {
        "dense"
    }

    /// Unknown until the first forward pass has built the layer.
    fn units(&self) -> Option<usize> {
        self.is_built().then_some(self.neurons)
    }
}
