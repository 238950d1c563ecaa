use crate::activation::activation::ActivationFunction;
use crate::error::{ensure_shape, Error, Result};
use crate::math::linalg::{matmul, sum_axis, transpose, Axis};
use crate::math::matrix::Matrix;
use crate::params::store::{ParamId, ParamStore};

/// The closed set of differentiable functions a layer is built from.
///
/// `WeightMultiply` and `AddBias` own a trainable table (by id); activations
/// are stateless.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    /// `output = input . W`
    WeightMultiply(ParamId),
    /// `output = input + b` with `b` a `1 x cols` row.
    AddBias(ParamId),
    Activation(ActivationFunction),
}

/// One node of the graph: a function plus the tensors cached by its last
/// forward call.
///
/// `forward` overwrites the cache. `backward` checks the incoming gradient
/// against the cached output and the produced gradient against the cached
/// input, so every op boundary is shape-verified.
#[derive(Debug, Clone)]
pub struct Operation {
    kind: OpKind,
    input: Option<Matrix>,
    output: Option<Matrix>,
    input_grad: Option<Matrix>,
}

impl Operation {
    pub fn new(kind: OpKind) -> Operation {
        Operation { kind, input: None, output: None, input_grad: None }
    }

    pub fn weight_multiply(weights: ParamId) -> Operation {
        Operation::new(OpKind::WeightMultiply(weights))
    }

    /// Fails unless the bias table is a single row.
    pub fn add_bias(bias: ParamId, params: &ParamStore) -> Result<Operation> {
        let rows = params.value(bias)?.rows();
        if rows != 1 {
            return Err(Error::value("Operation::add_bias", format!("bias must have 1 row, got {rows}")));
        }
        Ok(Operation::new(OpKind::AddBias(bias)))
    }

    pub fn activation(function: ActivationFunction) -> Operation {
        Operation::new(OpKind::Activation(function))
    }

    pub fn kind(&self) -> OpKind {
        self.kind
    }

    /// The trainable table this op owns, if any.
    pub fn param(&self) -> Option<ParamId> {
        match self.kind {
            OpKind::WeightMultiply(id) | OpKind::AddBias(id) => Some(id),
            OpKind::Activation(_) => None,
        }
    }

    pub fn output(&self) -> Option<&Matrix> {
        self.output.as_ref()
    }

    pub fn input_grad(&self) -> Option<&Matrix> {
        self.input_grad.as_ref()
    }

    pub fn forward(&mut self, input: &Matrix, params: &ParamStore) -> Result<Matrix> {
        let output = match self.kind {
            OpKind::WeightMultiply(id) => matmul(input, params.value(id)?)?,
            OpKind::AddBias(id) => input.add_row(params.value(id)?)?,
            OpKind::Activation(function) => function.forward(input),
        };

        self.input = Some(input.clone());
        self.output = Some(output.clone());
        self.input_grad = None;
        Ok(output)
    }

    /// Back-propagates `output_grad`. Parameter ops also store their
    /// parameter gradient in `params`.
    pub fn backward(&mut self, output_grad: &Matrix, params: &mut ParamStore) -> Result<Matrix> {
        let (input, output) = match (&self.input, &self.output) {
            (Some(input), Some(output)) => (input, output),
            _ => return Err(Error::value("Operation::backward", "backward called before forward")),
        };
        ensure_shape("Operation::backward (output grad)", output.shape(), output_grad.shape())?;

        let grad = input_grad(self.kind, input, output, output_grad, params)?;
        ensure_shape("Operation::backward (input grad)", input.shape(), grad.shape())?;

        let pending = match self.param() {
            Some(id) => {
                let param_grad = param_grad(self.kind, input, output_grad)?;
                ensure_shape("Operation::backward (param grad)", params.value(id)?.shape(), param_grad.shape())?;
                Some((id, param_grad))
            }
            None => None,
        };

        // Nothing is written until both gradients are known to be valid.
        if let Some((id, param_grad)) = pending {
            params.set_grad(id, param_grad)?;
        }
        self.input_grad = Some(grad.clone());
        Ok(grad)
    }
}

fn input_grad(
    kind: OpKind,
    input: &Matrix,
    output: &Matrix,
    output_grad: &Matrix,
    params: &ParamStore,
) -> Result<Matrix> {
    match kind {
        OpKind::WeightMultiply(id) => matmul(output_grad, &transpose(params.value(id)?)),
        OpKind::AddBias(_) => Ok(output_grad.clone()),
        OpKind::Activation(function) => function.input_grad(input, output, output_grad),
    }
}

fn param_grad(kind: OpKind, input: &Matrix, output_grad: &Matrix) -> Result<Matrix> {
    match kind {
        OpKind::WeightMultiply(_) => matmul(&transpose(input), output_grad),
        OpKind::AddBias(_) => Ok(sum_axis(output_grad, Axis::Rows)),
        OpKind::Activation(_) => Err(Error::value("Operation::backward", "activation has no parameter")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(rows: Vec<Vec<f64>>) -> Matrix {
        Matrix::from_data(rows).unwrap()
    }

    #[test]
    fn weight_multiply_forward_and_gradients() {
        let mut params = ParamStore::with_seed(0);
        let w = params.insert(m(vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]]));
        let mut op = Operation::weight_multiply(w);

        let x = m(vec![vec![1.0, 0.0, -1.0]]);
        let y = op.forward(&x, &params).unwrap();
        assert_eq!(y.as_slice(), &[-4.0, -4.0]);

        let up = m(vec![vec![1.0, 2.0]]);
        let dx = op.backward(&up, &mut params).unwrap();
        // up . W^T
        assert_eq!(dx.as_slice(), &[5.0, 11.0, 17.0]);
        // x^T . up
        assert_eq!(params.grad(w).unwrap().as_slice(), &[1.0, 2.0, 0.0, 0.0, -1.0, -2.0]);
    }

    #[test]
    fn add_bias_sums_gradient_over_rows() {
        let mut params = ParamStore::with_seed(0);
        let b = params.insert(m(vec![vec![0.5, -0.5]]));
        let mut op = Operation::add_bias(b, &params).unwrap();

        let x = m(vec![vec![1.0, 1.0], vec![2.0, 2.0], vec![3.0, 3.0]]);
        let y = op.forward(&x, &params).unwrap();
        assert_eq!(y.as_slice(), &[1.5, 0.5, 2.5, 1.5, 3.5, 2.5]);

        let up = m(vec![vec![1.0, 0.0], vec![1.0, 1.0], vec![1.0, 2.0]]);
        let dx = op.backward(&up, &mut params).unwrap();
        assert_eq!(dx, up);
        assert_eq!(params.grad(b).unwrap().as_slice(), &[3.0, 3.0]);
    }

    #[test]
    fn add_bias_rejects_multi_row_bias() {
        let mut params = ParamStore::with_seed(0);
        let b = params.insert_zeros(2, 2).unwrap();
        assert!(matches!(Operation::add_bias(b, &params), Err(Error::Value { .. })));
    }

    #[test]
    fn backward_before_forward_is_a_value_error() {
        let mut params = ParamStore::with_seed(0);
        let mut op = Operation::activation(ActivationFunction::Sigmoid);
        let up = m(vec![vec![1.0]]);
        assert!(matches!(op.backward(&up, &mut params), Err(Error::Value { .. })));
    }

    #[test]
    fn backward_checks_upstream_shape() {
        let mut params = ParamStore::with_seed(0);
        let mut op = Operation::activation(ActivationFunction::Tanh);
        op.forward(&m(vec![vec![1.0, 2.0]]), &params).unwrap();
        let wrong = m(vec![vec![1.0], vec![2.0]]);
        assert!(matches!(op.backward(&wrong, &mut params), Err(Error::ShapeMismatch { .. })));
    }

    #[test]
    fn forward_overwrites_the_cache() {
        let params = ParamStore::with_seed(0);
        let mut op = Operation::activation(ActivationFunction::Linear);
        op.forward(&m(vec![vec![1.0]]), &params).unwrap();
        op.forward(&m(vec![vec![1.0, 2.0]]), &params).unwrap();
        assert_eq!(op.output().unwrap().shape(), (1, 2));
        assert!(op.input_grad().is_none());
        assert_eq!(op.param(), None);
    }

    #[test]
    fn failed_backward_leaves_gradients_untouched() {
        let mut params = ParamStore::with_seed(0);
        let w = params.insert(Matrix::ones(3, 2).unwrap());
        let mut op = Operation::weight_multiply(w);
        op.forward(&m(vec![vec![1.0, 2.0, 3.0]]), &params).unwrap();

        // Same id, but the table it resolves to no longer fits the cached input.
        let mut other = ParamStore::with_seed(0);
        let w_other = other.insert(Matrix::ones(3, 5).unwrap());
        assert_eq!(w_other, w);

        let up = m(vec![vec![1.0, 1.0]]);
        assert!(op.backward(&up, &mut other).is_err());
        assert_eq!(other.grad(w).unwrap().sum(), 0.0);
        assert!(op.input_grad().is_none());

        op.backward(&up, &mut params).unwrap();
        assert_eq!(params.grad(w).unwrap().shape(), (3, 2));
        assert!(op.input_grad().is_some());
    }
}
