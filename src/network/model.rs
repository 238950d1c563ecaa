use log::debug;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::layers::layer::{Layer, LayerInfo};
use crate::loss::loss::Loss;
use crate::math::matrix::Matrix;
use crate::network::summary::ModelSummary;
use crate::optim::optimizer::Optimizer;
use crate::params::store::{ParamId, ParamStore};
use crate::train::callbacks::Callback;
use crate::train::loop_fn::{self, FitReport};
use crate::train::train_config::TrainConfig;

/// Read-only copy of one parameter table, for visualisation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamSnapshot {
    pub id: ParamId,
    pub rows: usize,
    pub cols: usize,
    pub values: Vec<f64>,
}

/// Top-level trainable object: one root layer, the parameter arena it
/// allocates into, and (once compiled) a loss and an optimizer.
#[derive(Debug)]
pub struct Model {
    name: String,
    network: Box<dyn Layer>,
    params: ParamStore,
    loss: Option<Loss>,
    optimizer: Option<Box<dyn Optimizer>>,
}

impl Model {
    /// Model whose weights are initialised from system entropy.
    pub fn new<L: Layer + 'static>(network: L) -> Model {
        Model::with_store(Box::new(network), ParamStore::new())
    }

    /// Model with deterministic weight initialisation.
    pub fn with_seed<L: Layer + 'static>(network: L, seed: u64) -> Model {
        Model::with_store(Box::new(network), ParamStore::with_seed(seed))
    }

    pub fn with_store(network: Box<dyn Layer>, params: ParamStore) -> Model {
        Model { name: "model".to_string(), network, params, loss: None, optimizer: None }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Model {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Binds a loss and an optimizer. Must be called before training.
    pub fn compile(&mut self, loss: Loss, mut optimizer: Box<dyn Optimizer>) {
        let ids = self.network.param_ids();
        debug!(
            "compiling model '{}': loss={}, optimizer={}, {} parameter tables",
            self.name,
            loss.kind().name(),
            optimizer.name(),
            ids.len()
        );
        optimizer.setup(ids);
        self.loss = Some(loss);
        self.optimizer = Some(optimizer);
    }

    pub fn is_compiled(&self) -> bool {
        self.loss.is_some() && self.optimizer.is_some()
    }

    pub fn loss(&self) -> Option<&Loss> {
        self.loss.as_ref()
    }

    pub fn optimizer(&self) -> Option<&dyn Optimizer> {
        self.optimizer.as_deref()
    }

    pub fn network(&self) -> &dyn Layer {
        self.network.as_ref()
    }

    pub fn params(&self) -> &ParamStore {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut ParamStore {
        &mut self.params
    }

    pub fn forward(&mut self, input: &Matrix) -> Result<Matrix> {
        self.network.forward(input, &mut self.params)
    }

    pub fn backward(&mut self, output_grad: &Matrix) -> Result<Matrix> {
        self.network.backward(output_grad, &mut self.params)
    }

    /// Forward pass only; parameters are never updated. The first call may
    /// still allocate parameters of lazily built layers.
    pub fn predict(&mut self, input: &Matrix) -> Result<Matrix> {
        self.forward(input)
    }

    /// Loss of the current parameters on `(inputs, targets)` without any
    /// update.
    pub fn evaluate(&mut self, inputs: &Matrix, targets: &Matrix) -> Result<f64> {
        let kind = self.loss.as_ref()
            .map(Loss::kind)
            .ok_or_else(|| Error::value("Model::evaluate", "compile the model before evaluating"))?;
        let predictions = self.forward(inputs)?;
        kind.value(&predictions, targets)
    }

    /// One forward/backward/update cycle on a batch. Returns the loss computed
    /// before the update.
    pub fn train_step(&mut self, x_batch: &Matrix, y_batch: &Matrix) -> Result<f64> {
        let (loss, optimizer) = match (self.loss.as_mut(), self.optimizer.as_mut()) {
            (Some(loss), Some(optimizer)) => (loss, optimizer),
            _ => return Err(Error::value("Model::train_step", "compile the model before training")),
        };

        let predictions = self.network.forward(x_batch, &mut self.params)?;
        let value = loss.forward(&predictions, y_batch)?;
        let grad = loss.backward()?;
        self.network.backward(&grad, &mut self.params)?;

        // Re-collect every step: layers may have been built or added since
        // the last one.
        optimizer.setup(self.network.param_ids());
        optimizer.step(&mut self.params)?;
        Ok(value)
    }

    /// Runs the epoch loop; see [`loop_fn::fit`].
    pub fn fit(
        &mut self,
        x_train: &Matrix,
        y_train: &Matrix,
        validation: Option<(&Matrix, &Matrix)>,
        config: &TrainConfig,
        callbacks: &mut [&mut dyn Callback],
    ) -> Result<FitReport> {
        loop_fn::fit(self, x_train, y_train, validation, config, callbacks)
    }

    pub fn param_ids(&self) -> Vec<ParamId> {
        self.network.param_ids()
    }

    /// Live parameter tables in execution order.
    pub fn get_parameters(&self) -> Result<Vec<&Matrix>> {
        self.network.param_ids().into_iter().map(|id| self.params.value(id)).collect()
    }

    /// Gradients from the last backward pass, aligned with `get_parameters`.
    pub fn get_gradients(&self) -> Result<Vec<&Matrix>> {
        self.network.param_ids().into_iter().map(|id| self.params.grad(id)).collect()
    }

    pub fn snapshot(&self) -> Result<Vec<ParamSnapshot>> {
        self.network
            .param_ids()
            .into_iter()
            .map(|id| {
                let value = self.params.value(id)?;
                Ok(ParamSnapshot {
                    id,
                    rows: value.rows(),
                    cols: value.cols(),
                    values: value.as_slice().to_vec(),
                })
            })
            .collect()
    }

    /// `snapshot` encoded as JSON.
    pub fn snapshot_json(&self) -> std::io::Result<String> {
        let snapshot = self.snapshot()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        serde_json::to_string(&snapshot)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
    }

    pub fn summary(&self) -> ModelSummary {
        let mut layers: Vec<LayerInfo> = Vec::new();
        self.network.describe(&self.params, &mut layers);
        ModelSummary::new(
            self.name.clone(),
            layers,
            self.loss.as_ref().map(|loss| loss.kind().name().to_string()),
            self.optimizer.as_ref().map(|opt| opt.name().to_string()),
        )
    }
}
