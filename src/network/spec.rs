use serde::{Deserialize, Serialize};

use crate::activation::activation::ActivationFunction;
use crate::error::{Error, Result};
use crate::layers::dense::Dense;
use crate::layers::sequential::Sequential;
use crate::loss::loss::Loss;
use crate::loss::loss_type::LossType;
use crate::network::model::Model;
use crate::optim::optimizer::OptimizerSpec;
use crate::params::store::ParamStore;

/// One dense layer in a network description. The fan-in is not stored: it is
/// inferred from the first batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSpec {
    pub neurons: usize,
    pub activation: ActivationFunction,
}

/// A fully serialisable description of a dense stack plus its loss and
/// optimizer.
///
/// ```json
/// {
///   "name": "xor",
///   "layers": [
///     { "neurons": 4, "activation": "Tanh" },
///     { "neurons": 1, "activation": "Sigmoid" }
///   ],
///   "loss": "mse",
///   "optimizer": { "type": "adam", "learning_rate": 0.05 },
///   "seed": 7
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSpec {
    pub name: String,
    pub layers: Vec<LayerSpec>,
    pub loss: LossType,
    pub optimizer: OptimizerSpec,
    /// Weight initialisation seed; system entropy when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl NetworkSpec {
    /// Builds a compiled [`Model`]. Parameters are allocated on the first
    /// forward pass.
    pub fn build(&self) -> Result<Model> {
        if self.layers.is_empty() {
            return Err(Error::value("NetworkSpec::build", "a network needs at least one layer"));
        }
        let mut network = Sequential::new();
        for (i, layer) in self.layers.iter().enumerate() {
            if layer.neurons == 0 {
                return Err(Error::value(
                    "NetworkSpec::build",
                    format!("layer {} must have at least one neuron", i + 1),
                ));
            }
            network.add(Dense::new(layer.neurons, layer.activation));
        }

        let params = match self.seed {
            Some(seed) => ParamStore::with_seed(seed),
            None => ParamStore::new(),
        };
        let optimizer = self.optimizer.build()?;
        let mut model = Model::with_store(Box::new(network), params).with_name(self.name.clone());
        model.compile(Loss::new(self.loss), optimizer);
        Ok(model)
    }

    pub fn to_json(&self) -> std::io::Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
    }

    pub fn from_json(json: &str) -> std::io::Result<NetworkSpec> {
        serde_json::from_str(json)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Serializes the spec to a pretty-printed JSON file.
    pub fn save_json(&self, path: &str) -> std::io::Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
    }

    pub fn load_json(path: &str) -> std::io::Result<NetworkSpec> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        serde_json::from_reader(reader)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}
