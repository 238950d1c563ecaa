use std::fmt;

use serde::Serialize;

use crate::layers::layer::LayerInfo;

const RULE_WIDTH: usize = 65;

/// Row of a [`ModelSummary`]: layers are named `<type>_<n>` in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryRow {
    pub name: String,
    pub layer_type: String,
    pub units: Option<usize>,
    pub params: usize,
}

/// Keras-style overview of a model: one row per leaf layer plus totals.
///
/// Printable through `Display` and serialisable for front ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelSummary {
    pub name: String,
    pub layers: Vec<SummaryRow>,
    pub total_params: usize,
    pub loss: Option<String>,
    pub optimizer: Option<String>,
}

impl ModelSummary {
    pub fn new(
        name: String,
        layers: Vec<LayerInfo>,
        loss: Option<String>,
        optimizer: Option<String>,
    ) -> ModelSummary {
        let total_params = layers.iter().map(|info| info.params).sum();
        let layers = layers
            .into_iter()
            .enumerate()
            .map(|(i, info)| SummaryRow {
                name: format!("{}_{}", info.layer_type, i + 1),
                layer_type: info.layer_type,
                units: info.units,
                params: info.params,
            })
            .collect();
        ModelSummary { name, layers, total_params, loss, optimizer }
    }
}

impl fmt::Display for ModelSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let thin = "_".repeat(RULE_WIDTH);
        let thick = "=".repeat(RULE_WIDTH);

        writeln!(f, "Model: \"{}\"", self.name)?;
        writeln!(f, "{thin}")?;
        writeln!(f, "{:<28}{:<25}{}", "Layer (type)", "Output Shape", "Param #")?;
        writeln!(f, "{thick}")?;
        for (i, row) in self.layers.iter().enumerate() {
            let label = format!("{} ({})", row.name, row.layer_type);
            let shape = match row.units {
                Some(units) => format!("(None, {units})"),
                None => "(None, ?)".to_string(),
            };
            writeln!(f, "{label:<28}{shape:<25}{}", row.params)?;
            if i + 1 < self.layers.len() {
                writeln!(f, "{thin}")?;
            }
        }
        writeln!(f, "{thick}")?;
        writeln!(f, "Total params: {}", self.total_params)?;
        writeln!(f, "Trainable params: {}", self.total_params)?;
        writeln!(f, "Non-trainable params: 0")?;
        if let Some(loss) = &self.loss {
            writeln!(f, "Loss: {loss}")?;
        }
        if let Some(optimizer) = &self.optimizer {
            writeln!(f, "Optimizer: {optimizer}")?;
        }
        write!(f, "{thin}")
    }
}
