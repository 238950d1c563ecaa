use serde::{Serialize, Deserialize};

/// Per-epoch training statistics handed to every callback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochStats {
    /// 1-based epoch number.
    pub epoch: usize,
    /// Total epochs requested for this run.
    pub total_epochs: usize,
    /// Loss on the training batch, measured before this epoch's update.
    pub train_loss: f64,
    /// Loss on the validation set after the update. Equal to `train_loss`
    /// when no validation set was given.
    pub val_loss: f64,
    pub has_validation: bool,
    /// Wall-clock duration of this single epoch in milliseconds.
    pub elapsed_ms: u64,
}
