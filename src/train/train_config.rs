use std::sync::{Arc, atomic::AtomicBool};

use crate::error::{Error, Result};

/// Configuration for a `fit` run.
///
/// # Fields
/// - `epochs`      : total number of full-batch passes over the training data
/// - `log_interval`: an info line is logged every `log_interval` epochs, plus
///                    the first and the last one
/// - `stop_flag`   : optional atomic flag; when set to `true` from another
///                    thread the loop terminates before the next epoch.
#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub epochs: usize,
    pub log_interval: usize,
    pub stop_flag: Option<Arc<AtomicBool>>,
}

impl TrainConfig {
    /// Creates a `TrainConfig` that logs every 100 epochs and has no stop flag.
    pub fn new(epochs: usize) -> Self {
        TrainConfig {
            epochs,
            log_interval: 100,
            stop_flag: None,
        }
    }

    pub fn with_log_interval(mut self, log_interval: usize) -> Self {
        self.log_interval = log_interval;
        self
    }

    pub fn with_stop_flag(mut self, stop_flag: Arc<AtomicBool>) -> Self {
        self.stop_flag = Some(stop_flag);
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(Error::value("TrainConfig", "epochs must be at least 1"));
        }
        if self.log_interval == 0 {
            return Err(Error::value("TrainConfig", "log_interval must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_epochs_or_interval_is_rejected() {
        assert!(TrainConfig::new(10).validate().is_ok());
        assert!(TrainConfig::new(0).validate().is_err());
        assert!(TrainConfig::new(10).with_log_interval(0).validate().is_err());
    }
}
