use std::sync::mpsc;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::train::epoch_stats::EpochStats;

/// What the fit loop should do after an epoch-end callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    Continue,
    Stop,
}

/// Hooks into the fit loop. Every registered callback sees every epoch; the
/// loop stops after the epoch if any of them returns [`CallbackAction::Stop`].
pub trait Callback {
    fn on_train_begin(&mut self) {}

    fn on_epoch_end(&mut self, stats: &EpochStats) -> CallbackAction;

    fn on_train_end(&mut self) {}
}

/// Loss watched by [`EarlyStopping`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Monitor {
    Train,
    Validation,
}

/// Stops training once the monitored loss has not improved by more than
/// `min_delta` for `patience` consecutive epochs.
#[derive(Debug, Clone)]
pub struct EarlyStopping {
    monitor: Monitor,
    patience: usize,
    min_delta: f64,
    best_loss: f64,
    wait: usize,
    stopped_epoch: Option<usize>,
    warned: bool,
}

impl EarlyStopping {
    pub fn new(monitor: Monitor, patience: usize, min_delta: f64) -> Result<EarlyStopping> {
        if !(min_delta.is_finite() && min_delta >= 0.0) {
            return Err(Error::value(
                "EarlyStopping",
                format!("min_delta must be finite and non-negative, got {min_delta}"),
            ));
        }
        Ok(EarlyStopping {
            monitor,
            patience,
            min_delta,
            best_loss: f64::INFINITY,
            wait: 0,
            stopped_epoch: None,
            warned: false,
        })
    }

    pub fn monitor(&self) -> Monitor {
        self.monitor
    }

    pub fn patience(&self) -> usize {
        self.patience
    }

    pub fn best_loss(&self) -> f64 {
        self.best_loss
    }

    /// Consecutive epochs without improvement.
    pub fn wait(&self) -> usize {
        self.wait
    }

    /// Epoch at which the stop was signalled, if it was.
    pub fn stopped_epoch(&self) -> Option<usize> {
        self.stopped_epoch
    }
}

impl Callback for EarlyStopping {
    fn on_train_begin(&mut self) {
        self.best_loss = f64::INFINITY;
        self.wait = 0;
        self.stopped_epoch = None;
        self.warned = false;
    }

    fn on_epoch_end(&mut self, stats: &EpochStats) -> CallbackAction {
        let current = match self.monitor {
            Monitor::Train => stats.train_loss,
            Monitor::Validation => {
                if !stats.has_validation && !self.warned {
                    warn!("early stopping monitors validation loss but no validation set was given; using training loss");
                    self.warned = true;
                }
                stats.val_loss
            }
        };

        if current < self.best_loss - self.min_delta {
            self.best_loss = current;
            self.wait = 0;
            return CallbackAction::Continue;
        }

        self.wait += 1;
        if self.wait >= self.patience {
            self.stopped_epoch = Some(stats.epoch);
            info!(
                "early stopping at epoch {}: no improvement for {} epochs (best loss {:.6})",
                stats.epoch, self.wait, self.best_loss
            );
            return CallbackAction::Stop;
        }
        CallbackAction::Continue
    }
}

/// Records every epoch's statistics.
#[derive(Debug, Clone, Default)]
pub struct History {
    epochs: Vec<EpochStats>,
}

impl History {
    pub fn new() -> History {
        History::default()
    }

    pub fn epochs(&self) -> &[EpochStats] {
        &self.epochs
    }

    pub fn train_losses(&self) -> Vec<f64> {
        self.epochs.iter().map(|s| s.train_loss).collect()
    }

    pub fn val_losses(&self) -> Vec<f64> {
        self.epochs.iter().map(|s| s.val_loss).collect()
    }
}

impl Callback for History {
    fn on_train_begin(&mut self) {
        self.epochs.clear();
    }

    fn on_epoch_end(&mut self, stats: &EpochStats) -> CallbackAction {
        self.epochs.push(stats.clone());
        CallbackAction::Continue
    }
}

/// Forwards each epoch's statistics over a channel. Training stops once the
/// receiver has been dropped.
#[derive(Debug)]
pub struct ProgressSender {
    tx: mpsc::Sender<EpochStats>,
}

impl ProgressSender {
    pub fn new(tx: mpsc::Sender<EpochStats>) -> ProgressSender {
        ProgressSender { tx }
    }
}

impl Callback for ProgressSender {
    fn on_epoch_end(&mut self, stats: &EpochStats) -> CallbackAction {
        if self.tx.send(stats.clone()).is_err() {
            return CallbackAction::Stop;
        }
        CallbackAction::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(epoch: usize, train_loss: f64) -> EpochStats {
        EpochStats {
            epoch,
            total_epochs: 100,
            train_loss,
            val_loss: train_loss,
            has_validation: false,
            elapsed_ms: 0,
        }
    }

    #[test]
    fn stops_after_patience_non_improving_epochs() {
        let mut es = EarlyStopping::new(Monitor::Train, 3, 0.0).unwrap();
        es.on_train_begin();
        assert_eq!(es.on_epoch_end(&stats(1, 1.0)), CallbackAction::Continue);
        assert_eq!(es.on_epoch_end(&stats(2, 1.0)), CallbackAction::Continue);
        assert_eq!(es.on_epoch_end(&stats(3, 1.5)), CallbackAction::Continue);
        assert_eq!(es.wait(), 2);
        assert_eq!(es.on_epoch_end(&stats(4, 1.2)), CallbackAction::Stop);
        assert_eq!(es.stopped_epoch(), Some(4));
        assert_eq!(es.best_loss(), 1.0);
    }

    #[test]
    fn improvements_smaller_than_min_delta_do_not_count() {
        let mut es = EarlyStopping::new(Monitor::Validation, 2, 0.1).unwrap();
        es.on_train_begin();
        es.on_epoch_end(&stats(1, 1.0));
        assert_eq!(es.on_epoch_end(&stats(2, 0.95)), CallbackAction::Continue);
        assert_eq!(es.wait(), 1);
        assert_eq!(es.on_epoch_end(&stats(3, 0.5)), CallbackAction::Continue);
        assert_eq!(es.wait(), 0);
        assert_eq!(es.best_loss(), 0.5);
    }

    #[test]
    fn state_resets_on_train_begin() {
        let mut es = EarlyStopping::new(Monitor::Train, 1, 0.0).unwrap();
        es.on_train_begin();
        es.on_epoch_end(&stats(1, 1.0));
        assert_eq!(es.on_epoch_end(&stats(2, 2.0)), CallbackAction::Stop);

        es.on_train_begin();
        assert_eq!(es.stopped_epoch(), None);
        assert_eq!(es.wait(), 0);
        assert!(es.best_loss().is_infinite());
    }

    #[test]
    fn rejects_bad_min_delta() {
        assert!(EarlyStopping::new(Monitor::Train, 3, -0.1).is_err());
        assert!(EarlyStopping::new(Monitor::Train, 3, f64::NAN).is_err());
    }

    #[test]
    fn progress_sender_stops_when_receiver_is_gone() {
        let (tx, rx) = mpsc::channel();
        let mut sender = ProgressSender::new(tx);
        assert_eq!(sender.on_epoch_end(&stats(1, 0.5)), CallbackAction::Continue);
        assert_eq!(rx.recv().unwrap().epoch, 1);
        drop(rx);
        assert_eq!(sender.on_epoch_end(&stats(2, 0.4)), CallbackAction::Stop);
    }

    #[test]
    fn history_collects_losses() {
        let mut history = History::new();
        history.on_train_begin();
        history.on_epoch_end(&stats(1, 0.5));
        history.on_epoch_end(&stats(2, 0.25));
        assert_eq!(history.train_losses(), vec![0.5, 0.25]);
        assert_eq!(history.val_losses(), vec![0.5, 0.25]);
    }
}
