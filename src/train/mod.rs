pub mod callbacks;
pub mod epoch_stats;
pub mod loop_fn;
pub mod train_config;

pub use callbacks::{Callback, CallbackAction, EarlyStopping, History, Monitor, ProgressSender};
pub use epoch_stats::EpochStats;
pub use loop_fn::{fit, FitReport};
pub use train_config::TrainConfig;
