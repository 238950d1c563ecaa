pub mod error;
pub mod math;
pub mod params;
pub mod activation;
pub mod ops;
pub mod layers;
pub mod loss;
pub mod optim;
pub mod network;
pub mod train;

// Convenience re-exports
pub use error::{Error, Result};
pub use math::matrix::Matrix;
pub use params::store::{ParamId, ParamStore};
pub use activation::activation::ActivationFunction;
pub use ops::operation::{OpKind, Operation};
pub use layers::{Dense, Layer, LayerInfo, Sequential};
pub use loss::{Loss, LossType};
pub use optim::{Adam, Optimizer, OptimizerSpec, Sgd};
pub use network::{LayerSpec, Model, ModelSummary, NetworkSpec, ParamSnapshot};
pub use train::{
    Callback, CallbackAction, EarlyStopping, EpochStats, FitReport, History, Monitor,
    ProgressSender, TrainConfig,
};
