pub mod model;
pub mod spec;
pub mod summary;

pub use model::{Model, ParamSnapshot};
pub use spec::{LayerSpec, NetworkSpec};
pub use summary::{ModelSummary, SummaryRow};
