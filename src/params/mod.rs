pub mod store;

pub use store::{ParamId, ParamStore};
