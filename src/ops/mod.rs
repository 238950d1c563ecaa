pub mod operation;

pub use operation::{OpKind, Operation};
