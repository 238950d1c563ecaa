pub mod linalg;
pub mod matrix;

pub use linalg::{identity, matmul, sum_axis, transpose, Axis};
pub use matrix::Matrix;
