pub mod dense;
pub mod layer;
pub mod sequential;

pub use dense::Dense;
pub use layer::{Layer, LayerInfo};
pub use sequential::Sequential;
