use serde::Serialize;
use std::fmt::Debug;

use crate::error::Result;
use crate::math::matrix::Matrix;
use crate::params::store::{ParamId, ParamStore};

/// A trainable unit: something that maps a batch forward and a gradient
/// backward.
///
/// Layers do not hold their parameters; they hold ids into the
/// [`ParamStore`] passed to every call. `forward` may allocate new parameters
/// (lazy shape inference), hence the mutable store.
pub trait Layer: Debug {
    fn forward(&mut self, input: &Matrix, params: &mut ParamStore) -> Result<Matrix>;

    /// Back-propagates through the layer, writing parameter gradients into
    /// `params`, and returns the gradient w.r.t. the layer input.
    fn backward(&mut self, output_grad: &Matrix, params: &mut ParamStore) -> Result<Matrix>;

    /// Ids of every trainable table, in execution order.
    ///
    /// Computed from the live structure on each call, so the list can never go
    /// stale after layers are added or built.
    fn param_ids(&self) -> Vec<ParamId>;

    /// Short type name used in summaries, e.g. `"dense"`.
    fn layer_type(&self) -> &'static str;

    /// Output width if known (before the first forward it may not be).
    fn units(&self) -> Option<usize> {
        None
    }

    /// Appends one [`LayerInfo`] per leaf layer. Containers override this to
    /// flatten their children.
    fn describe(&self, params: &ParamStore, out: &mut Vec<LayerInfo>) {
        let param_count = self.param_ids()
            .into_iter()
            .filter_map(|id| params.value(id).ok())
            .map(Matrix::len)
            .sum();
        out.push(LayerInfo {
            layer_type: self.layer_type().to_string(),
            units: self.units(),
            params: param_count,
        });
    }
}

/// One row of a model summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayerInfo {
    pub layer_type: String,
    pub units: Option<usize>,
    pub params: usize,
}
