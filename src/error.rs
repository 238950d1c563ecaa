use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Every failure the engine can raise. All of them are raised at the point of
/// violation and never recovered internally.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Operand shapes are incompatible, including broadcasts outside the
    /// supported row / column patterns.
    #[error("shape mismatch in {context}: {left:?} vs {right:?}")]
    ShapeMismatch {
        context: &'static str,
        left: (usize, usize),
        right: (usize, usize),
    },

    /// Matrix multiply with incompatible inner dimensions.
    #[error("dimension error in {context}: {message}")]
    Dimension {
        context: &'static str,
        message: String,
    },

    /// Zero divisor, empty shape, bad hyper-parameter or out-of-order call.
    #[error("value error in {context}: {message}")]
    Value {
        context: &'static str,
        message: String,
    },

    /// Row / column access out of range.
    #[error("index {index} out of range for {axis} of length {len}")]
    Index {
        axis: &'static str,
        index: usize,
        len: usize,
    },
}

impl Error {
    pub(crate) fn value(context: &'static str, message: impl Into<String>) -> Error {
        Error::Value { context, message: message.into() }
    }

    pub(crate) fn dimension(context: &'static str, message: impl Into<String>) -> Error {
        Error::Dimension { context, message: message.into() }
    }

    pub(crate) fn shape(context: &'static str, left: (usize, usize), right: (usize, usize)) -> Error {
        Error::ShapeMismatch { context, left, right }
    }
}

/// Fails with `ShapeMismatch` unless both shapes are identical.
pub(crate) fn ensure_shape(
    context: &'static str,
    expected: (usize, usize),
    actual: (usize, usize),
) -> Result<()> {
    if expected != actual {
        return Err(Error::shape(context, expected, actual));
    }
    Ok(())
}
