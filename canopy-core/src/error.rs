use thiserror::Error;

/// Result type alias using [CanopyError].
pub type CanopyResult<T> = Result<T, CanopyError>;

/// Error type shared by the whole canopy workspace.
///
/// The pipeline performs no I/O, so every failure is detected synchronously at
/// the call that receives the bad input and carries the offending parameter in
/// its message. Degenerate-but-valid inputs (an empty cell lattice, an
/// all-nodata raster) are not errors; they propagate as nodata.
#[derive(Debug, Error)]
pub enum CanopyError {
    /// A parameter was outside its documented domain.
    #[error("invalid parameter '{param}': {message}")]
    InvalidParameter {
        param: &'static str,
        message: String,
    },

    /// Not enough data to carry out the operation, e.g. an empty point set
    /// where points are required, or too few sampled cells to triangulate.
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    /// A method name that is not part of the closed method set.
    #[error("unsupported method: {0}")]
    UnsupportedMethod(String),
}

impl CanopyError {
    /// Shorthand for an [CanopyError::InvalidParameter] with a formatted value.
    pub fn invalid_parameter(param: &'static str, message: impl Into<String>) -> Self {
        CanopyError::InvalidParameter {
            param,
            message: message.into(),
        }
    }
}
