/// Errors that can occur while configuring, training or sampling.
#[derive(Debug, thiserror::Error)]
pub enum OtError {
    /// Optimizer name outside the supported set.
    #[error("Invalid Optimizer: {0:?} (expected one of sgd, adam, radam)")]
    InvalidOptimizer(String),

    /// `epochs / 50` is zero, so the logging cadence would divide by zero.
    #[error("print cadence is zero: epoch count {epochs} is below 50")]
    PrintCadence { epochs: usize },

    /// The input tensor was not tracked by the autodiff graph.
    #[error("input has no gradient: enable gradient tracking on the input before differentiating")]
    MissingInputGradient,

    /// Shape or hyperparameter validation failure.
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Tensor contents could not be read back as host values.
    #[error("Tensor data conversion failed: {0}")]
    TensorData(String),

    /// Missing or malformed dataset files.
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// Image encoding failure.
    #[error(transparent)]
    Image(#[from] image::ImageError),

    /// JSON serialization failure.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// IO error reading datasets or writing artifacts.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, OtError>;
