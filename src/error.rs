use thiserror::Error;

/// Per-request prediction failures. Nothing here is retried or replaced
/// with a fallback label; every variant surfaces to the caller as-is.
#[derive(Debug, Error)]
pub enum PredictError {
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("model is not loaded")]
    ModelNotLoaded,

    #[error("model run produced no output named {0:?}")]
    OutputNotFound(String),

    #[error("inference failed: {0}")]
    Inference(#[from] ort::Error),

    #[error("model output {0:?} contained no labels")]
    EmptyOutput(String),
}

/// One-time model load failures.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("model already loaded")]
    AlreadyLoaded,

    #[error("failed to build inference session: {0}")]
    Session(#[from] ort::Error),

    #[error("model declares no input named {expected:?} (available: {available:?})")]
    MissingInput {
        expected: String,
        available: Vec<String>,
    },

    #[error("model declares no output named {expected:?} (available: {available:?})")]
    MissingOutput {
        expected: String,
        available: Vec<String>,
    },
}
