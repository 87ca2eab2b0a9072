mod error;
mod preprocess;
mod predictor;

pub mod config;

pub use error::{LoadError, PredictError};
pub use predictor::{OnnxSearchTermPredictor, SearchTermPredictor};
