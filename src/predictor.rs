use crate::{
    config::{ModelConfig, TensorBinding},
    error::{LoadError, PredictError},
    preprocess,
};
use ndarray::{Array, Ix4};
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::TensorRef,
};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Seam between hosts and the ONNX-backed implementation.
pub trait SearchTermPredictor: Send + Sync + 'static {
    fn predict_search_term(&self, image_bytes: &[u8]) -> Result<String, PredictError>;
}

enum ModelState {
    Uninitialized,
    Ready {
        sessions: Vec<Mutex<Session>>,
        counter: AtomicUsize,
    },
}

/// Predicts a product search term from an encoded image using a pre-trained
/// ONNX classification model. The model is loaded once and shared read-only
/// across callers; concurrent requests are spread round-robin over a small
/// pool of sessions since a session run needs exclusive access.
pub struct OnnxSearchTermPredictor {
    binding: TensorBinding,
    state: ModelState,
}

impl OnnxSearchTermPredictor {
    /// Constructs a predictor with no model attached. Every predict call
    /// fails with `ModelNotLoaded` until `load_model` succeeds.
    pub fn new(binding: TensorBinding) -> Self {
        Self {
            binding,
            state: ModelState::Uninitialized,
        }
    }

    /// Builds the predictor and loads the model in one step.
    pub fn from_config(model_config: &ModelConfig) -> Result<Self, LoadError> {
        let mut predictor = Self::new(model_config.binding.clone());
        predictor.load_model(model_config.get_model_path(), model_config.num_instances)?;
        Ok(predictor)
    }

    /// Loads the model artifact and transitions to `Ready`. One-way: a
    /// loaded predictor never goes back to `Uninitialized` and never
    /// reloads.
    pub fn load_model(
        &mut self,
        model_path: impl AsRef<Path>,
        num_instances: usize,
    ) -> Result<(), LoadError> {
        if matches!(self.state, ModelState::Ready { .. }) {
            return Err(LoadError::AlreadyLoaded);
        }

        ort::init().commit()?;
        let num_instances = num_instances.max(1);
        let sessions = (0..num_instances)
            .map(|_| {
                let session = Session::builder()?
                    .with_optimization_level(GraphOptimizationLevel::Level3)?
                    .commit_from_file(model_path.as_ref())?;
                Ok(Mutex::new(session))
            })
            .collect::<Result<Vec<_>, ort::Error>>()?;

        self.validate_binding(&sessions[0])?;

        tracing::info!(
            "Loaded {} ONNX sessions from {}",
            num_instances,
            model_path.as_ref().display()
        );

        self.state = ModelState::Ready {
            sessions,
            counter: AtomicUsize::new(0),
        };
        Ok(())
    }

    // The binding names are checked once here so a model/config mismatch
    // fails at load instead of on the first request.
    fn validate_binding(&self, session: &Mutex<Session>) -> Result<(), LoadError> {
        let session = session.lock();

        let input_names: Vec<String> = session.inputs.iter().map(|i| i.name.clone()).collect();
        if !input_names.iter().any(|n| n == &self.binding.input_name) {
            return Err(LoadError::MissingInput {
                expected: self.binding.input_name.clone(),
                available: input_names,
            });
        }

        let output_names: Vec<String> = session.outputs.iter().map(|o| o.name.clone()).collect();
        if !output_names.iter().any(|n| n == &self.binding.output_name) {
            return Err(LoadError::MissingOutput {
                expected: self.binding.output_name.clone(),
                available: output_names,
            });
        }

        Ok(())
    }

    fn run_inference(&self, input: &Array<f32, Ix4>) -> Result<String, PredictError> {
        let ModelState::Ready { sessions, counter } = &self.state else {
            return Err(PredictError::ModelNotLoaded);
        };

        let index = counter.fetch_add(1, Ordering::SeqCst) % sessions.len();
        let mut session = sessions[index].lock();
        tracing::debug!("Handling request with session {}", index);

        let tensor_ref = TensorRef::from_array_view(input.view())?;
        let outputs = session.run(ort::inputs![self.binding.input_name.as_str() => tensor_ref])?;

        let value = outputs
            .get(self.binding.output_name.as_str())
            .ok_or_else(|| PredictError::OutputNotFound(self.binding.output_name.clone()))?;

        let (_, labels) = value.try_extract_strings()?;
        labels
            .into_iter()
            .next()
            .ok_or_else(|| PredictError::EmptyOutput(self.binding.output_name.clone()))
    }
}

impl SearchTermPredictor for OnnxSearchTermPredictor {
    fn predict_search_term(&self, image_bytes: &[u8]) -> Result<String, PredictError> {
        let input = preprocess::image_to_tensor(image_bytes)?;
        self.run_inference(&input)
    }
}
