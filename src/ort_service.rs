use crate::{
    config::{ModelConfig, Validatable},
    loader::{load_with_fallback, LoadError, LoadStrategy},
    model_service::{ModelError, ModelService},
};
use ndarray::{Array, Ix4};
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::TensorRef,
};
use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

#[derive(Clone)]
pub struct OrtModelService {
    sessions: Arc<Vec<Arc<Mutex<Session>>>>,
    counter: Arc<AtomicUsize>,
}

impl OrtModelService {
    pub fn new(model_config: &ModelConfig) -> Result<Self, Box<dyn std::error::Error>> {
        ort::init().with_name("pet_breed_classifier").commit()?;

        let model_path = model_config.get_path();
        let num_instances = model_config.num_instances.max(1);
        let sessions = (0..num_instances)
            .map(|instance| {
                let (strategy, session) = load_with_fallback(&LoadStrategy::ORDER, |strategy| {
                    build_session(strategy, &model_path, model_config.intra_threads, instance)
                })?;
                tracing::debug!("Session {} built with the {} strategy", instance, strategy);
                Ok(Arc::new(Mutex::new(session)))
            })
            .collect::<Result<Vec<_>, LoadError>>()?;

        tracing::info!(
            "Created {} ONNX sessions from {:?}",
            num_instances,
            model_path
        );

        Ok(Self {
            sessions: Arc::new(sessions),
            counter: Arc::new(AtomicUsize::new(0)),
        })
    }
}

fn build_session(
    strategy: LoadStrategy,
    model_path: &Path,
    intra_threads: usize,
    instance: usize,
) -> ort::Result<Session> {
    match strategy {
        LoadStrategy::Default => Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(intra_threads.max(1))?
            .commit_from_file(model_path),
        LoadStrategy::Conservative => Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Disable)?
            .with_intra_threads(1)?
            .commit_from_file(model_path),
        LoadStrategy::RoundTrip => {
            let optimized_path = round_trip_path(model_path, instance);
            let result = Session::builder()?
                .with_optimization_level(GraphOptimizationLevel::Level1)?
                .with_optimized_model_path(&optimized_path)?
                .commit_from_file(model_path)
                .and_then(|saved| {
                    drop(saved);
                    Session::builder()?
                        .with_optimization_level(GraphOptimizationLevel::Disable)?
                        .commit_from_file(&optimized_path)
                });
            if let Err(e) = std::fs::remove_file(&optimized_path) {
                tracing::debug!("Could not remove {:?}: {}", optimized_path, e);
            }
            result
        }
    }
}

fn round_trip_path(model_path: &Path, instance: usize) -> PathBuf {
    let stem = model_path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("model");
    std::env::temp_dir().join(format!(
        "{}-{}-{}.optimized.onnx",
        stem,
        std::process::id(),
        instance
    ))
}

impl ModelService for OrtModelService {
    fn predict(&self, input: Array<f32, Ix4>) -> Result<Vec<f32>, ModelError> {
        let index = self.counter.fetch_add(1, Ordering::SeqCst) % self.sessions.len();
        let mut session = self.sessions[index]
            .lock()
            .map_err(|e| ModelError::Poisoned(e.to_string()))?;

        tracing::debug!("Handling request with session {}", index);
        let input = input.as_standard_layout();
        let tensor_ref = TensorRef::from_array_view(input.view())
            .map_err(|e| ModelError::Tensor(e.to_string()))?;

        let outputs = session
            .run(ort::inputs![tensor_ref])
            .map_err(|e| ModelError::Inference(e.to_string()))?;

        let (_, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| ModelError::Extract(e.to_string()))?;

        Ok(data.to_vec())
    }
}
