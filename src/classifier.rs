use crate::{
    breed::{display_name, AnimalType},
    labels::LabelTable,
    model_service::{ModelError, ModelService},
    preprocess::{decode_image, to_input_tensor, PreprocessError},
};
use axum::body::Bytes;
use ndarray::Array;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClassifyError {
    #[error("no `file` field in the upload")]
    MissingFile,
    #[error("could not read the uploaded form")]
    Upload(String),
    #[error("uploaded file is not a supported image")]
    InvalidImage(#[source] PreprocessError),
    #[error("no breed label for class index {0}")]
    LabelMissing(usize),
    #[error("model returned no usable probabilities")]
    NoPrediction,
    #[error("model inference failed")]
    Model(#[source] ModelError),
    #[error("model inference failed")]
    Worker(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub breed: String,
    pub confidence: String,
    pub animal_type: String,
}

pub struct ClassifierService<M: ModelService> {
    model_service: Arc<M>,
    labels: Arc<LabelTable>,
    input_size: u32,
}

impl<M: ModelService> ClassifierService<M> {
    pub fn new(model_service: M, labels: LabelTable, input_size: u32) -> Self {
        Self {
            model_service: Arc::new(model_service),
            labels: Arc::new(labels),
            input_size,
        }
    }

    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    /// Decodes, preprocesses and runs the model off the async runtime, then
    /// resolves the most probable class.
    pub async fn classify(&self, image_data: Bytes) -> Result<Prediction, ClassifyError> {
        let model_service = self.model_service.clone();
        let input_size = self.input_size;

        let probabilities = tokio::task::spawn_blocking(move || {
            let image = decode_image(&image_data).map_err(ClassifyError::InvalidImage)?;
            let input = to_input_tensor(&image, input_size);
            model_service.predict(input).map_err(ClassifyError::Model)
        })
        .await
        .map_err(|e| ClassifyError::Worker(e.to_string()))??;

        self.resolve(&probabilities)
    }

    pub fn resolve(&self, probabilities: &[f32]) -> Result<Prediction, ClassifyError> {
        let (class_index, probability) =
            arg_max(probabilities).ok_or(ClassifyError::NoPrediction)?;
        let breed_name = self
            .labels
            .get(class_index)
            .ok_or(ClassifyError::LabelMissing(class_index))?;

        tracing::debug!(class_index, probability, "Resolved prediction");

        Ok(Prediction {
            breed: display_name(breed_name),
            confidence: format_confidence(probability),
            animal_type: AnimalType::from_breed(breed_name).as_str().to_string(),
        })
    }

    /// Runs one blank image through the model and returns the length of the
    /// probability vector.
    pub async fn probe_output_len(&self) -> Result<usize, ClassifyError> {
        let model_service = self.model_service.clone();
        let side = self.input_size as usize;

        let probabilities = tokio::task::spawn_blocking(move || {
            model_service
                .predict(Array::zeros((1, side, side, 3)))
                .map_err(ClassifyError::Model)
        })
        .await
        .map_err(|e| ClassifyError::Worker(e.to_string()))??;

        Ok(probabilities.len())
    }
}

/// Index and value of the first maximum, ignoring `NaN`.
fn arg_max(values: &[f32]) -> Option<(usize, f32)> {
    values
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, value)| !value.is_nan())
        .fold(None, |best, (index, value)| match best {
            Some((_, best_value)) if best_value >= value => best,
            _ => Some((index, value)),
        })
}

fn format_confidence(probability: f32) -> String {
    format!("{:.2}%", f64::from(probability) * 100.0)
}
