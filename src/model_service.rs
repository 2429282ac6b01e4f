use ndarray::{Array, Ix4};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("session mutex poisoned: {0}")]
    Poisoned(String),
    #[error("failed to build tensor: {0}")]
    Tensor(String),
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("failed to extract tensor: {0}")]
    Extract(String),
}

/// A loaded classifier: one NHWC image batch in, one probability vector out.
pub trait ModelService: Send + Sync + 'static {
    fn predict(&self, input: Array<f32, Ix4>) -> Result<Vec<f32>, ModelError>;
}
