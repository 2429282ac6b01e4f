use std::fmt;
use thiserror::Error;

/// Ways of building an inference session, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStrategy {
    /// Full graph optimization with the configured thread count.
    Default,
    /// Optimizations disabled, single intra-op thread.
    Conservative,
    /// Save the optimized graph to a temporary file and reload from it.
    RoundTrip,
}

impl LoadStrategy {
    pub const ORDER: [LoadStrategy; 3] = [
        LoadStrategy::Default,
        LoadStrategy::Conservative,
        LoadStrategy::RoundTrip,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LoadStrategy::Default => "default",
            LoadStrategy::Conservative => "conservative",
            LoadStrategy::RoundTrip => "round-trip",
        }
    }
}

impl fmt::Display for LoadStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct FailedAttempt {
    pub strategy: LoadStrategy,
    pub error: String,
}

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("no loading strategy configured")]
    NoStrategy,
    #[error("failed to load model after {} attempts: {}", .0.len(), describe(.0))]
    Exhausted(Vec<FailedAttempt>),
}

fn describe(attempts: &[FailedAttempt]) -> String {
    attempts
        .iter()
        .map(|attempt| format!("[{}] {}", attempt.strategy, attempt.error))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Tries each strategy in order and returns the first success together with
/// the strategy that produced it. Later strategies are not attempted.
pub fn load_with_fallback<T, E, F>(
    strategies: &[LoadStrategy],
    mut load: F,
) -> Result<(LoadStrategy, T), LoadError>
where
    E: fmt::Display,
    F: FnMut(LoadStrategy) -> Result<T, E>,
{
    if strategies.is_empty() {
        return Err(LoadError::NoStrategy);
    }

    let mut failures = Vec::with_capacity(strategies.len());
    for &strategy in strategies {
        match load(strategy) {
            Ok(loaded) => {
                if !failures.is_empty() {
                    tracing::warn!(
                        "Model loaded with the {} strategy after {} failed attempt(s)",
                        strategy,
                        failures.len()
                    );
                }
                return Ok((strategy, loaded));
            }
            Err(e) => {
                tracing::warn!("Model loading with the {} strategy failed: {}", strategy, e);
                failures.push(FailedAttempt {
                    strategy,
                    error: e.to_string(),
                });
            }
        }
    }

    tracing::error!("All model loading strategies failed");
    Err(LoadError::Exhausted(failures))
}
