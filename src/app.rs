use crate::{
    classifier::{ClassifierService, ClassifyError},
    config::{Config, Validatable},
    labels::LabelTable,
    model_service::ModelService,
    ort_service::OrtModelService,
    server::HttpServer,
};
use std::sync::Arc;
use thiserror::Error;
use tokio::signal;

#[derive(Error, Debug)]
pub(crate) enum AppError {
    #[error("model produces {outputs} probabilities but the label table has {labels} classes")]
    Cardinality { outputs: usize, labels: usize },
    #[error("warm-up inference failed: {0}")]
    WarmUp(#[from] ClassifyError),
}

pub async fn start_app(config: Config) -> anyhow::Result<()> {
    let labels = LabelTable::load(&config.labels.get_path())?;
    if !labels.is_contiguous() {
        tracing::warn!("Class indices in {:?} are not contiguous", config.labels.get_path());
    }
    tracing::info!("Loaded {} breed labels", labels.len());

    let model_service = match OrtModelService::new(&config.model) {
        Ok(service) => service,
        Err(e) => {
            tracing::error!("Failed to initialize model service: {:?}", e);
            return Err(anyhow::anyhow!("failed to initialize model service: {}", e));
        }
    };

    let classifier = ClassifierService::new(model_service, labels, config.model.input_size);
    check_cardinality(&classifier).await?;

    let server = HttpServer::new(Arc::new(classifier), &config.server).await?;
    server.run(shutdown_signal()).await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// The model's output length must match the number of breed labels.
pub(crate) async fn check_cardinality<M: ModelService>(
    classifier: &ClassifierService<M>,
) -> Result<(), AppError> {
    let outputs = classifier.probe_output_len().await?;
    let labels = classifier.labels().len();
    if outputs != labels {
        tracing::error!(outputs, labels, "Model and label table disagree");
        return Err(AppError::Cardinality { outputs, labels });
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
