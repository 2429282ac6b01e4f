use crate::{
    classifier::{ClassifyError, Prediction},
    model_service::ModelService,
    server::SharedState,
};
use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use std::error::Error as _;
use tracing::instrument;

const FILE_FIELD: &str = "file";

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ClassifyError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ClassifyError::MissingFile | ClassifyError::Upload(_) | ClassifyError::InvalidImage(_) => {
                StatusCode::BAD_REQUEST
            }
            ClassifyError::LabelMissing(_)
            | ClassifyError::NoPrediction
            | ClassifyError::Model(_)
            | ClassifyError::Worker(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ClassifyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let detail = match (&self, self.source()) {
            (ClassifyError::Upload(detail), _) | (ClassifyError::Worker(detail), _) => {
                detail.clone()
            }
            (_, Some(source)) => source.to_string(),
            (_, None) => String::new(),
        };
        if status.is_server_error() {
            tracing::error!(%status, detail = %detail, "Prediction failed: {}", self);
        } else {
            tracing::warn!(%status, detail = %detail, "Rejected upload: {}", self);
        }

        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

#[instrument(skip(state, multipart))]
pub async fn predict_image<M: ModelService>(
    State(state): State<SharedState<M>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Prediction>, ClassifyError> {
    let mut multipart = multipart.map_err(|e| ClassifyError::Upload(e.body_text()))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ClassifyError::Upload(e.body_text()))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let image_data = field
            .bytes()
            .await
            .map_err(|e| ClassifyError::Upload(e.body_text()))?;
        let prediction = state.classifier.classify(image_data).await?;
        return Ok(Json(prediction));
    }

    Err(ClassifyError::MissingFile)
}
