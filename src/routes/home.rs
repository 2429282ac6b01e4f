use axum::{response::IntoResponse, response::Json};
use serde::Serialize;

#[derive(Serialize)]
pub struct Message {
    message: String,
}

pub async fn home() -> impl IntoResponse {
    Json(Message {
        message: "Pet Breed Classifier API".into(),
    })
}
