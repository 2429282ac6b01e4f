use crate::{
    classifier::ClassifierService, config::ServerConfig, model_service::ModelService,
    routes::api_routes,
};
use axum::{extract::DefaultBodyLimit, Router};
use std::{future::Future, sync::Arc};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

pub struct SharedState<M: ModelService> {
    pub classifier: Arc<ClassifierService<M>>,
}

impl<M: ModelService> Clone for SharedState<M> {
    fn clone(&self) -> Self {
        Self {
            classifier: self.classifier.clone(),
        }
    }
}

pub fn build_router<M: ModelService>(
    classifier: Arc<ClassifierService<M>>,
    body_limit_bytes: usize,
) -> Router {
    Router::new()
        .merge(api_routes::<M>())
        .with_state(SharedState { classifier })
        .layer(DefaultBodyLimit::max(body_limit_bytes))
        .layer(CorsLayer::permissive())
}

pub struct HttpServer {
    router: Router,
    listener: TcpListener,
}

impl HttpServer {
    pub async fn new<M: ModelService>(
        classifier: Arc<ClassifierService<M>>,
        config: &ServerConfig,
    ) -> anyhow::Result<Self> {
        let router = build_router(classifier, config.body_limit_bytes);
        let listener = TcpListener::bind(config.get_address()).await?;

        Ok(Self { router, listener })
    }

    pub async fn run<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tracing::info!("Starting app on {}", self.listener.local_addr()?);

        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{
        tests::{pet_labels, png_bytes, MockModelService},
        Prediction,
    };
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
    };
    use serde_json::Value;
    use tower::ServiceExt;

    const BOUNDARY: &str = "X-PET-BOUNDARY";

    fn router(probabilities: Vec<f32>) -> Router {
        let classifier = ClassifierService::new(MockModelService::new(probabilities), pet_labels(), 32);
        build_router(Arc::new(classifier), 1024 * 1024)
    }

    fn multipart_request(field: &str, payload: &[u8]) -> Request<Body> {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"pet.png\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(payload);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method(Method::POST)
            .uri("/predict")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_home() {
        let app = router(vec![1.0]);

        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(Request::get("/").body(Body::empty()).unwrap())
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(
                json_body(response).await,
                serde_json::json!({"message": "Pet Breed Classifier API"})
            );
        }
    }

    #[tokio::test]
    async fn test_predict() {
        let app = router(vec![0.1, 0.05, 0.05, 0.8]);

        let response = app
            .oneshot(multipart_request("file", &png_bytes()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let prediction: Prediction = serde_json::from_value(json_body(response).await).unwrap();
        assert_eq!(prediction.breed, "Pug");
        assert_eq!(prediction.confidence, "80.00%");
        assert_eq!(prediction.animal_type, "I am a Dog");
    }

    #[tokio::test]
    async fn test_predict_missing_file_field() {
        let app = router(vec![1.0]);

        let response = app
            .oneshot(multipart_request("image", &png_bytes()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert!(!body["error"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_predict_not_an_image() {
        let app = router(vec![1.0]);

        let response = app
            .oneshot(multipart_request("file", b"hello, I am a text file"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error"], "uploaded file is not a supported image");
    }

    #[tokio::test]
    async fn test_predict_without_multipart_body() {
        let app = router(vec![1.0]);

        let response = app
            .oneshot(
                Request::post("/predict")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn test_predict_label_miss_is_server_error() {
        let app = router(vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.7]);

        let response = app
            .oneshot(multipart_request("file", &png_bytes()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            json_body(response).await["error"],
            "no breed label for class index 6"
        );
    }

    #[tokio::test]
    async fn test_cors_is_permissive() {
        let app = router(vec![1.0]);

        let response = app
            .oneshot(
                Request::get("/")
                    .header(header::ORIGIN, "https://pets.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "*"
        );
    }
}
