mod breed;
mod classifier;
mod labels;
mod loader;
mod model_service;
mod ort_service;
mod preprocess;
mod routes;
mod server;

pub mod app;
pub mod config;

pub use app::start_app;
