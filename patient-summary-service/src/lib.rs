pub mod engines;
pub mod jobs;
pub mod models;
pub mod service;

pub use models::*;
pub use service::{AppState, build_router, create_app};
