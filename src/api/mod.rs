//! CEAL API Server module
//!
//! HTTP REST API for the survey. Run with `ceal-server`.

pub mod auth;
pub mod catalog;
pub mod error;
pub mod handlers;
pub mod server;

pub use error::ApiError;
pub use server::{build_router, run_api_server, ApiConfig, AppState};
