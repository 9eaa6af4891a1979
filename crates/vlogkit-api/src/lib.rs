//! Axum HTTP server for the vlogkit backend.
//!
//! This crate provides:
//! - Bearer-token authentication (JWT) with argon2 password hashing
//! - Project/user ownership enforcement
//! - The transform executor and batch coordinator on top of `vlogkit-media`
//! - REST handlers for upload, inspection and every transformation

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod password;
pub mod routes;
pub mod services;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
