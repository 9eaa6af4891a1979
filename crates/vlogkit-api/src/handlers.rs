//! HTTP request handlers.

pub mod auth;
pub mod projects;
pub mod system;
pub mod videos;
