//! Green Roast server library
//!
//! Prompt carbon estimation, roasting, rewrite suggestions and diss-track
//! generation, shared by the server binary and the integration tests.

pub mod clients;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

// Re-export commonly used types for convenience
pub use config::AppSettings;
pub use error::AppError;
