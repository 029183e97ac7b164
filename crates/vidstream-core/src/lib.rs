//! Vidstream Core Library
//!
//! This crate provides the domain models, error types, and configuration
//! shared across all vidstream components.

pub mod config;
pub mod error;
pub mod models;
pub mod pipeline_error;
pub mod storage_types;

// Re-export commonly used types
pub use config::Config;
pub use error::AppError;
pub use pipeline_error::{PipelineError, PipelineResultExt};
pub use storage_types::StorageBackend;
