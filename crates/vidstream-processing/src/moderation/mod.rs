//! Frame classification against a fixed safety taxonomy.
//!
//! The backend is chosen once at construction: a Gemini-backed client when
//! an API key is configured, otherwise a deterministic mock that approves
//! everything. Callers only see the [`ModerationClient`] trait.

mod gemini;
mod mock;
mod retry;

pub use gemini::GeminiModerationClient;
pub use mock::MockModerationClient;

use crate::frames::FrameSet;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use vidstream_core::models::ModerationVerdict;
use vidstream_core::{Config, PipelineError};

/// Classifies a set of sampled frames into a moderation verdict.
#[async_trait]
pub trait ModerationClient: Send + Sync {
    async fn analyze_frames(&self, frames: &FrameSet) -> Result<ModerationVerdict, PipelineError>;
}

/// Select the moderation backend from configuration.
pub fn build_moderation_client(config: &Config) -> Result<Arc<dyn ModerationClient>> {
    match config.gemini_api_key {
        Some(ref api_key) => {
            let client = GeminiModerationClient::new(
                api_key.clone(),
                config.gemini_model.clone(),
                config.moderation_max_attempts,
                Duration::from_secs(config.moderation_retry_delay_secs),
            )
            .context("Failed to build Gemini moderation client")?;
            Ok(Arc::new(client))
        }
        None => {
            tracing::warn!("No moderation API key configured, frames will be auto-approved");
            Ok(Arc::new(MockModerationClient::new()))
        }
    }
}
