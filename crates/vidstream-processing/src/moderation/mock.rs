//! Deterministic no-network moderation backend.

use crate::frames::FrameSet;
use crate::moderation::ModerationClient;
use async_trait::async_trait;
use vidstream_core::models::ModerationVerdict;
use vidstream_core::PipelineError;

/// Approves everything. Used when no API key is configured so local and
/// development deployments still complete the full pipeline.
#[derive(Debug, Default, Clone)]
pub struct MockModerationClient;

impl MockModerationClient {
    pub fn new() -> Self {
        MockModerationClient
    }
}

#[async_trait]
impl ModerationClient for MockModerationClient {
    async fn analyze_frames(&self, frames: &FrameSet) -> Result<ModerationVerdict, PipelineError> {
        tracing::debug!(frame_count = frames.len(), "Mock moderation, auto-approving");

        Ok(ModerationVerdict {
            is_safe: true,
            confidence: 0.0,
            flags: Vec::new(),
            summary: "mocked".to_string(),
        })
    }
}
