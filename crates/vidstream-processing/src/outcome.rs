//! Verdict persistence.

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use std::sync::Arc;
use vidstream_core::models::{
    ModerationVerdict, ProcessingOutcome, ProcessingStatus, SensitivityAnalysis, SensitivityStatus,
    VideoAsset,
};
use vidstream_db::PipelineVideoRepository;

/// Writes the final verdict onto the asset row in a single atomic update.
#[derive(Clone)]
pub struct OutcomeCommitter {
    repo: Arc<dyn PipelineVideoRepository>,
}

impl OutcomeCommitter {
    pub fn new(repo: Arc<dyn PipelineVideoRepository>) -> Self {
        Self { repo }
    }

    /// Build the terminal outcome and persist it. Statuses, progress,
    /// analysis block and resolved media facts land in one update so a
    /// reader never observes a half-committed verdict.
    ///
    /// A write failure here loses the computed verdict, so the full verdict
    /// is logged before the error propagates.
    #[tracing::instrument(skip(self, verdict), fields(video_id = %asset.id, tenant_id = %asset.tenant_id))]
    pub async fn commit(
        &self,
        asset: &VideoAsset,
        verdict: ModerationVerdict,
        duration: f64,
        size: i64,
    ) -> Result<VideoAsset> {
        let sensitivity_status = if verdict.is_safe {
            SensitivityStatus::Safe
        } else {
            SensitivityStatus::Flagged
        };

        let outcome = ProcessingOutcome {
            sensitivity_analysis: SensitivityAnalysis {
                is_safe: verdict.is_safe,
                confidence: verdict.confidence,
                flags: verdict.flags.clone(),
                summary: verdict.summary.clone(),
                analyzed_at: Utc::now(),
            },
            duration,
            size,
            processing_status: ProcessingStatus::Completed,
            sensitivity_status,
            processing_progress: 100,
        };

        let updated = self
            .repo
            .update_processing_outcome(asset.id, asset.tenant_id, outcome)
            .await
            .map_err(|e| {
                tracing::error!(
                    video_id = %asset.id,
                    is_safe = verdict.is_safe,
                    confidence = verdict.confidence,
                    flags = ?verdict.flags,
                    summary = %verdict.summary,
                    error = %e,
                    "Failed to commit moderation verdict, verdict is lost"
                );
                e
            })
            .context("Failed to commit processing outcome")?;

        updated.ok_or_else(|| {
            tracing::error!(
                video_id = %asset.id,
                is_safe = verdict.is_safe,
                confidence = verdict.confidence,
                flags = ?verdict.flags,
                "Outcome commit matched no row, asset was removed mid-run"
            );
            anyhow!("Video {} no longer exists", asset.id)
        })
    }
}

/// Terminal progress message for a committed verdict.
pub fn completion_message(status: SensitivityStatus) -> String {
    format!("Processing {}", status)
}
