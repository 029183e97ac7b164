//! Repository trait abstraction for the processing pipeline.
//!
//! The trait defines the minimal interface the pipeline needs from the
//! videos table, allowing runs to be exercised without a database.

use async_trait::async_trait;
use uuid::Uuid;

use vidstream_core::models::{ProcessingOutcome, ProcessingStatus, VideoAsset};
use vidstream_core::AppError;

use crate::video_repository::VideoRepository;

/// Video repository operations needed by a processing run.
#[async_trait]
pub trait PipelineVideoRepository: Send + Sync {
    /// Fetch an asset by id, scoped to its tenant.
    async fn find_by_id(&self, id: Uuid, tenant_id: Uuid) -> Result<Option<VideoAsset>, AppError>;

    /// Status write used by the start and failure paths. Not tenant-filtered:
    /// the failure path may run before the asset was loaded.
    async fn set_processing_status(&self, id: Uuid, status: ProcessingStatus)
        -> Result<(), AppError>;

    /// Persist coarse progress for a running asset.
    async fn set_processing_progress(
        &self,
        id: Uuid,
        tenant_id: Uuid,
        progress: i32,
    ) -> Result<(), AppError>;

    /// Apply the terminal outcome of a successful run in one atomic update.
    /// Returns None when the asset no longer exists for this tenant.
    async fn update_processing_outcome(
        &self,
        id: Uuid,
        tenant_id: Uuid,
        outcome: ProcessingOutcome,
    ) -> Result<Option<VideoAsset>, AppError>;
}

#[async_trait]
impl PipelineVideoRepository for VideoRepository {
    async fn find_by_id(&self, id: Uuid, tenant_id: Uuid) -> Result<Option<VideoAsset>, AppError> {
        VideoRepository::find_by_id(self, id, tenant_id).await
    }

    async fn set_processing_status(
        &self,
        id: Uuid,
        status: ProcessingStatus,
    ) -> Result<(), AppError> {
        VideoRepository::set_processing_status(self, id, status).await
    }

    async fn set_processing_progress(
        &self,
        id: Uuid,
        tenant_id: Uuid,
        progress: i32,
    ) -> Result<(), AppError> {
        VideoRepository::set_processing_progress(self, id, tenant_id, progress).await
    }

    async fn update_processing_outcome(
        &self,
        id: Uuid,
        tenant_id: Uuid,
        outcome: ProcessingOutcome,
    ) -> Result<Option<VideoAsset>, AppError> {
        VideoRepository::update_processing_outcome(self, id, tenant_id, outcome).await
    }
}
