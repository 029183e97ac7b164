//! Video repository: tenant-scoped access to the videos table.

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use vidstream_core::models::{
    NewVideoAsset, ProcessingOutcome, ProcessingStatus, SensitivityAnalysis, SensitivityStatus,
    VideoAsset,
};
use vidstream_core::AppError;

const RETURNING_COLUMNS: &str = r#"
    id, tenant_id, uploader_id, title, description, original_filename,
    storage_key, mime_type, size, duration, processing_status,
    sensitivity_status, processing_progress, sensitivity_analysis,
    created_at, updated_at
"#;

/// Row type for the videos table (for FromRow). The analysis block is stored
/// as JSONB and decoded into the domain type in `to_video_asset`.
#[derive(Debug, sqlx::FromRow)]
struct VideoAssetRow {
    id: Uuid,
    tenant_id: Uuid,
    uploader_id: Uuid,
    title: String,
    description: Option<String>,
    original_filename: String,
    storage_key: String,
    mime_type: String,
    size: i64,
    duration: f64,
    processing_status: ProcessingStatus,
    sensitivity_status: SensitivityStatus,
    processing_progress: i32,
    sensitivity_analysis: Option<JsonValue>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl VideoAssetRow {
    fn to_video_asset(self) -> Result<VideoAsset, AppError> {
        let sensitivity_analysis = self
            .sensitivity_analysis
            .map(serde_json::from_value::<SensitivityAnalysis>)
            .transpose()?;

        Ok(VideoAsset {
            id: self.id,
            tenant_id: self.tenant_id,
            uploader_id: self.uploader_id,
            title: self.title,
            description: self.description,
            original_filename: self.original_filename,
            storage_key: self.storage_key,
            mime_type: self.mime_type,
            size: self.size,
            duration: self.duration,
            processing_status: self.processing_status,
            sensitivity_status: self.sensitivity_status,
            processing_progress: self.processing_progress,
            sensitivity_analysis,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Repository for the videos table.
#[derive(Clone)]
pub struct VideoRepository {
    pool: PgPool,
}

impl VideoRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Register a new asset (upload intake). New assets start Pending/Pending
    /// with zero progress and no analysis block.
    #[tracing::instrument(skip(self, asset), fields(db.table = "videos", tenant_id = %asset.tenant_id))]
    pub async fn create(&self, asset: NewVideoAsset) -> Result<VideoAsset, AppError> {
        let row = sqlx::query_as::<Postgres, VideoAssetRow>(&format!(
            r#"
            INSERT INTO videos (
                tenant_id, uploader_id, title, description, original_filename,
                storage_key, mime_type, size
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {RETURNING_COLUMNS}
            "#
        ))
        .bind(asset.tenant_id)
        .bind(asset.uploader_id)
        .bind(&asset.title)
        .bind(&asset.description)
        .bind(&asset.original_filename)
        .bind(&asset.storage_key)
        .bind(&asset.mime_type)
        .bind(asset.size)
        .fetch_one(&self.pool)
        .await?;

        row.to_video_asset()
    }

    /// Fetch an asset by id, scoped to its tenant.
    #[tracing::instrument(skip(self), fields(db.table = "videos"))]
    pub async fn find_by_id(
        &self,
        id: Uuid,
        tenant_id: Uuid,
    ) -> Result<Option<VideoAsset>, AppError> {
        let row = sqlx::query_as::<Postgres, VideoAssetRow>(&format!(
            r#"
            SELECT {RETURNING_COLUMNS}
            FROM videos
            WHERE id = $1 AND tenant_id = $2
            "#
        ))
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(VideoAssetRow::to_video_asset).transpose()
    }

    /// List a tenant's assets, newest first.
    #[tracing::instrument(skip(self), fields(db.table = "videos"))]
    pub async fn list_by_tenant(
        &self,
        tenant_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<VideoAsset>, AppError> {
        let rows = sqlx::query_as::<Postgres, VideoAssetRow>(&format!(
            r#"
            SELECT {RETURNING_COLUMNS}
            FROM videos
            WHERE tenant_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(tenant_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(VideoAssetRow::to_video_asset)
            .collect()
    }

    /// Apply the terminal outcome of a successful run in one atomic UPDATE.
    ///
    /// All outcome fields land in a single statement so no reader can observe
    /// a completed status paired with a stale analysis block, duration, or
    /// progress value. Returns None when the asset no longer exists for this
    /// tenant.
    #[tracing::instrument(skip(self, outcome), fields(db.table = "videos"))]
    pub async fn update_processing_outcome(
        &self,
        id: Uuid,
        tenant_id: Uuid,
        outcome: ProcessingOutcome,
    ) -> Result<Option<VideoAsset>, AppError> {
        let analysis = serde_json::to_value(&outcome.sensitivity_analysis)?;

        let row = sqlx::query_as::<Postgres, VideoAssetRow>(&format!(
            r#"
            UPDATE videos
            SET sensitivity_analysis = $3,
                duration = $4,
                size = $5,
                processing_status = $6,
                sensitivity_status = $7,
                processing_progress = $8,
                updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            RETURNING {RETURNING_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(tenant_id)
        .bind(analysis)
        .bind(outcome.duration)
        .bind(outcome.size)
        .bind(outcome.processing_status)
        .bind(outcome.sensitivity_status)
        .bind(outcome.processing_progress)
        .fetch_optional(&self.pool)
        .await?;

        row.map(VideoAssetRow::to_video_asset).transpose()
    }

    /// Best-effort status write used by the failure path. Deliberately not
    /// tenant-filtered: the failure path may run before the asset was loaded,
    /// when only the id is known.
    #[tracing::instrument(skip(self), fields(db.table = "videos"))]
    pub async fn set_processing_status(
        &self,
        id: Uuid,
        status: ProcessingStatus,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE videos
            SET processing_status = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Persist coarse progress for a running asset.
    #[tracing::instrument(skip(self), fields(db.table = "videos"))]
    pub async fn set_processing_progress(
        &self,
        id: Uuid,
        tenant_id: Uuid,
        progress: i32,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE videos
            SET processing_progress = $3, updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .bind(progress)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
