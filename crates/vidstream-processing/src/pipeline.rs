//! Moderation pipeline orchestration: probe, sample frames, classify,
//! commit verdict, stream progress.

use anyhow::{anyhow, Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use uuid::Uuid;

use vidstream_core::models::ProcessingStatus;
use vidstream_core::{Config, PipelineError};
use vidstream_db::{PipelineVideoRepository, VideoRepository};
use vidstream_infra::{ProgressHub, ProgressNotifier};
use vidstream_storage::Storage;

use crate::frames::{FrameExtractor, FrameSampler};
use crate::moderation::ModerationClient;
use crate::outcome::{completion_message, OutcomeCommitter};
use crate::probe::{MediaProbe, MetadataProbe};
use crate::registry::RunRegistry;

/// Fire-and-forget processing runs for uploaded videos.
///
/// One instance is shared by the whole service; each `spawn` launches an
/// independent run. No error ever propagates to the caller, failures are
/// only visible through the asset's persisted status and realtime events.
pub struct ProcessingPipeline {
    repo: Arc<dyn PipelineVideoRepository>,
    storage: Arc<dyn Storage>,
    probe: Arc<dyn MetadataProbe>,
    sampler: Arc<dyn FrameExtractor>,
    moderation: Arc<dyn ModerationClient>,
    committer: OutcomeCommitter,
    hub: Option<ProgressHub>,
    registry: RunRegistry,
    presign_expiry: Duration,
}

impl ProcessingPipeline {
    pub fn new(
        repo: VideoRepository,
        storage: Arc<dyn Storage>,
        moderation: Arc<dyn ModerationClient>,
        hub: Option<ProgressHub>,
        config: &Config,
    ) -> Result<Self> {
        let probe =
            MediaProbe::new(config.ffprobe_path.clone()).context("Failed to create MediaProbe")?;
        let sampler = FrameSampler::new(config.ffmpeg_path.clone())
            .context("Failed to create FrameSampler")?;

        Ok(Self::from_parts(
            Arc::new(repo),
            storage,
            Arc::new(probe),
            Arc::new(sampler),
            moderation,
            hub,
            Duration::from_secs(config.presign_expiry_secs),
        ))
    }

    /// Assemble a pipeline from already-built collaborators.
    pub fn from_parts(
        repo: Arc<dyn PipelineVideoRepository>,
        storage: Arc<dyn Storage>,
        probe: Arc<dyn MetadataProbe>,
        sampler: Arc<dyn FrameExtractor>,
        moderation: Arc<dyn ModerationClient>,
        hub: Option<ProgressHub>,
        presign_expiry: Duration,
    ) -> Self {
        let committer = OutcomeCommitter::new(Arc::clone(&repo));

        Self {
            repo,
            storage,
            probe,
            sampler,
            moderation,
            committer,
            hub,
            registry: RunRegistry::new(),
            presign_expiry,
        }
    }

    /// Launch a processing run for an asset. Returns immediately; the run
    /// proceeds in a background task. A duplicate spawn for an asset that is
    /// already running is logged and dropped.
    pub fn spawn(self: &Arc<Self>, asset_id: Uuid, tenant_id: Uuid) {
        let Some(guard) = self.registry.try_begin(asset_id) else {
            tracing::warn!(
                video_id = %asset_id,
                "Ignoring processing request, a run for this video is already active"
            );
            return;
        };

        let pipeline = Arc::clone(self);
        tokio::spawn(async move {
            let _guard = guard;
            pipeline.execute(asset_id, tenant_id).await;
        });
    }

    /// Drive one run to a terminal state. Errors never escape: a failed run
    /// ends with a progress-0 event and a best-effort failed-status write.
    async fn execute(&self, asset_id: Uuid, tenant_id: Uuid) {
        let mut notifier = ProgressNotifier::new(self.hub.clone(), asset_id, tenant_id);

        if let Err(err) = self.run(asset_id, tenant_id, &mut notifier).await {
            tracing::error!(
                video_id = %asset_id,
                tenant_id = %tenant_id,
                error = %err,
                "Video processing failed"
            );
            notifier.notify(0, "Processing failed");

            if let Err(status_err) = self
                .repo
                .set_processing_status(asset_id, ProcessingStatus::Failed)
                .await
            {
                tracing::error!(
                    video_id = %asset_id,
                    error = %status_err,
                    "Failed to record failed status"
                );
            }
        }
    }

    async fn run(
        &self,
        asset_id: Uuid,
        tenant_id: Uuid,
        notifier: &mut ProgressNotifier,
    ) -> Result<(), PipelineError> {
        tracing::info!(video_id = %asset_id, tenant_id = %tenant_id, "Starting video processing");

        // The uploader is not known yet, so this only reaches the tenant room.
        self.milestone(notifier, asset_id, tenant_id, 10, "Processing started")
            .await;

        let asset = self
            .repo
            .find_by_id(asset_id, tenant_id)
            .await
            .map_err(PipelineError::fatal)?
            .ok_or_else(|| {
                PipelineError::fatal(anyhow!(
                    "Video {} not found for tenant {}",
                    asset_id,
                    tenant_id
                ))
            })?;
        notifier.set_uploader(asset.uploader_id);

        self.repo
            .set_processing_status(asset_id, ProcessingStatus::Processing)
            .await
            .map_err(PipelineError::fatal)?;

        let input_url = self
            .storage
            .get_presigned_url(&asset.storage_key, self.presign_expiry)
            .await
            .map_err(|e| PipelineError::fatal(anyhow!("Failed to presign read URL: {}", e)))?;

        let probed = self.probe.probe(&input_url).await?;
        let duration = if probed.duration > 0.0 {
            probed.duration
        } else {
            asset.duration
        };
        let size = if probed.size > 0 {
            probed.size as i64
        } else {
            asset.size
        };
        self.milestone(notifier, asset_id, tenant_id, 20, "Metadata extracted")
            .await;

        self.milestone(
            notifier,
            asset_id,
            tenant_id,
            30,
            "Extracting frames for analysis",
        )
        .await;
        let scratch = TempDir::new()
            .context("Failed to create scratch directory")
            .map_err(PipelineError::fatal)?;
        let frames = self
            .sampler
            .extract(&input_url, duration, scratch.path())
            .await?;

        self.milestone(
            notifier,
            asset_id,
            tenant_id,
            60,
            "Analyzing content with AI",
        )
        .await;
        let verdict = self.moderation.analyze_frames(&frames).await?;

        let committed = self
            .committer
            .commit(&asset, verdict, duration, size)
            .await
            .map_err(PipelineError::fatal)?;

        notifier.notify(100, &completion_message(committed.sensitivity_status));

        tracing::info!(
            video_id = %asset_id,
            sensitivity_status = %committed.sensitivity_status,
            frame_count = frames.len(),
            "Video processing completed"
        );
        Ok(())
    }

    /// Emit a progress milestone and persist it best-effort. A progress row
    /// that lags behind reality is tolerable; a failed run is not.
    async fn milestone(
        &self,
        notifier: &ProgressNotifier,
        asset_id: Uuid,
        tenant_id: Uuid,
        progress: i32,
        message: &str,
    ) {
        notifier.notify(progress, message);
        if let Err(e) = self
            .repo
            .set_processing_progress(asset_id, tenant_id, progress)
            .await
        {
            tracing::warn!(
                video_id = %asset_id,
                progress,
                error = %e,
                "Failed to persist processing progress"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frames::FrameSet;
    use crate::probe::ProbeOutput;
    use async_trait::async_trait;
    use chrono::Utc;
    use serde_json::json;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;
    use vidstream_core::models::{
        ModerationVerdict, ProcessingOutcome, SensitivityStatus, VideoAsset,
    };
    use vidstream_core::AppError;
    use vidstream_infra::{tenant_room, user_room, ProgressEvent, ProgressStatus};
    use vidstream_storage::{StorageBackend, StorageError, StorageResult};

    struct RecordingRepository {
        asset: VideoAsset,
        statuses: Mutex<Vec<ProcessingStatus>>,
        progress: Mutex<Vec<i32>>,
        outcome: Mutex<Option<ProcessingOutcome>>,
    }

    impl RecordingRepository {
        fn new(asset: VideoAsset) -> Self {
            Self {
                asset,
                statuses: Mutex::new(Vec::new()),
                progress: Mutex::new(Vec::new()),
                outcome: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl PipelineVideoRepository for RecordingRepository {
        async fn find_by_id(
            &self,
            id: Uuid,
            tenant_id: Uuid,
        ) -> Result<Option<VideoAsset>, AppError> {
            if self.asset.id == id && self.asset.tenant_id == tenant_id {
                Ok(Some(self.asset.clone()))
            } else {
                Ok(None)
            }
        }

        async fn set_processing_status(
            &self,
            _id: Uuid,
            status: ProcessingStatus,
        ) -> Result<(), AppError> {
            self.statuses.lock().unwrap().push(status);
            Ok(())
        }

        async fn set_processing_progress(
            &self,
            _id: Uuid,
            _tenant_id: Uuid,
            progress: i32,
        ) -> Result<(), AppError> {
            self.progress.lock().unwrap().push(progress);
            Ok(())
        }

        async fn update_processing_outcome(
            &self,
            id: Uuid,
            tenant_id: Uuid,
            outcome: ProcessingOutcome,
        ) -> Result<Option<VideoAsset>, AppError> {
            if self.asset.id != id || self.asset.tenant_id != tenant_id {
                return Ok(None);
            }
            let mut updated = self.asset.clone();
            updated.sensitivity_analysis = Some(outcome.sensitivity_analysis.clone());
            updated.duration = outcome.duration;
            updated.size = outcome.size;
            updated.processing_status = outcome.processing_status;
            updated.sensitivity_status = outcome.sensitivity_status;
            updated.processing_progress = outcome.processing_progress;
            *self.outcome.lock().unwrap() = Some(outcome);
            Ok(Some(updated))
        }
    }

    struct StubStorage;

    #[async_trait]
    impl Storage for StubStorage {
        async fn upload(
            &self,
            _tenant_id: Uuid,
            _filename: &str,
            _content_type: &str,
            _data: Vec<u8>,
        ) -> StorageResult<(String, String)> {
            Err(StorageError::BackendError("upload unused".into()))
        }

        async fn download(&self, _storage_key: &str) -> StorageResult<Vec<u8>> {
            Err(StorageError::BackendError("download unused".into()))
        }

        async fn delete(&self, _storage_key: &str) -> StorageResult<()> {
            Err(StorageError::BackendError("delete unused".into()))
        }

        async fn get_presigned_url(
            &self,
            storage_key: &str,
            _expires_in: Duration,
        ) -> StorageResult<String> {
            Ok(format!("https://media.test/{}", storage_key))
        }

        async fn exists(&self, _storage_key: &str) -> StorageResult<bool> {
            Err(StorageError::BackendError("exists unused".into()))
        }

        async fn content_length(&self, _storage_key: &str) -> StorageResult<u64> {
            Err(StorageError::BackendError("content_length unused".into()))
        }

        fn backend_type(&self) -> StorageBackend {
            StorageBackend::Local
        }
    }

    struct StubProbe {
        output: Option<ProbeOutput>,
    }

    #[async_trait]
    impl MetadataProbe for StubProbe {
        async fn probe(&self, _input_url: &str) -> Result<ProbeOutput, PipelineError> {
            self.output.ok_or_else(|| {
                PipelineError::fatal(anyhow!(
                    "ffprobe failed: Invalid data found when processing input"
                ))
            })
        }
    }

    /// Writes one frame file into the scratch dir and remembers its path so
    /// tests can verify cleanup after the run.
    struct RecordingExtractor {
        frame_path: Mutex<Option<PathBuf>>,
    }

    impl RecordingExtractor {
        fn new() -> Self {
            Self {
                frame_path: Mutex::new(None),
            }
        }

        fn recorded_frame_path(&self) -> Option<PathBuf> {
            self.frame_path.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl FrameExtractor for RecordingExtractor {
        async fn extract(
            &self,
            _input_url: &str,
            _duration: f64,
            scratch_dir: &Path,
        ) -> Result<FrameSet, PipelineError> {
            let path = scratch_dir.join("frame-001.jpg");
            tokio::fs::write(&path, b"jpeg")
                .await
                .context("Failed to write frame")
                .map_err(PipelineError::fatal)?;
            *self.frame_path.lock().unwrap() = Some(path.clone());
            Ok(FrameSet::new(vec![path]))
        }
    }

    struct StubModeration {
        fail: bool,
    }

    #[async_trait]
    impl ModerationClient for StubModeration {
        async fn analyze_frames(
            &self,
            _frames: &FrameSet,
        ) -> Result<ModerationVerdict, PipelineError> {
            if self.fail {
                return Err(PipelineError::fatal(anyhow!("Gemini API request failed")));
            }
            Ok(ModerationVerdict::normalized(
                false,
                1.4,
                Some(&json!(["violence"])),
                Some(""),
            ))
        }
    }

    fn sample_asset() -> VideoAsset {
        let now = Utc::now();
        VideoAsset {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            uploader_id: Uuid::new_v4(),
            title: "clip".to_string(),
            description: None,
            original_filename: "clip.mp4".to_string(),
            storage_key: "videos/tenant/clip.mp4".to_string(),
            mime_type: "video/mp4".to_string(),
            size: 2_048,
            duration: 9.0,
            processing_status: ProcessingStatus::Pending,
            sensitivity_status: SensitivityStatus::Pending,
            processing_progress: 0,
            sensitivity_analysis: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn pipeline_with(
        repo: Arc<RecordingRepository>,
        probe: Arc<StubProbe>,
        extractor: Arc<RecordingExtractor>,
        moderation: Arc<StubModeration>,
        hub: ProgressHub,
    ) -> ProcessingPipeline {
        ProcessingPipeline::from_parts(
            repo,
            Arc::new(StubStorage),
            probe,
            extractor,
            moderation,
            Some(hub),
            Duration::from_secs(60),
        )
    }

    fn drain(rx: &mut tokio::sync::broadcast::Receiver<ProgressEvent>) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn flagged_run_commits_terminal_outcome_and_removes_scratch_dir() {
        let asset = sample_asset();
        let (asset_id, tenant_id, uploader_id) = (asset.id, asset.tenant_id, asset.uploader_id);
        let repo = Arc::new(RecordingRepository::new(asset));
        let probe = Arc::new(StubProbe {
            output: Some(ProbeOutput {
                duration: 30.0,
                size: 0,
            }),
        });
        let extractor = Arc::new(RecordingExtractor::new());
        let hub = ProgressHub::default();
        let mut tenant_rx = hub.subscribe(&tenant_room(tenant_id));
        let mut user_rx = hub.subscribe(&user_room(uploader_id));

        let pipeline = pipeline_with(
            Arc::clone(&repo),
            probe,
            Arc::clone(&extractor),
            Arc::new(StubModeration { fail: false }),
            hub,
        );
        pipeline.execute(asset_id, tenant_id).await;

        let outcome = repo.outcome.lock().unwrap().clone().unwrap();
        assert_eq!(outcome.processing_status, ProcessingStatus::Completed);
        assert_eq!(outcome.sensitivity_status, SensitivityStatus::Flagged);
        assert_eq!(outcome.processing_progress, 100);
        assert_eq!(outcome.duration, 30.0);
        assert_eq!(outcome.size, 2_048);
        assert_eq!(outcome.sensitivity_analysis.confidence, 1.0);
        assert_eq!(outcome.sensitivity_analysis.flags, vec!["violence"]);
        assert_eq!(outcome.sensitivity_analysis.summary, "No summary provided");

        // Only the transition into Processing; completion lands via the
        // atomic outcome write.
        assert_eq!(
            *repo.statuses.lock().unwrap(),
            vec![ProcessingStatus::Processing]
        );
        assert_eq!(*repo.progress.lock().unwrap(), vec![10, 20, 30, 60]);

        let events = drain(&mut tenant_rx);
        let progresses: Vec<i32> = events.iter().map(|e| e.progress).collect();
        assert_eq!(progresses, vec![10, 20, 30, 60, 100]);
        let last = events.last().unwrap();
        assert_eq!(last.message, "Processing FLAGGED");
        assert_eq!(last.status, ProgressStatus::Completed);

        // The uploader was only known after the asset was loaded.
        let user_events = drain(&mut user_rx);
        assert_eq!(user_events.first().unwrap().progress, 20);
        assert_eq!(user_events.last().unwrap().progress, 100);

        let frame_path = extractor.recorded_frame_path().unwrap();
        assert!(!frame_path.exists());
        assert!(!frame_path.parent().unwrap().exists());
    }

    #[tokio::test]
    async fn corrupt_media_fails_the_run_without_an_analysis_block() {
        let asset = sample_asset();
        let (asset_id, tenant_id) = (asset.id, asset.tenant_id);
        let repo = Arc::new(RecordingRepository::new(asset));
        let probe = Arc::new(StubProbe { output: None });
        let extractor = Arc::new(RecordingExtractor::new());
        let hub = ProgressHub::default();
        let mut tenant_rx = hub.subscribe(&tenant_room(tenant_id));

        let pipeline = pipeline_with(
            Arc::clone(&repo),
            probe,
            extractor,
            Arc::new(StubModeration { fail: false }),
            hub,
        );
        pipeline.execute(asset_id, tenant_id).await;

        assert!(repo.outcome.lock().unwrap().is_none());
        assert_eq!(
            *repo.statuses.lock().unwrap(),
            vec![ProcessingStatus::Processing, ProcessingStatus::Failed]
        );

        let events = drain(&mut tenant_rx);
        let last = events.last().unwrap();
        assert_eq!(last.progress, 0);
        assert_eq!(last.message, "Processing failed");
        assert_eq!(last.status, ProgressStatus::Processing);
    }

    #[tokio::test]
    async fn failed_classification_still_removes_scratch_dir() {
        let asset = sample_asset();
        let (asset_id, tenant_id) = (asset.id, asset.tenant_id);
        let repo = Arc::new(RecordingRepository::new(asset));
        let probe = Arc::new(StubProbe {
            output: Some(ProbeOutput {
                duration: 12.0,
                size: 4_096,
            }),
        });
        let extractor = Arc::new(RecordingExtractor::new());
        let hub = ProgressHub::default();
        let mut tenant_rx = hub.subscribe(&tenant_room(tenant_id));

        let pipeline = pipeline_with(
            Arc::clone(&repo),
            probe,
            Arc::clone(&extractor),
            Arc::new(StubModeration { fail: true }),
            hub,
        );
        pipeline.execute(asset_id, tenant_id).await;

        assert!(repo.outcome.lock().unwrap().is_none());
        assert_eq!(
            repo.statuses.lock().unwrap().last(),
            Some(&ProcessingStatus::Failed)
        );

        let frame_path = extractor.recorded_frame_path().unwrap();
        assert!(!frame_path.exists());
        assert!(!frame_path.parent().unwrap().exists());

        let last_event = drain(&mut tenant_rx).into_iter().last().unwrap();
        assert_eq!(last_event.progress, 0);
        assert_eq!(last_event.message, "Processing failed");
    }
}
