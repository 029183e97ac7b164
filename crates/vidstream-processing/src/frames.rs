//! Frame sampling: pick timestamps across the clip and extract still images.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use vidstream_core::PipelineError;

/// Produces the frame images a moderation run classifies.
#[async_trait]
pub trait FrameExtractor: Send + Sync {
    async fn extract(
        &self,
        input_url: &str,
        duration: f64,
        scratch_dir: &Path,
    ) -> Result<FrameSet, PipelineError>;
}

/// Clips without a usable duration are sampled as if they were this long.
const FALLBACK_DURATION_SECS: f64 = 5.0;

/// One sampled frame every this many seconds of footage.
const SAMPLE_INTERVAL_SECS: f64 = 5.0;

/// Ordered frame files inside a run's scratch directory.
///
/// Paths are only valid while the scratch `TempDir` that produced them is
/// alive.
#[derive(Debug, Clone)]
pub struct FrameSet {
    paths: Vec<PathBuf>,
}

impl FrameSet {
    pub fn new(mut paths: Vec<PathBuf>) -> Self {
        paths.sort();
        FrameSet { paths }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Extracts still frames from a video URL with ffmpeg.
pub struct FrameSampler {
    ffmpeg_path: String,
}

impl FrameSampler {
    pub fn new(ffmpeg_path: impl Into<String>) -> Result<Self> {
        let ffmpeg_path = ffmpeg_path.into();
        crate::probe::validate_binary_path(&ffmpeg_path).context("Invalid ffmpeg_path")?;
        Ok(Self { ffmpeg_path })
    }

    /// Compute sample timestamps for a clip.
    ///
    /// One frame per 5 seconds of footage, at least one frame per clip,
    /// spread evenly and never at exactly t=0 (some decoders fail there).
    pub fn sample_timestamps(duration: f64) -> Vec<f64> {
        let duration = if duration <= 0.0 {
            FALLBACK_DURATION_SECS
        } else {
            duration
        };

        let frame_count = ((duration / SAMPLE_INTERVAL_SECS).floor() as usize).max(1);

        (1..=frame_count)
            .map(|i| {
                let t = (i as f64 * duration / (frame_count as f64 + 1.0)).floor();
                t.max(0.5)
            })
            .collect()
    }
}

#[async_trait]
impl FrameExtractor for FrameSampler {
    /// Extract one still per sampled timestamp into `scratch_dir`.
    ///
    /// Any ffmpeg failure aborts the run; a clip we cannot decode frames
    /// from cannot be moderated.
    #[tracing::instrument(skip(self, input_url, scratch_dir), fields(
        process.executable.path = %self.ffmpeg_path,
        ffmpeg.operation = "extract_frames"
    ))]
    async fn extract(
        &self,
        input_url: &str,
        duration: f64,
        scratch_dir: &Path,
    ) -> Result<FrameSet, PipelineError> {
        let start = std::time::Instant::now();
        let timestamps = Self::sample_timestamps(duration);
        let mut paths = Vec::with_capacity(timestamps.len());

        for (index, timestamp) in timestamps.iter().enumerate() {
            let frame_path = scratch_dir.join(format!("frame-{:03}.jpg", index + 1));

            let output = Command::new(&self.ffmpeg_path)
                .args(["-ss", &timestamp.to_string(), "-i", input_url])
                .args(["-frames:v", "1", "-vf", "scale=640:-2", "-y"])
                .arg(&frame_path)
                .stdout(Stdio::null())
                .stderr(Stdio::piped())
                .output()
                .await
                .context("Failed to execute ffmpeg")
                .map_err(PipelineError::fatal)?;

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(PipelineError::fatal(anyhow!(
                    "ffmpeg frame extraction failed at t={}: {}",
                    timestamp,
                    stderr
                )));
            }

            paths.push(frame_path);
        }

        let elapsed = start.elapsed();
        tracing::info!(
            duration_ms = elapsed.as_millis(),
            frame_count = paths.len(),
            "Frame extraction completed"
        );

        Ok(FrameSet::new(paths))
    }
}
