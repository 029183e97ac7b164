//! Media metadata extraction via ffprobe.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use tokio::process::Command;
use vidstream_core::PipelineError;

/// Extracts container-level metadata from an input URL.
#[async_trait]
pub trait MetadataProbe: Send + Sync {
    async fn probe(&self, input_url: &str) -> Result<ProbeOutput, PipelineError>;
}

/// Validate that a binary path doesn't contain shell metacharacters or
/// dangerous sequences
pub(crate) fn validate_binary_path(path: &str) -> Result<()> {
    let dangerous_chars = [';', '|', '&', '$', '`', '(', ')', '<', '>', '\n', '\r'];
    if path.chars().any(|c| dangerous_chars.contains(&c)) {
        return Err(anyhow!("Path contains dangerous characters: {}", path));
    }

    if path.contains("..") {
        return Err(anyhow!("Path contains directory traversal: {}", path));
    }

    if !path
        .chars()
        .all(|c| c.is_alphanumeric() || c == '/' || c == '-' || c == '_' || c == '.' || c == '\\')
    {
        return Err(anyhow!("Path contains unsafe characters: {}", path));
    }

    Ok(())
}

/// Container-level metadata extracted from an input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeOutput {
    /// Duration in seconds. 0.0 when the container reports none.
    pub duration: f64,
    /// Container size in bytes. 0 for inputs where ffprobe cannot tell
    /// (streamed URLs without Content-Length).
    pub size: u64,
}

/// Runs ffprobe against presigned URLs to extract duration and size.
pub struct MediaProbe {
    ffprobe_path: String,
}

impl MediaProbe {
    pub fn new(ffprobe_path: impl Into<String>) -> Result<Self> {
        let ffprobe_path = ffprobe_path.into();
        validate_binary_path(&ffprobe_path).context("Invalid ffprobe_path")?;
        Ok(Self { ffprobe_path })
    }
}

#[async_trait]
impl MetadataProbe for MediaProbe {
    /// Probe the input URL. Any failure here is fatal for the run; there is
    /// nothing to retry when the container itself cannot be read.
    #[tracing::instrument(skip(self, input_url), fields(
        process.executable.path = %self.ffprobe_path,
        ffmpeg.operation = "probe"
    ))]
    async fn probe(&self, input_url: &str) -> Result<ProbeOutput, PipelineError> {
        let start = std::time::Instant::now();

        let output = Command::new(&self.ffprobe_path)
            .args(["-v", "quiet", "-print_format", "json", "-show_format"])
            .arg(input_url)
            .output()
            .await
            .context("Failed to execute ffprobe")
            .map_err(PipelineError::fatal)?;

        if !output.status.success() {
            return Err(PipelineError::fatal(anyhow!(
                "ffprobe failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        let probe_data: serde_json::Value = serde_json::from_slice(&output.stdout)
            .context("Failed to parse ffprobe output")
            .map_err(PipelineError::fatal)?;

        let parsed = parse_format(&probe_data).map_err(PipelineError::fatal)?;

        let elapsed = start.elapsed();
        tracing::info!(
            duration_ms = elapsed.as_millis(),
            video_duration = parsed.duration,
            size_bytes = parsed.size,
            "Probe completed"
        );

        Ok(parsed)
    }
}

/// ffprobe reports duration and size as JSON strings inside `format`.
fn parse_format(probe_data: &serde_json::Value) -> Result<ProbeOutput> {
    let format = probe_data
        .get("format")
        .ok_or_else(|| anyhow!("ffprobe output missing format section"))?;

    let duration = format["duration"]
        .as_str()
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);

    let size = format["size"]
        .as_str()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(0);

    Ok(ProbeOutput { duration, size })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_duration_and_size() {
        let data = json!({
            "format": { "duration": "12.480000", "size": "1048576" }
        });
        let out = parse_format(&data).unwrap();
        assert_eq!(out.duration, 12.48);
        assert_eq!(out.size, 1_048_576);
    }

    #[test]
    fn missing_fields_default_to_zero() {
        let data = json!({ "format": {} });
        let out = parse_format(&data).unwrap();
        assert_eq!(out.duration, 0.0);
        assert_eq!(out.size, 0);
    }

    #[test]
    fn unparseable_values_default_to_zero() {
        let data = json!({
            "format": { "duration": "N/A", "size": "N/A" }
        });
        let out = parse_format(&data).unwrap();
        assert_eq!(out.duration, 0.0);
        assert_eq!(out.size, 0);
    }

    #[test]
    fn missing_format_section_is_an_error() {
        assert!(parse_format(&json!({})).is_err());
    }

    #[test]
    fn rejects_dangerous_binary_paths() {
        assert!(MediaProbe::new("ffprobe; rm -rf /").is_err());
        assert!(MediaProbe::new("../bin/ffprobe").is_err());
        assert!(MediaProbe::new("/usr/bin/ffprobe").is_ok());
        assert!(MediaProbe::new("ffprobe").is_ok());
    }
}
