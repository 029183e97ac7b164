use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "processing_status", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl Display for ProcessingStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ProcessingStatus::Pending => write!(f, "pending"),
            ProcessingStatus::Processing => write!(f, "processing"),
            ProcessingStatus::Completed => write!(f, "completed"),
            ProcessingStatus::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "sensitivity_status", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum SensitivityStatus {
    Pending,
    Safe,
    Flagged,
}

impl Display for SensitivityStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            SensitivityStatus::Pending => write!(f, "pending"),
            SensitivityStatus::Safe => write!(f, "SAFE"),
            SensitivityStatus::Flagged => write!(f, "FLAGGED"),
        }
    }
}

/// The persisted safety analysis block for a completed run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SensitivityAnalysis {
    pub is_safe: bool,
    pub confidence: f64,
    pub flags: Vec<String>,
    pub summary: String,
    pub analyzed_at: DateTime<Utc>,
}

/// A tenant-owned video asset.
///
/// Created by upload intake with Pending/Pending statuses; from that point
/// only the processing pipeline mutates it until the run reaches a terminal
/// state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoAsset {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub uploader_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub original_filename: String,
    pub storage_key: String,
    pub mime_type: String,
    /// Declared size in bytes; 0 means unknown until probed.
    pub size: i64,
    /// Duration in seconds; 0.0 means unknown until probed.
    pub duration: f64,
    pub processing_status: ProcessingStatus,
    pub sensitivity_status: SensitivityStatus,
    pub processing_progress: i32,
    pub sensitivity_analysis: Option<SensitivityAnalysis>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied by upload intake when registering a new asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewVideoAsset {
    pub tenant_id: Uuid,
    pub uploader_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub original_filename: String,
    pub storage_key: String,
    pub mime_type: String,
    pub size: i64,
}

/// The terminal write of a successful run, applied in one atomic update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingOutcome {
    pub sensitivity_analysis: SensitivityAnalysis,
    pub duration: f64,
    pub size: i64,
    pub processing_status: ProcessingStatus,
    pub sensitivity_status: SensitivityStatus,
    pub processing_progress: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn processing_status_display() {
        assert_eq!(ProcessingStatus::Pending.to_string(), "pending");
        assert_eq!(ProcessingStatus::Failed.to_string(), "failed");
    }

    #[test]
    fn sensitivity_status_display_matches_event_wording() {
        assert_eq!(SensitivityStatus::Safe.to_string(), "SAFE");
        assert_eq!(SensitivityStatus::Flagged.to_string(), "FLAGGED");
    }

    #[test]
    fn sensitivity_analysis_round_trips_json() {
        let analysis = SensitivityAnalysis {
            is_safe: false,
            confidence: 0.92,
            flags: vec!["violence".to_string()],
            summary: "Weapon visible in frame 2".to_string(),
            analyzed_at: Utc::now(),
        };

        let json = serde_json::to_string(&analysis).unwrap();
        let back: SensitivityAnalysis = serde_json::from_str(&json).unwrap();
        assert_eq!(back, analysis);
    }

    #[test]
    fn statuses_serialize_lowercase() {
        assert_eq!(
            serde_json::to_string(&ProcessingStatus::Completed).unwrap(),
            "\"completed\""
        );
        assert_eq!(
            serde_json::to_string(&SensitivityStatus::Flagged).unwrap(),
            "\"flagged\""
        );
    }
}
