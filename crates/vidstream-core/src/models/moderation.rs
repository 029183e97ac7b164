use serde::{Deserialize, Serialize};

/// Fallback summary when the classification service returns none.
pub const DEFAULT_SUMMARY: &str = "No summary provided";

/// A normalized classification verdict.
///
/// Instances leaving the moderation client always satisfy
/// `0.0 <= confidence <= 1.0`; construct them through [`ModerationVerdict::normalized`]
/// so malformed upstream values never propagate past that boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModerationVerdict {
    pub is_safe: bool,
    pub confidence: f64,
    pub flags: Vec<String>,
    pub summary: String,
}

impl ModerationVerdict {
    /// Normalize raw upstream fields into a well-formed verdict.
    ///
    /// Confidence: non-finite values become 0.0, then the value is clamped to
    /// [0, 1]. Flags: anything that is not a JSON array of strings becomes
    /// empty. Summary: missing or empty becomes [`DEFAULT_SUMMARY`].
    pub fn normalized(
        is_safe: bool,
        confidence: f64,
        flags: Option<&serde_json::Value>,
        summary: Option<&str>,
    ) -> Self {
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };

        let flags = flags
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|f| f.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();

        let summary = match summary {
            Some(s) if !s.trim().is_empty() => s.to_string(),
            _ => DEFAULT_SUMMARY.to_string(),
        };

        Self {
            is_safe,
            confidence,
            flags,
            summary,
        }
    }
}
