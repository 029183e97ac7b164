//! Gemini-backed frame classification.

use crate::frames::FrameSet;
use crate::moderation::retry::retry_with_budget;
use crate::moderation::ModerationClient;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use base64::Engine;
use reqwest::StatusCode;
use serde_json::json;
use std::time::Duration;
use vidstream_core::models::ModerationVerdict;
use vidstream_core::PipelineError;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

const SAFETY_INSTRUCTION: &str = "You are a content moderation system. Review every provided \
video frame for unsafe content in these categories: nudity, violence, gore, hate speech, and \
dangerous content. Judge the frames collectively and respond with a single verdict.";

/// Moderation client backed by the Gemini `generateContent` endpoint.
///
/// Frames are inlined as base64 JPEG parts in a single request. Rate-limit
/// and unavailable responses are retried on a fixed delay up to the attempt
/// budget; every other failure aborts immediately.
pub struct GeminiModerationClient {
    http_client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    max_attempts: u32,
    retry_delay: Duration,
}

impl GeminiModerationClient {
    pub fn new(
        api_key: String,
        model: String,
        max_attempts: u32,
        retry_delay: Duration,
    ) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to create HTTP client for Gemini API")?;

        Ok(Self {
            http_client,
            api_key,
            model,
            base_url: DEFAULT_BASE_URL.to_string(),
            max_attempts,
            retry_delay,
        })
    }

    /// Point the client at a different host (proxies, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Shorten the inter-attempt delay (tests).
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        )
    }

    async fn build_request_body(&self, frames: &FrameSet) -> Result<serde_json::Value> {
        let mut parts = Vec::with_capacity(frames.len() + 1);

        for path in frames.paths() {
            let data = tokio::fs::read(path)
                .await
                .with_context(|| format!("Failed to read frame {}", path.display()))?;
            let encoded = base64::engine::general_purpose::STANDARD.encode(&data);
            parts.push(json!({
                "inline_data": { "mime_type": "image/jpeg", "data": encoded }
            }));
        }

        parts.push(json!({
            "text": "Classify these video frames and return the safety verdict."
        }));

        Ok(json!({
            "contents": [{ "parts": parts }],
            "systemInstruction": { "parts": [{ "text": SAFETY_INSTRUCTION }] },
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": {
                    "type": "OBJECT",
                    "properties": {
                        "isSafe": { "type": "BOOLEAN" },
                        "flags": { "type": "ARRAY", "items": { "type": "STRING" } },
                        "confidence": { "type": "NUMBER" },
                        "summary": { "type": "STRING" }
                    },
                    "required": ["isSafe", "flags", "confidence", "summary"]
                }
            }
        }))
    }

    /// One HTTP attempt. 429/503 are flagged retryable for the outer budget.
    async fn classify_once(
        &self,
        body: &serde_json::Value,
    ) -> Result<ModerationVerdict, PipelineError> {
        let response = self
            .http_client
            .post(self.endpoint())
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .context("Failed to send request to Gemini API")
            .map_err(PipelineError::fatal)?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::SERVICE_UNAVAILABLE {
            return Err(PipelineError::retryable(anyhow!(
                "Gemini API returned {}",
                status
            )));
        }

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(PipelineError::fatal(anyhow!(
                "Gemini API request failed: {} - {}",
                status,
                error_text
            )));
        }

        let response_json: serde_json::Value = response
            .json()
            .await
            .context("Failed to parse Gemini API response")
            .map_err(PipelineError::fatal)?;

        parse_verdict(&response_json).map_err(PipelineError::fatal)
    }
}

/// Extract the structured verdict from a `generateContent` response and
/// normalize it into bounds.
fn parse_verdict(response: &serde_json::Value) -> Result<ModerationVerdict> {
    let text = response["candidates"][0]["content"]["parts"][0]["text"]
        .as_str()
        .ok_or_else(|| anyhow!("Gemini response missing candidate text"))?;

    let verdict: serde_json::Value =
        serde_json::from_str(text).context("Gemini verdict is not valid JSON")?;

    Ok(ModerationVerdict::normalized(
        verdict["isSafe"].as_bool().unwrap_or(false),
        coerce_confidence(&verdict["confidence"]),
        verdict.get("flags"),
        verdict["summary"].as_str(),
    ))
}

/// The model occasionally returns confidence as a quoted number despite the
/// response schema. Accept numeric strings; anything else becomes 0.0.
fn coerce_confidence(value: &serde_json::Value) -> f64 {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse::<f64>().ok()))
        .unwrap_or(0.0)
}

#[async_trait]
impl ModerationClient for GeminiModerationClient {
    #[tracing::instrument(skip(self, frames), fields(frame_count = frames.len(), model = %self.model))]
    async fn analyze_frames(&self, frames: &FrameSet) -> Result<ModerationVerdict, PipelineError> {
        if frames.is_empty() {
            return Err(PipelineError::fatal(anyhow!(
                "Cannot analyze an empty frame set"
            )));
        }

        let body = self
            .build_request_body(frames)
            .await
            .map_err(PipelineError::fatal)?;

        let verdict = retry_with_budget(self.max_attempts, self.retry_delay, |_| {
            self.classify_once(&body)
        })
        .await?;

        tracing::info!(
            is_safe = verdict.is_safe,
            confidence = verdict.confidence,
            flag_count = verdict.flags.len(),
            "Moderation verdict received"
        );

        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use std::io::Write;
    use tempfile::TempDir;

    fn frame_set_with_one_frame(dir: &TempDir) -> FrameSet {
        let path = dir.path().join("frame-001.jpg");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(&[0xFF, 0xD8, 0xFF, 0xE0]).unwrap();
        FrameSet::new(vec![path])
    }

    fn candidate_response(verdict: serde_json::Value) -> String {
        json!({
            "candidates": [{
                "content": { "parts": [{ "text": verdict.to_string() }] }
            }]
        })
        .to_string()
    }

    fn client(server: &mockito::Server) -> GeminiModerationClient {
        GeminiModerationClient::new(
            "test-key".to_string(),
            "gemini-2.0-flash".to_string(),
            3,
            Duration::from_secs(10),
        )
        .unwrap()
        .with_base_url(server.url())
        .with_retry_delay(Duration::ZERO)
    }

    #[tokio::test]
    async fn successful_verdict_is_normalized() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1beta/models/gemini-2.0-flash:generateContent")
            .match_query(Matcher::UrlEncoded("key".into(), "test-key".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(candidate_response(json!({
                "isSafe": false,
                "flags": ["violence"],
                "confidence": 1.4,
                "summary": ""
            })))
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let frames = frame_set_with_one_frame(&dir);

        let verdict = client(&server).analyze_frames(&frames).await.unwrap();
        assert!(!verdict.is_safe);
        assert_eq!(verdict.confidence, 1.0);
        assert_eq!(verdict.flags, vec!["violence".to_string()]);
        assert_eq!(verdict.summary, "No summary provided");

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn rate_limit_exhausts_budget_with_no_fourth_attempt() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1beta/models/gemini-2.0-flash:generateContent")
            .match_query(Matcher::Any)
            .with_status(429)
            .expect(3)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let frames = frame_set_with_one_frame(&dir);

        let err = client(&server).analyze_frames(&frames).await.unwrap_err();
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("exhausted after 3 attempts"));

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1beta/models/gemini-2.0-flash:generateContent")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body("bad request")
            .expect(1)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let frames = frame_set_with_one_frame(&dir);

        let err = client(&server).analyze_frames(&frames).await.unwrap_err();
        assert!(!err.is_retryable());

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn empty_frame_set_fails_before_any_network_call() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let err = client(&server)
            .analyze_frames(&FrameSet::new(vec![]))
            .await
            .unwrap_err();
        assert!(!err.is_retryable());

        mock.assert_async().await;
    }

    #[test]
    fn malformed_candidate_text_is_an_error() {
        let response = json!({
            "candidates": [{ "content": { "parts": [{ "text": "not json" }] } }]
        });
        assert!(parse_verdict(&response).is_err());
    }

    #[test]
    fn non_numeric_confidence_defaults_to_zero() {
        let response = json!({
            "candidates": [{
                "content": { "parts": [{
                    "text": json!({
                        "isSafe": true,
                        "flags": "not-an-array",
                        "confidence": "high",
                        "summary": "fine"
                    }).to_string()
                }] }
            }]
        });
        let verdict = parse_verdict(&response).unwrap();
        assert!(verdict.is_safe);
        assert_eq!(verdict.confidence, 0.0);
        assert!(verdict.flags.is_empty());
        assert_eq!(verdict.summary, "fine");
    }

    #[test]
    fn quoted_numeric_confidence_is_parsed() {
        let response = json!({
            "candidates": [{
                "content": { "parts": [{
                    "text": json!({
                        "isSafe": false,
                        "flags": ["violence"],
                        "confidence": "0.7",
                        "summary": "violent content"
                    }).to_string()
                }] }
            }]
        });
        let verdict = parse_verdict(&response).unwrap();
        assert_eq!(verdict.confidence, 0.7);
        assert_eq!(verdict.flags, vec!["violence"]);
    }
}
