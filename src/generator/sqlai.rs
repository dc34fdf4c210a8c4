//! Live SQLAI text-to-SQL client.
//!
//! Every HTTP-layer failure is translated into a [`GenerationError`] carrying
//! the upstream status and detail; nothing here panics or retries.

use std::sync::LazyLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::{debug, warn};

use super::{GenerationError, GenerationErrorKind, GenerationResult, SqlGenerator, ERROR_MARKER};
use crate::config::GeneratorConfig;
use crate::error::{AppError, Result};

/// Key value shipped in sample configuration files; treated as absent.
pub const PLACEHOLDER_API_KEY: &str = "your-SQLAI-api-key-here";

const AUTH_FAILED: &str =
    "SQLAI Authentication Failed (401). Check your API Key's validity and subscription status.";

static SQL_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^```[a-z]*\s*(.*?)\s*```$").expect("fence pattern is valid")
});

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SqlAiRequest<'a> {
    prompt: &'a str,
    engine: &'a str,
    mode: &'static str,
    data_source: &'a str,
}

/// Client for the SQLAI v2 public endpoint.
#[derive(Debug, Clone)]
pub struct SqlAiClient {
    api_key: String,
    api_url: String,
    engine: String,
    timeout: Duration,
    client: Client,
}

impl SqlAiClient {
    /// Builds the client. Fails when the key is absent, blank or the
    /// placeholder value, or when the HTTP client cannot be built.
    pub fn new(config: &GeneratorConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty() && *key != PLACEHOLDER_API_KEY)
            .ok_or_else(|| {
                AppError::config("SQLAI API key is missing or is the default placeholder.")
            })?
            .to_string();

        let timeout = Duration::from_secs(config.timeout_secs);
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            api_key,
            api_url: config.api_url.clone(),
            engine: config.engine.clone(),
            timeout,
            client,
        })
    }

    fn request_failure(&self, error: &reqwest::Error) -> GenerationError {
        if error.is_timeout() {
            GenerationError::new(
                GenerationErrorKind::Timeout,
                format!(
                    "SQLAI request timed out after {} seconds",
                    self.timeout.as_secs()
                ),
            )
        } else {
            GenerationError::new(
                GenerationErrorKind::Network,
                format!("SQLAI Network Error: {error}"),
            )
        }
    }
}

#[async_trait]
impl SqlGenerator for SqlAiClient {
    async fn generate(&self, question: &str, schema: &str) -> GenerationResult {
        let request = SqlAiRequest {
            prompt: question,
            engine: &self.engine,
            mode: "textToSQL",
            data_source: schema,
        };

        let start = Instant::now();
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.request_failure(&e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| self.request_failure(&e))?;

        debug!(
            status = status.as_u16(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "SQLAI responded"
        );

        if !status.is_success() {
            let error = classify_http_failure(status.as_u16(), &body);
            warn!(kind = %error.kind, "SQLAI request failed: {}", error.message);
            return Err(error);
        }

        extract_sql(&body)
    }
}

/// Maps a non-success HTTP response to a generation error.
///
/// The detail comes from the body's `error`, `detail` or `message` field,
/// else the raw body, else the status reason.
pub fn classify_http_failure(status: u16, body: &str) -> GenerationError {
    if status == StatusCode::UNAUTHORIZED.as_u16() {
        return GenerationError::new(GenerationErrorKind::Authentication, AUTH_FAILED);
    }

    let detail = error_detail(body)
        .or_else(|| {
            let trimmed = body.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
        .or_else(|| {
            StatusCode::from_u16(status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .map(str::to_string)
        })
        .unwrap_or_else(|| "Unknown error".to_string());

    GenerationError::new(
        GenerationErrorKind::Http { status },
        format!("SQLAI HTTP Failed ({status}): {detail}"),
    )
}

fn error_detail(body: &str) -> Option<String> {
    let json: serde_json::Value = serde_json::from_str(body).ok()?;
    ["error", "detail", "message"].iter().find_map(|key| {
        match json.get(*key)? {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(s.clone()),
            nested => Some(
                nested
                    .get("message")
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
                    .unwrap_or_else(|| nested.to_string()),
            ),
        }
    })
}

/// Pulls the SQL out of a successful response body.
///
/// Takes the first non-blank `query` or `sql` string field, trims it and
/// unwraps a surrounding markdown code fence. A marker-prefixed payload is
/// the service reporting its own failure.
pub fn extract_sql(body: &str) -> GenerationResult {
    let json: serde_json::Value = serde_json::from_str(body).map_err(|e| {
        GenerationError::new(
            GenerationErrorKind::MalformedResponse,
            format!("SQLAI API returned a response that is not valid JSON: {e}"),
        )
    })?;

    let missing = || {
        GenerationError::new(
            GenerationErrorKind::MissingField,
            format!("SQLAI API did not return a valid 'query' in the response: {json}"),
        )
    };

    let raw = ["query", "sql"]
        .iter()
        .filter_map(|key| json.get(*key).and_then(|v| v.as_str()))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .ok_or_else(missing)?;

    if let Some(rest) = raw.strip_prefix(ERROR_MARKER) {
        let message = rest.trim_start_matches(':').trim();
        return Err(GenerationError::new(
            GenerationErrorKind::Upstream,
            if message.is_empty() { raw } else { message },
        ));
    }

    let sql = match SQL_FENCE.captures(raw) {
        Some(caps) => caps.get(1).map_or("", |m| m.as_str()).trim(),
        None => raw,
    };
    if sql.is_empty() {
        return Err(missing());
    }

    Ok(sql.to_string())
}
