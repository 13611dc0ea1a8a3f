//! HTTP utilities for Cloud Controller REST API calls

use anyhow::{Context, Result};
use reqwest::{Client, Method};
use serde_json::Value;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

const USER_AGENT: &str = concat!("cfbackup/", env!("CARGO_PKG_VERSION"));

/// Sanitize response body for logging
/// Truncates long responses and strips control characters
pub fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let mut end = MAX_LOG_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... [truncated, {} bytes total]", &body[..end], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// HTTP client wrapper for Cloud Controller calls
#[derive(Clone)]
pub struct CcHttpClient {
    client: Client,
}

impl CcHttpClient {
    /// Create a new HTTP client
    pub fn new(skip_ssl_validation: bool) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .danger_accept_invalid_certs(skip_ssl_validation)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    /// GET a body; non-success statuses are errors
    pub async fn get(&self, url: &str, token: Option<&str>) -> Result<String> {
        tracing::debug!("GET {}", url);

        let mut request = self.client.get(url);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.context("Failed to send request")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read response body")?;

        if !status.is_success() {
            // Security: Only log sanitized/truncated error body to avoid leaking sensitive data
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&body));
            return Err(anyhow::anyhow!("API request failed: {}", status));
        }

        Ok(body)
    }

    /// Send a write request and return the body whatever the status
    pub async fn send(
        &self,
        method: Method,
        url: &str,
        token: Option<&str>,
        body: Option<&Value>,
    ) -> Result<String> {
        tracing::debug!("{} {}", method, url);

        let mut request = self.client.request(method, url);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.context("Failed to send request")?;

        let status = response.status();
        let response_body = response
            .text()
            .await
            .context("Failed to read response body")?;

        if !status.is_success() {
            tracing::warn!("API error: {} - {}", status, sanitize_for_log(&response_body));
        }

        Ok(response_body)
    }
}

/// Format an API error for display
/// Security: Sanitizes error messages to avoid leaking API details
pub fn format_cc_error(error: &anyhow::Error) -> String {
    let error_str = format!("{error:#}");

    if error_str.contains("401") {
        return "Authentication failed. Run 'cf login' or pass --token.".to_string();
    }
    if error_str.contains("403") {
        return "Permission denied. An admin user is required.".to_string();
    }
    if error_str.contains("404") {
        return "Resource not found. Check the API endpoint.".to_string();
    }
    if error_str.contains("429") {
        return "Rate limit exceeded. Please try again later.".to_string();
    }
    if error_str.contains("500") || error_str.contains("503") {
        return "Cloud Controller temporarily unavailable. Please try again.".to_string();
    }

    let sanitized = error_str
        .chars()
        .filter(|c| c.is_ascii_graphic() || *c == ' ')
        .take(120)
        .collect::<String>();

    if sanitized.len() < error_str.len() {
        format!("{}...", sanitized)
    } else {
        sanitized
    }
}
