//! Cloud Controller client
//!
//! Combines the target and HTTP functionality and implements the adapter
//! traits the engine consumes.

use super::http::{format_cc_error, CcHttpClient};
use super::target::CcTarget;
use super::{CcApi, CcWriteApi, WriteMethod};
use crate::error::{BackupError, Result};
use reqwest::Method;
use serde_json::Value;
use url::Url;

#[derive(Clone)]
pub struct CcClient {
    pub target: CcTarget,
    pub http: CcHttpClient,
    base: Url,
}

impl CcClient {
    pub fn new(target: CcTarget) -> anyhow::Result<Self> {
        let base = Url::parse(&target.api)
            .map_err(|e| anyhow::anyhow!("Invalid API endpoint '{}': {}", target.api, e))?;
        let http = CcHttpClient::new(target.skip_ssl_validation)?;
        Ok(Self { target, http, base })
    }

    /// Resolve an API path (`/v2/...`, possibly with a query) against the endpoint
    pub fn url_for(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .map_err(|e| BackupError::transport(path, format!("invalid path: {e}")))
    }

    fn token(&self) -> Option<&str> {
        self.target.token.as_deref()
    }
}

impl CcApi for CcClient {
    async fn invoke_get(&self, path: &str) -> Result<String> {
        let url = self.url_for(path)?;
        self.http
            .get(url.as_str(), self.token())
            .await
            .map_err(|e| BackupError::transport(path, format_cc_error(&e)))
    }
}

impl CcWriteApi for CcClient {
    async fn invoke_write(
        &self,
        method: WriteMethod,
        path: &str,
        body: Option<&Value>,
    ) -> Result<String> {
        let url = self.url_for(path)?;
        let method = match method {
            WriteMethod::Post => Method::POST,
            WriteMethod::Put => Method::PUT,
            WriteMethod::Delete => Method::DELETE,
        };
        self.http
            .send(method, url.as_str(), self.token(), body)
            .await
            .map_err(|e| BackupError::transport(path, format!("{e:#}")))
    }
}
