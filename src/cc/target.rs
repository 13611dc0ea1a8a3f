//! Target discovery
//!
//! Resolves the API endpoint and bearer token. Tokens are never issued or
//! refreshed here; an existing `cf login` session is reused.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Endpoint and credentials for one installation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CcTarget {
    pub api: String,
    pub token: Option<String>,
    pub skip_ssl_validation: bool,
}

/// Subset of the cf CLI's `config.json`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CfCliConfig {
    #[serde(default)]
    target: String,
    #[serde(default)]
    access_token: String,
    #[serde(default, rename = "SSLDisabled")]
    ssl_disabled: bool,
}

impl CcTarget {
    pub fn new(api: &str, token: Option<String>) -> Self {
        Self {
            api: api.trim_end_matches('/').to_string(),
            token: token.map(|t| strip_bearer(&t)),
            skip_ssl_validation: false,
        }
    }

    /// Resolve the target: explicit values > environment > cf CLI config
    pub fn discover(api: Option<&str>, token: Option<&str>) -> Result<Self> {
        let cli_config = get_cf_config_path()
            .and_then(|path| read_cf_config(&path).ok())
            .unwrap_or_default();

        let api = api
            .map(str::to_string)
            .or_else(|| std::env::var("CF_API").ok())
            .or_else(|| Some(cli_config.target.clone()).filter(|t| !t.is_empty()))
            .context("No API endpoint configured. Use --api, set CF_API or run 'cf api'")?;

        let token = token
            .map(str::to_string)
            .or_else(|| std::env::var("CF_TOKEN").ok())
            .or_else(|| Some(cli_config.access_token.clone()).filter(|t| !t.is_empty()));

        if token.is_none() {
            tracing::warn!("No access token found, requests will be unauthenticated");
        }

        let mut target = CcTarget::new(&api, token);
        target.skip_ssl_validation = cli_config.ssl_disabled;
        Ok(target)
    }
}

/// The cf CLI stores `AccessToken` as `bearer <jwt>`
fn strip_bearer(token: &str) -> String {
    let trimmed = token.trim();
    match trimmed.split_once(' ') {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest.trim().to_string(),
        _ => trimmed.to_string(),
    }
}

/// Get the cf CLI configuration file
pub fn get_cf_config_path() -> Option<PathBuf> {
    // CF_HOME replaces the home directory, the file is still under .cf/
    if let Ok(home) = std::env::var("CF_HOME") {
        return Some(PathBuf::from(home).join(".cf").join("config.json"));
    }
    dirs::home_dir().map(|p| p.join(".cf").join("config.json"))
}

fn read_cf_config(path: &Path) -> Result<CfCliConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).context("Failed to parse cf CLI config")
}
