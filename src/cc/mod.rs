//! Cloud Controller API interaction module
//!
//! The engine talks to the platform through the [`CcApi`] trait only, so a
//! scripted adapter can stand in for the real one.
//!
//! # Module Structure
//!
//! - [`target`] - API endpoint and token discovery (flags, env, cf CLI config)
//! - [`http`] - HTTP utilities for REST API calls
//! - [`client`] - Client combining target and HTTP, implementing the adapter traits
//! - [`mock`] - Scripted in-memory adapter for tests
//!
//! # Example
//!
//! ```ignore
//! use cfbackup::cc::{client::CcClient, target::CcTarget, CcApi};
//!
//! async fn example() -> anyhow::Result<()> {
//!     let client = CcClient::new(CcTarget::discover(None, None)?)?;
//!     let body = client.invoke_get("/v2/organizations").await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod http;
pub mod mock;
pub mod target;

use crate::error::Result;
use serde_json::Value;
use std::fmt;

/// Read side of the adapter: one GET by API path
#[allow(async_fn_in_trait)]
pub trait CcApi {
    /// Fetch the raw body at `path` (`/v2/...`)
    async fn invoke_get(&self, path: &str) -> Result<String>;
}

/// HTTP verbs used when writing during restore
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMethod {
    Post,
    Put,
    Delete,
}

impl fmt::Display for WriteMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteMethod::Post => f.write_str("POST"),
            WriteMethod::Put => f.write_str("PUT"),
            WriteMethod::Delete => f.write_str("DELETE"),
        }
    }
}

/// Write side of the adapter
///
/// Returns the response body for any HTTP status; the API reports business
/// errors in-band through `error_code`.
#[allow(async_fn_in_trait)]
pub trait CcWriteApi: CcApi {
    async fn invoke_write(
        &self,
        method: WriteMethod,
        path: &str,
        body: Option<&Value>,
    ) -> Result<String>;
}
