//! Resource Fetcher
//!
//! Classifies raw payloads and stitches paginated collections together.

use super::json;
use super::model::{RawResource, ResourceCollection};
use crate::cc::CcApi;
use crate::error::Result;
use serde_json::Value;
use std::collections::HashSet;

/// Shape of a raw payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Collection,
    Single,
}

/// A collection carries `total_results`; anything else is a single resource
pub fn classify(raw: &Value) -> Shape {
    if raw.get("total_results").is_some() {
        Shape::Collection
    } else {
        Shape::Single
    }
}

/// Decoded payload
#[derive(Debug, Clone)]
pub enum Payload {
    Collection(ResourceCollection),
    Single(RawResource),
}

pub fn decode(path: &str, raw: Value) -> Result<Payload> {
    match classify(&raw) {
        Shape::Collection => ResourceCollection::from_value(path, raw).map(Payload::Collection),
        Shape::Single => RawResource::from_value(path, raw).map(Payload::Single),
    }
}

/// GET and parse one path
pub async fn fetch_json<A: CcApi>(api: &A, path: &str) -> Result<Value> {
    let body = api.invoke_get(path).await?;
    json::parse_body(path, &body)
}

/// Stitched members of a collection
#[derive(Debug, Clone, Default)]
pub struct Stitched {
    pub resources: Vec<RawResource>,
    /// `total_results` as reported by the first page
    pub total_reported: u64,
    pub pages: usize,
}

/// Continue a collection from its already fetched first page
///
/// Follows `next_url` until it is empty. A count that disagrees with
/// `total_results` is logged, not treated as a failure.
pub async fn stitch<A: CcApi>(api: &A, url: &str, first: ResourceCollection) -> Result<Stitched> {
    let mut stitched = Stitched {
        total_reported: first.total_results,
        ..Default::default()
    };
    let mut seen_pages = HashSet::from([url.to_string()]);
    let mut page = first;

    loop {
        stitched.pages += 1;
        let page_url = page.next_page().map(str::to_string);
        for resource in std::mem::take(&mut page.resources) {
            stitched.resources.push(RawResource::from_value(url, resource)?);
        }

        tracing::debug!(
            "Retrieved {}/{} from {}",
            stitched.resources.len(),
            stitched.total_reported,
            url
        );

        let Some(next) = page_url else {
            break;
        };
        if !seen_pages.insert(next.clone()) {
            tracing::warn!("Pagination of {} loops back to {}, stopping", url, next);
            break;
        }

        let raw = fetch_json(api, &next).await?;
        page = ResourceCollection::from_value(&next, raw)?;
    }

    if stitched.resources.len() as u64 != stitched.total_reported {
        tracing::warn!(
            "{} reported {} results but {} were retrieved",
            url,
            stitched.total_reported,
            stitched.resources.len()
        );
    }

    Ok(stitched)
}

/// Fetch every member of the collection at `url`
pub async fn fetch_all<A: CcApi>(api: &A, url: &str) -> Result<Stitched> {
    let raw = fetch_json(api, url).await?;
    let first = ResourceCollection::from_value(url, raw)?;
    stitch(api, url, first).await
}
