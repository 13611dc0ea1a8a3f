//! Resource models
//!
//! Wire shapes returned by the v2 API and the tree form written to the
//! snapshot document.

use super::json;
use crate::error::{BackupError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Suffix marking a relation link in an entity, e.g. `spaces_url`
pub const URL_SUFFIX: &str = "_url";

/// Single resource as returned by the API
#[derive(Debug, Clone, Deserialize)]
pub struct RawResource {
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub entity: Map<String, Value>,
}

impl RawResource {
    /// Decode a single resource, requiring `metadata.url`
    pub fn from_value(path: &str, value: Value) -> Result<Self> {
        let raw: RawResource = serde_json::from_value(value)
            .map_err(|e| BackupError::parse(path, format!("not a resource: {e}")))?;
        json::get_str(&raw.metadata, "url", path)?;
        Ok(raw)
    }

    pub fn url(&self) -> &str {
        json::opt_str(&self.metadata, "url").unwrap_or_default()
    }
}

/// One page of a paginated collection
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceCollection {
    #[serde(default)]
    pub total_results: u64,
    #[serde(default)]
    pub total_pages: u64,
    #[serde(default)]
    pub next_url: Option<String>,
    #[serde(default)]
    pub prev_url: Option<String>,
    #[serde(default)]
    pub resources: Vec<Value>,
}

impl ResourceCollection {
    pub fn from_value(path: &str, value: Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| BackupError::parse(path, format!("not a collection: {e}")))
    }

    /// Next page to fetch, if any
    pub fn next_page(&self) -> Option<&str> {
        self.next_url.as_deref().filter(|u| !u.is_empty())
    }
}

/// A resource in tree form
///
/// Produced by the cycle breaker, so every child is owned by exactly one
/// parent. `entity` is `None` for a stub: a resource that already appears
/// elsewhere in the document and keeps only its metadata here.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceModel {
    pub metadata: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<BTreeMap<String, EntityValue>>,
}

/// Value held under an entity key
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EntityValue {
    Attribute(Value),
    Resource(Box<ResourceModel>),
    Resources(Vec<ResourceModel>),
}

impl ResourceModel {
    pub fn guid(&self) -> Option<&str> {
        json::opt_str(&self.metadata, "guid")
    }

    pub fn url(&self) -> Option<&str> {
        json::opt_str(&self.metadata, "url")
    }

    pub fn is_stub(&self) -> bool {
        self.entity.is_none()
    }

    pub fn get(&self, key: &str) -> Option<&EntityValue> {
        self.entity.as_ref()?.get(key)
    }

    pub fn attr(&self, key: &str) -> Option<&Value> {
        match self.get(key)? {
            EntityValue::Attribute(v) => Some(v),
            _ => None,
        }
    }

    pub fn child(&self, relation: &str) -> Option<&ResourceModel> {
        match self.get(relation)? {
            EntityValue::Resource(r) => Some(r),
            _ => None,
        }
    }

    pub fn children(&self, relation: &str) -> Option<&[ResourceModel]> {
        match self.get(relation)? {
            EntityValue::Resources(list) => Some(list),
            _ => None,
        }
    }

    /// Visit this resource and every descendant, depth first
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a ResourceModel)) {
        visit(self);
        let Some(entity) = &self.entity else {
            return;
        };
        for value in entity.values() {
            match value {
                EntityValue::Resource(r) => r.walk(visit),
                EntityValue::Resources(list) => list.iter().for_each(|r| r.walk(visit)),
                EntityValue::Attribute(_) => {}
            }
        }
    }
}

/// Relation name for an entity key, e.g. `spaces_url` -> `spaces`
pub fn relation_name(key: &str) -> Option<&str> {
    key.strip_suffix(URL_SUFFIX).filter(|name| !name.is_empty())
}
