//! Addressing of remote resources.

use serde_json::Value;
use std::fmt;

/// A named resource group in the data API.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Resource {
    /// Schema-backed table, served under `/collections/<name>`
    Collection(String),
    /// Free-form object store, served under `/objects/<name>`
    Object(String),
}

impl Resource {
    pub fn collection(name: impl Into<String>) -> Self {
        Resource::Collection(name.into())
    }

    pub fn object(name: impl Into<String>) -> Self {
        Resource::Object(name.into())
    }

    /// The bare resource name.
    pub fn name(&self) -> &str {
        match self {
            Resource::Collection(name) | Resource::Object(name) => name,
        }
    }

    /// Path relative to the API base URL.
    pub fn path(&self) -> String {
        match self {
            Resource::Collection(name) => format!("collections/{name}"),
            Resource::Object(name) => format!("objects/{name}"),
        }
    }

    /// Path segments under the API base URL. Item ids are appended as one
    /// more segment and escaped by the client.
    pub fn segments(&self) -> [&str; 2] {
        match self {
            Resource::Collection(name) => ["collections", name],
            Resource::Object(name) => ["objects", name],
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Filter, ordering and paging for list requests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListQuery {
    /// JSON constraint object, sent as the `where` parameter
    pub filter: Option<Value>,
    /// Sort key; prefix with `-` for descending
    pub order: Option<String>,
    pub limit: Option<u32>,
    pub skip: Option<u32>,
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Value) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn order(mut self, order: impl Into<String>) -> Self {
        self.order = Some(order.into());
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn skip(mut self, skip: u32) -> Self {
        self.skip = Some(skip);
        self
    }

    /// Query-string pairs for the request.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(filter) = &self.filter {
            pairs.push(("where", filter.to_string()));
        }
        if let Some(order) = &self.order {
            pairs.push(("order", order.clone()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(skip) = self.skip {
            pairs.push(("skip", skip.to_string()));
        }
        pairs
    }
}
