//! Domain types read from the data API.
//!
//! Collections are held by the engine as free-form [`Item`]s; these types are
//! the typed view used for display and aggregation.

use crate::error::Result;
use ballot_engine::{Item, Roles};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Collection names used by the admin tool.
pub mod collections {
    pub const CANDIDATES: &str = "candidates";
    pub const USERS: &str = "users";
    pub const FAQS: &str = "faqs";
    pub const VOTES: &str = "votes";
    pub const AUDIT_LOGS: &str = "audit_logs";
}

fn roles_from_value<'de, D>(deserializer: D) -> std::result::Result<Roles, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Roles::from_value(&value).map_err(serde::de::Error::custom)
}

/// The signed-in user as stored in the local session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, alias = "role", deserialize_with = "roles_from_value")]
    pub roles: Roles,
}

impl SessionUser {
    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }
}

/// A candidate standing in the vote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub party: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub vote_count: u64,
}

/// An account managed from the admin screens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUser {
    pub id: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, alias = "role", deserialize_with = "roles_from_value")]
    pub roles: Roles,
    #[serde(default)]
    pub has_voted: bool,
}

/// A frequently asked question shown to voters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Faq {
    pub id: String,
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub order: i64,
}

/// One cast vote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    pub id: String,
    pub candidate_id: String,
    pub voter_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// Typed view of an engine item.
pub trait FromItem: Sized {
    fn from_item(item: &Item) -> Result<Self>;
}

impl<T> FromItem for T
where
    T: for<'de> Deserialize<'de>,
{
    fn from_item(item: &Item) -> Result<Self> {
        Ok(serde_json::from_value(item.to_value())?)
    }
}

/// Convert every item, failing on the first one that does not fit.
pub fn from_items<T: FromItem>(items: &[Item]) -> Result<Vec<T>> {
    items.iter().map(T::from_item).collect()
}
