//! Item type for the locally held lists.

use crate::{error::Result, Error, ItemId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Prefix of identifiers assigned to items that the server has not confirmed yet.
pub const TEMP_ID_PREFIX: &str = "temp_";

/// Field holding the vote counter of a candidate.
pub const VOTE_COUNT_FIELD: &str = "voteCount";

fn is_false(value: &bool) -> bool {
    !*value
}

/// A record in a locally held list (candidate, user, FAQ entry, ...).
///
/// Domain fields are kept as a free-form JSON object so one reconciler can
/// hold any collection. The underscore flags are transient UI state and are
/// only serialized while set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Server-assigned identifier, or a `temp_` identifier while a create is pending
    pub id: ItemId,
    /// Domain fields
    #[serde(flatten)]
    pub fields: Map<String, Value>,
    /// Creation not yet confirmed by the server
    #[serde(rename = "_isOptimistic", default, skip_serializing_if = "is_false")]
    pub is_optimistic: bool,
    /// Vote increment not yet confirmed by the server
    #[serde(rename = "_isOptimisticVote", default, skip_serializing_if = "is_false")]
    pub is_optimistic_vote: bool,
    /// The acting voter has voted for this item
    #[serde(rename = "_hasVoted", default, skip_serializing_if = "is_false")]
    pub has_voted: bool,
}

impl Item {
    /// Create an item with the given fields and no transient flags.
    pub fn new(id: impl Into<ItemId>, fields: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            fields,
            is_optimistic: false,
            is_optimistic_vote: false,
            has_voted: false,
        }
    }

    /// Parse an item out of a JSON object carrying a string `id`.
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(mut fields) = value else {
            return Err(Error::InvalidItem("expected a JSON object".into()));
        };

        let id = match fields.remove("id") {
            Some(Value::String(id)) if !id.is_empty() => id,
            Some(Value::Number(n)) => n.to_string(),
            Some(other) => {
                return Err(Error::InvalidItem(format!("unusable id: {other}")));
            }
            None => return Err(Error::InvalidItem("missing id".into())),
        };

        let flag = |fields: &mut Map<String, Value>, key: &str| {
            fields
                .remove(key)
                .and_then(|v| v.as_bool())
                .unwrap_or(false)
        };

        Ok(Self {
            is_optimistic: flag(&mut fields, "_isOptimistic"),
            is_optimistic_vote: flag(&mut fields, "_isOptimisticVote"),
            has_voted: flag(&mut fields, "_hasVoted"),
            id,
            fields,
        })
    }

    /// Serialize back into a JSON object (flags included only when set).
    pub fn to_value(&self) -> Value {
        let mut map = self.fields.clone();
        map.insert("id".into(), Value::String(self.id.clone()));
        if self.is_optimistic {
            map.insert("_isOptimistic".into(), Value::Bool(true));
        }
        if self.is_optimistic_vote {
            map.insert("_isOptimisticVote".into(), Value::Bool(true));
        }
        if self.has_voted {
            map.insert("_hasVoted".into(), Value::Bool(true));
        }
        Value::Object(map)
    }

    /// Check whether this item still carries a temporary identifier.
    pub fn is_temporary(&self) -> bool {
        self.id.starts_with(TEMP_ID_PREFIX)
    }

    /// Read a domain field.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Read a string field.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// Set a domain field, returning the previous value.
    pub fn set_field(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.fields.insert(key.into(), value)
    }

    /// Current vote count. Missing, negative or non-numeric counters read as zero.
    pub fn vote_count(&self) -> u64 {
        match self.fields.get(VOTE_COUNT_FIELD) {
            Some(Value::Number(n)) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f > 0.0).map(|f| f as u64))
                .unwrap_or(0),
            _ => 0,
        }
    }

    /// Overwrite the vote count.
    pub fn set_vote_count(&mut self, count: u64) {
        self.fields
            .insert(VOTE_COUNT_FIELD.into(), Value::from(count));
    }

    /// Clear all transient flags.
    pub fn clear_flags(&mut self) {
        self.is_optimistic = false;
        self.is_optimistic_vote = false;
        self.has_voted = false;
    }
}

/// Position of an item in a list.
pub fn position_of(items: &[Item], id: &str) -> Option<usize> {
    items.iter().position(|item| item.id == id)
}
