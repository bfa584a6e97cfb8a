//! Error types for the ballot engine.

use crate::{ItemId, UpdateId};
use thiserror::Error;

/// All possible errors from the ballot engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Lookup errors
    #[error("item not found: {0}")]
    ItemNotFound(ItemId),

    #[error("pending update not found: {0}")]
    UpdateNotFound(UpdateId),

    // State errors
    #[error("cannot replace items while {0} updates are pending")]
    PendingUpdates(usize),

    #[error("invalid item: {0}")]
    InvalidItem(String),

    #[error("invalid role: {0}")]
    InvalidRole(String),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
