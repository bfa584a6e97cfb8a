//! # Ballot Engine
//!
//! Optimistic state handling for the ballot administration tool.
//!
//! This crate holds the client-side lists an admin works on (candidates,
//! users, FAQ entries) and applies changes to them before the remote data API
//! confirms them. It has no knowledge of HTTP; callers hand in the network
//! call as a future.
//!
//! ## Design Principles
//!
//! - **No IO**: the engine never talks to the network or the filesystem
//! - **Undo per operation**: every speculative change carries its own undo
//! - **One turn per item**: operations on the same item settle one at a time
//! - **Injected capabilities**: notifications and audit events go through traits
//!
//! ## Core Concepts
//!
//! ### Items
//!
//! An [`Item`] is any record with an `id`, free-form JSON fields and three
//! transient flags (`_isOptimistic`, `_isOptimisticVote`, `_hasVoted`).
//!
//! ### Ledger
//!
//! The [`Ledger`] maps each in-flight [`UpdateId`] to a [`PendingUpdate`]:
//! the list before the change and the procedure that undoes it.
//!
//! ### Reconciler
//!
//! The [`Reconciler`] exposes five entry points that share one pattern,
//! apply now, notify, await the network, then keep or undo:
//! - [`Reconciler::optimistic_update`]
//! - [`Reconciler::optimistic_patch`]
//! - [`Reconciler::optimistic_create`]
//! - [`Reconciler::optimistic_delete`]
//! - [`Reconciler::optimistic_vote`]
//!
//! ### Roles
//!
//! [`Roles`] normalizes the polymorphic role field of user payloads into the
//! closed [`Role`] type and answers display questions about it.
//!
//! ## Quick Start
//!
//! ```rust
//! use ballot_engine::{Item, Messages, MemoryNotifier, Reconciler};
//! use futures::executor::block_on;
//! use serde_json::Map;
//! use std::sync::Arc;
//!
//! let notifier = MemoryNotifier::new();
//! let mut candidate = Item::new("cand-1", Map::new());
//! candidate.set_vote_count(5);
//!
//! let reconciler = Reconciler::with_items(vec![candidate], Arc::new(notifier.clone()));
//!
//! let result: Result<(), ballot_engine::Error> = block_on(reconciler.optimistic_vote(
//!     "cand-1",
//!     "voter-1",
//!     async { Ok(()) },
//!     &Messages::new("Vote recorded", "Vote failed"),
//! ));
//!
//! assert!(result.is_ok());
//! assert_eq!(reconciler.item("cand-1").unwrap().vote_count(), 6);
//! assert_eq!(notifier.sent().len(), 1);
//! ```

pub mod audit;
pub mod error;
pub mod item;
pub mod ledger;
pub mod notify;
pub mod reconcile;
pub mod role;

// Re-export main types at crate root
pub use audit::{AuditEvent, AuditLogger, MemoryAuditLog};
pub use error::Error;
pub use item::{Item, TEMP_ID_PREFIX, VOTE_COUNT_FIELD};
pub use ledger::{
    system_millis, ClockFn, Ledger, PendingUpdate, RollbackFn, UpdateKind, UPDATE_ID_PREFIX,
};
pub use notify::{
    MemoryNotifier, Messages, Notification, NotificationKind, Notifier, NullNotifier,
};
pub use reconcile::Reconciler;
pub use role::{Role, Roles};

/// Type aliases for clarity
pub type ItemId = String;
pub type UpdateId = String;
pub type Timestamp = u64;
