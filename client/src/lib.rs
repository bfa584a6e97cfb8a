//! # Ballot Client
//!
//! Networked half of the ballot admin tool. It talks to a remote
//! collections/objects REST API and keeps each managed collection in a
//! [`ballot_engine::Reconciler`], so changes appear at once and are reverted
//! when the API refuses them.
//!
//! ```no_run
//! use ballot_client::{AdminApp, Config};
//!
//! # async fn run() -> ballot_client::Result<()> {
//! let app = AdminApp::new(Config::from_env()?)?;
//! app.sign_in("admin", "secret").await?;
//! let stats = app.dashboard().await?;
//! println!("{} votes", stats.total_votes);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod app;
pub mod audit;
pub mod auth;
pub mod collection;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod models;
pub mod notify;
pub mod session;

pub use api::{ApiClient, Credentials, ListQuery, Resource};
pub use app::AdminApp;
pub use audit::{ApiAuditLogger, TracingAuditLogger};
pub use auth::Authenticator;
pub use collection::ManagedCollection;
pub use config::{Config, ConfigError};
pub use dashboard::{DashboardStats, VoteShare};
pub use error::{ClientError, Result};
pub use notify::TracingNotifier;
pub use session::{CurrentUser, Session, SessionStore};
