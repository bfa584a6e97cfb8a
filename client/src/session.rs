//! Locally persisted session.
//!
//! The signed-in user and session token are kept in a small JSON file so the
//! CLI stays signed in between runs. A session older than the configured
//! maximum age no longer grants access.

use crate::error::{ClientError, Result};
use crate::models::SessionUser;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

/// A signed-in session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub current_user: SessionUser,
    pub session_token: String,
    pub issued_at: DateTime<Utc>,
}

impl Session {
    pub fn new(current_user: SessionUser, session_token: impl Into<String>) -> Self {
        Self {
            current_user,
            session_token: session_token.into(),
            issued_at: Utc::now(),
        }
    }

    /// Whether the session is younger than `max_age` at `now`.
    pub fn is_fresh_at(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        let Ok(max_age) = chrono::Duration::from_std(max_age) else {
            return true;
        };
        now >= self.issued_at && now - self.issued_at < max_age
    }

    pub fn is_fresh(&self, max_age: Duration) -> bool {
        self.is_fresh_at(max_age, Utc::now())
    }
}

/// File-backed session storage.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored session; `None` when nobody is signed in.
    pub async fn load(&self) -> Result<Option<Session>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Read the stored session and check that it still grants access.
    pub async fn load_fresh(&self, max_age: Duration) -> Result<Session> {
        let session = self.load().await?.ok_or(ClientError::NotSignedIn)?;
        if !session.is_fresh(max_age) {
            tracing::info!(user = %session.current_user.username, "stored session expired");
            return Err(ClientError::SessionExpired);
        }
        Ok(session)
    }

    pub async fn save(&self, session: &Session) -> Result<()> {
        let contents = serde_json::to_string_pretty(session)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, contents).await?;
        Ok(())
    }

    /// Forget the stored session. Clearing twice is fine.
    pub async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// The user on whose behalf requests are made, shared by the components
/// that need to know it.
#[derive(Debug, Clone, Default)]
pub struct CurrentUser {
    inner: Arc<RwLock<Option<SessionUser>>>,
}

impl CurrentUser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<SessionUser> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn id(&self) -> Option<String> {
        self.get().map(|user| user.id)
    }

    pub fn set(&self, user: SessionUser) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = Some(user);
    }

    pub fn clear(&self) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}
