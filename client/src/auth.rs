//! Sign-in and sign-out.
//!
//! Only one sign-in request is in flight at a time: starting a new one
//! aborts the previous one, and an aborted sign-in resolves to `Ok(None)`.

use crate::api::ApiClient;
use crate::error::{ClientError, Result};
use crate::models::SessionUser;
use crate::session::{CurrentUser, Session, SessionStore};
use ballot_engine::{system_millis, AuditEvent, AuditLogger};
use futures::future::{AbortHandle, Abortable, Aborted};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Signs users in and out and keeps the session, the API credentials and the
/// current user in step.
pub struct Authenticator {
    api: ApiClient,
    sessions: SessionStore,
    current_user: CurrentUser,
    audit: Arc<dyn AuditLogger>,
    max_age: Duration,
    in_flight: Mutex<Option<AbortHandle>>,
}

impl Authenticator {
    pub fn new(
        api: ApiClient,
        sessions: SessionStore,
        current_user: CurrentUser,
        audit: Arc<dyn AuditLogger>,
        max_age: Duration,
    ) -> Self {
        Self {
            api,
            sessions,
            current_user,
            audit,
            max_age,
            in_flight: Mutex::new(None),
        }
    }

    /// Sign in, superseding any sign-in still in flight.
    ///
    /// Returns `Ok(None)` when this attempt was itself superseded.
    pub async fn sign_in(&self, username: &str, password: &str) -> Result<Option<Session>> {
        let (handle, registration) = AbortHandle::new_pair();
        {
            let mut slot = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(previous) = slot.replace(handle) {
                previous.abort();
                tracing::debug!("aborted previous sign-in");
            }
        }

        let login = match Abortable::new(self.api.sign_in(username, password), registration).await
        {
            Ok(result) => result?,
            Err(Aborted) => {
                tracing::debug!(username, "sign-in superseded");
                return Ok(None);
            }
        };

        let user = SessionUser::from_value(login.user_value())?;
        let session = Session::new(user, login.session_token);
        self.sessions.save(&session).await?;
        self.activate(&session);

        tracing::info!(user = %session.current_user.username, role = session.current_user.roles.label(), "signed in");
        self.audit.record(
            AuditEvent::new("login", system_millis())
                .collection(crate::models::collections::USERS)
                .target(session.current_user.id.clone())
                .actor(session.current_user.id.clone()),
        );

        Ok(Some(session))
    }

    /// Resume the stored session if it is still fresh.
    pub async fn restore(&self) -> Result<Session> {
        match self.sessions.load_fresh(self.max_age).await {
            Ok(session) => {
                self.activate(&session);
                Ok(session)
            }
            Err(ClientError::SessionExpired) => {
                self.sessions.clear().await?;
                Err(ClientError::SessionExpired)
            }
            Err(e) => Err(e),
        }
    }

    /// Forget the session and fall back to the configured credentials.
    pub async fn sign_out(&self) -> Result<()> {
        if let Some(handle) = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }

        let actor = self.current_user.id();
        self.sessions.clear().await?;
        self.api.reset_credentials();
        self.current_user.clear();

        if let Some(actor) = actor {
            tracing::info!(user = %actor, "signed out");
            self.audit
                .record(AuditEvent::new("logout", system_millis()).actor(actor));
        }
        Ok(())
    }

    pub fn current_user(&self) -> Option<SessionUser> {
        self.current_user.get()
    }

    fn activate(&self, session: &Session) {
        self.api.use_session(session.session_token.clone());
        self.current_user.set(session.current_user.clone());
    }
}
