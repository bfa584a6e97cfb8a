//! The admin application: everything the screens and the CLI share.

use crate::api::{ApiClient, ListQuery, Resource};
use crate::audit::ApiAuditLogger;
use crate::auth::Authenticator;
use crate::collection::ManagedCollection;
use crate::config::Config;
use crate::dashboard::DashboardStats;
use crate::error::Result;
use crate::models::{collections, from_items, AdminUser, Candidate, Faq, SessionUser};
use crate::notify::TracingNotifier;
use crate::session::{CurrentUser, Session, SessionStore};
use ballot_engine::{AuditLogger, Notifier};
use std::sync::Arc;

/// Shared state of the admin tool.
pub struct AdminApp {
    pub config: Arc<Config>,
    pub api: ApiClient,
    pub auth: Authenticator,
    pub candidates: ManagedCollection,
    pub users: ManagedCollection,
    pub faqs: ManagedCollection,
    current_user: CurrentUser,
    api_audit: Option<Arc<ApiAuditLogger>>,
}

impl AdminApp {
    /// Build the app with log-line notifications and audit events stored
    /// through the data API.
    pub fn new(config: Config) -> Result<Self> {
        let api = ApiClient::new(&config)?;
        let audit = Arc::new(ApiAuditLogger::new(api.clone()));
        let mut app = Self::with_parts(config, api, Arc::new(TracingNotifier), audit.clone())?;
        app.api_audit = Some(audit);
        Ok(app)
    }

    /// Build the app around caller-supplied notifier and audit logger.
    pub fn with_parts(
        config: Config,
        api: ApiClient,
        notifier: Arc<dyn Notifier>,
        audit: Arc<dyn AuditLogger>,
    ) -> Result<Self> {
        let current_user = CurrentUser::new();
        let auth = Authenticator::new(
            api.clone(),
            SessionStore::new(config.session_file.clone()),
            current_user.clone(),
            audit.clone(),
            config.session_max_age,
        );

        let collection = |name: &str, label: &str| {
            ManagedCollection::new(
                Resource::collection(name),
                label,
                api.clone(),
                notifier.clone(),
                audit.clone(),
                current_user.clone(),
            )
        };

        Ok(Self {
            candidates: collection(collections::CANDIDATES, "Candidate"),
            users: collection(collections::USERS, "User"),
            faqs: collection(collections::FAQS, "FAQ"),
            config: Arc::new(config),
            api,
            auth,
            current_user,
            api_audit: None,
        })
    }

    /// Wait until audit events sent to the data API have been delivered.
    pub async fn flush_audit(&self) {
        if let Some(audit) = &self.api_audit {
            audit.flush().await;
        }
    }

    pub fn current_user(&self) -> Option<SessionUser> {
        self.current_user.get()
    }

    /// Sign in; `Ok(None)` when a newer sign-in superseded this one.
    pub async fn sign_in(&self, username: &str, password: &str) -> Result<Option<Session>> {
        self.auth.sign_in(username, password).await
    }

    /// Resume the stored session.
    pub async fn restore(&self) -> Result<Session> {
        self.auth.restore().await
    }

    /// Sign out and drop every locally held list.
    pub async fn sign_out(&self) -> Result<()> {
        self.auth.sign_out().await?;
        for collection in self.collections() {
            collection.clear();
        }
        Ok(())
    }

    fn collections(&self) -> [&ManagedCollection; 3] {
        [&self.candidates, &self.users, &self.faqs]
    }

    pub async fn load_candidates(&self) -> Result<Vec<Candidate>> {
        let items = self
            .candidates
            .load(&ListQuery::new().order("name"))
            .await?;
        from_items(&items)
    }

    pub async fn load_users(&self) -> Result<Vec<AdminUser>> {
        let items = self
            .users
            .load(&ListQuery::new().order("username"))
            .await?;
        from_items(&items)
    }

    pub async fn load_faqs(&self) -> Result<Vec<Faq>> {
        let items = self.faqs.load(&ListQuery::new().order("order")).await?;
        from_items(&items)
    }

    /// Load every collection and aggregate.
    pub async fn dashboard(&self) -> Result<DashboardStats> {
        let (candidates, users, faqs) = futures::try_join!(
            self.load_candidates(),
            self.load_users(),
            self.load_faqs()
        )?;
        Ok(DashboardStats::compute(&candidates, &users, &faqs))
    }

    /// Vote for a candidate as the current user. The candidate list is
    /// loaded first if it is not held yet.
    pub async fn vote(&self, candidate_id: &str) -> Result<()> {
        if self.candidates.reconciler().is_empty() {
            self.load_candidates().await?;
        }
        self.candidates.vote(candidate_id).await
    }
}
