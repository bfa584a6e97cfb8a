//! Managed collections.
//!
//! A [`ManagedCollection`] binds one remote collection to one reconciler: it
//! loads the list, and every change it makes shows up locally at once and is
//! undone if the data API rejects it. Successful changes are audited.

use crate::api::{ApiClient, ListQuery, Resource};
use crate::error::{ClientError, Result};
use crate::models::collections;
use crate::session::CurrentUser;
use ballot_engine::{
    system_millis, AuditEvent, AuditLogger, Item, Messages, Notifier, Reconciler,
};
use serde_json::{json, Map, Value};
use std::sync::Arc;

/// One remote collection and its locally held list.
#[derive(Clone)]
pub struct ManagedCollection {
    resource: Resource,
    label: String,
    api: ApiClient,
    reconciler: Reconciler,
    audit: Arc<dyn AuditLogger>,
    current_user: CurrentUser,
}

impl std::fmt::Debug for ManagedCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedCollection")
            .field("resource", &self.resource)
            .field("label", &self.label)
            .field("reconciler", &self.reconciler)
            .finish_non_exhaustive()
    }
}

impl ManagedCollection {
    /// `label` is the singular display name used in notifications.
    pub fn new(
        resource: Resource,
        label: impl Into<String>,
        api: ApiClient,
        notifier: Arc<dyn Notifier>,
        audit: Arc<dyn AuditLogger>,
        current_user: CurrentUser,
    ) -> Self {
        Self {
            resource,
            label: label.into(),
            api,
            reconciler: Reconciler::new(notifier),
            audit,
            current_user,
        }
    }

    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    /// The reconciler holding this collection's list.
    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// Snapshot of the visible list.
    pub fn items(&self) -> Vec<Item> {
        self.reconciler.items()
    }

    /// Drop the list and any pending updates.
    pub fn clear(&self) {
        self.reconciler.clear();
    }

    fn messages(&self, done: &str, verb: &str) -> Messages {
        Messages::new(
            format!("{} {}", self.label, done),
            format!(
                "Could not {} {}, changes were reverted",
                verb,
                self.label.to_lowercase()
            ),
        )
    }

    fn audit(&self, action: &str, target_id: &str, details: Value) {
        let mut event = AuditEvent::new(action, system_millis())
            .collection(self.resource.name())
            .target(target_id)
            .details(details);
        if let Some(actor) = self.current_user.id() {
            event = event.actor(actor);
        }
        self.audit.record(event);
    }

    /// Fetch the list from the server and show it.
    pub async fn load(&self, query: &ListQuery) -> Result<Vec<Item>> {
        let values = self.api.list(&self.resource, query).await?;
        let items = values
            .into_iter()
            .map(Item::from_value)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        tracing::debug!(resource = %self.resource, count = items.len(), "loaded");
        self.reconciler.replace_items(items.clone())?;
        Ok(items)
    }

    /// Create an item. The server response is merged over `fields`, since
    /// some deployments only echo the new id.
    pub async fn create(&self, fields: Map<String, Value>) -> Result<Item> {
        let api = self.api.clone();
        let resource = self.resource.clone();
        let mut merged = fields.clone();

        let request = async move {
            let response = api.create(&resource, &Value::Object(merged.clone())).await?;
            match response {
                Value::Object(stored) => merged.extend(stored),
                other => {
                    return Err(ClientError::InvalidResponse(format!(
                        "create in {resource} returned {other}"
                    )));
                }
            }
            Ok::<_, ClientError>(Item::from_value(Value::Object(merged))?)
        };

        let created = self
            .reconciler
            .optimistic_create(fields, request, &self.messages("created", "create"))
            .await?;

        self.audit("create", &created.id, Value::Null);
        Ok(created)
    }

    /// Change some fields of an item.
    ///
    /// If the server refuses, only this item is put back as it was; other
    /// items changed in the meantime keep their state.
    pub async fn update(&self, id: &str, patch: Map<String, Value>) -> Result<Item> {
        let body = Value::Object(patch.clone());

        self.reconciler
            .optimistic_patch(
                id,
                patch,
                self.api.patch(&self.resource, id, &body),
                &self.messages("updated", "update"),
            )
            .await?;

        self.audit("update", id, body);
        self.reconciler
            .item(id)
            .ok_or_else(|| ballot_engine::Error::ItemNotFound(id.to_string()).into())
    }

    /// Delete an item.
    pub async fn delete(&self, id: &str) -> Result<()> {
        self.reconciler
            .optimistic_delete(
                id,
                self.api.delete(&self.resource, id),
                &self.messages("deleted", "delete"),
            )
            .await?;

        self.audit("delete", id, Value::Null);
        Ok(())
    }

    /// Cast the current user's vote for `candidate_id`.
    ///
    /// Stores a vote record, then writes the candidate's new counter.
    pub async fn vote(&self, candidate_id: &str) -> Result<()> {
        let voter_id = self.current_user.id().ok_or(ClientError::NotSignedIn)?;

        let api = self.api.clone();
        let resource = self.resource.clone();
        let reconciler = self.reconciler.clone();
        let candidate = candidate_id.to_string();
        let voter = voter_id.clone();

        // Polled only after the increment is applied, so the counter read
        // here already includes this vote.
        let request = async move {
            let votes = Resource::collection(collections::VOTES);
            let record = api
                .create(&votes, &json!({ "candidateId": candidate, "voterId": voter }))
                .await?;

            let counted = match reconciler.item(&candidate) {
                Some(item) => api
                    .patch(&resource, &candidate, &json!({ "voteCount": item.vote_count() }))
                    .await
                    .map(drop),
                None => Err(ballot_engine::Error::ItemNotFound(candidate.clone()).into()),
            };

            // The vote record must not outlive a counter that was never written.
            if let Err(e) = counted {
                match record.get("id").and_then(Value::as_str) {
                    Some(record_id) => {
                        if let Err(cleanup) = api.delete(&votes, record_id).await {
                            tracing::warn!(record_id, "Failed to remove vote record: {}", cleanup);
                        }
                    }
                    None => tracing::warn!(%candidate, "Vote record stored without an id"),
                }
                return Err(e);
            }
            Ok::<_, ClientError>(())
        };

        self.reconciler
            .optimistic_vote(
                candidate_id,
                &voter_id,
                request,
                &Messages::new(
                    "Vote recorded",
                    "Could not record the vote, changes were reverted",
                ),
            )
            .await?;

        self.audit("vote", candidate_id, json!({ "voterId": voter_id }));
        Ok(())
    }
}
