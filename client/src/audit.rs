//! Audit loggers.
//!
//! [`ApiAuditLogger`] stores events in the `audit_logs` collection. Writing
//! an event never blocks or fails the action being audited; failures are
//! only logged.

use crate::api::{ApiClient, Resource};
use crate::models::collections;
use ballot_engine::{AuditEvent, AuditLogger};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;

/// Writes audit events to the log output.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditLogger;

impl AuditLogger for TracingAuditLogger {
    fn record(&self, event: AuditEvent) {
        tracing::info!(
            target: "ballot_client::audit",
            action = %event.action,
            collection = event.collection.as_deref().unwrap_or("-"),
            target_id = event.target_id.as_deref().unwrap_or("-"),
            actor = event.actor.as_deref().unwrap_or("-"),
            "audit"
        );
    }
}

/// Sends audit events to the data API in the background.
///
/// Must be used from within a Tokio runtime.
#[derive(Debug, Clone)]
pub struct ApiAuditLogger {
    api: ApiClient,
    resource: Resource,
    in_flight: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl ApiAuditLogger {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            resource: Resource::collection(collections::AUDIT_LOGS),
            in_flight: Arc::default(),
        }
    }

    /// Wait for every event recorded so far to be sent.
    pub async fn flush(&self) {
        let handles: Vec<_> = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for handle in handles {
            let _ = handle.await;
        }
    }
}

impl AuditLogger for ApiAuditLogger {
    fn record(&self, event: AuditEvent) {
        let body = match serde_json::to_value(&event) {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!("Failed to encode audit event: {}", e);
                return;
            }
        };

        let api = self.api.clone();
        let resource = self.resource.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = api.create(&resource, &body).await {
                tracing::warn!(action = %event.action, "Failed to store audit event: {}", e);
            }
        });

        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        in_flight.retain(|h| !h.is_finished());
        in_flight.push(handle);
    }
}
