//! HTTP client for the remote data API.
//!
//! Every request carries the application id. Privileged requests add the
//! master key; signed-in requests add the session token as a bearer token.

use super::{ListQuery, Resource};
use crate::config::Config;
use crate::error::{ClientError, Result};
use reqwest::header::AUTHORIZATION;
use reqwest::{Method, RequestBuilder, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::{Arc, PoisonError, RwLock};

/// Header carrying the application id.
pub const APP_ID_HEADER: &str = "X-Application-Id";
/// Header carrying the master key.
pub const MASTER_KEY_HEADER: &str = "X-Master-Key";

/// How requests authenticate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Application id only
    Anonymous,
    /// Application id plus master key
    MasterKey(String),
    /// Application id plus bearer session token
    Session(String),
}

/// Response body of a successful sign-in.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub session_token: String,
    /// The signed-in user; some deployments nest it, others inline it
    #[serde(default)]
    pub user: Option<Value>,
    #[serde(flatten)]
    pub rest: serde_json::Map<String, Value>,
}

impl LoginResponse {
    /// The user object, whether nested under `user` or inlined.
    pub fn user_value(&self) -> Value {
        match &self.user {
            Some(user) => user.clone(),
            None => Value::Object(self.rest.clone()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Client for the collections/objects REST API.
///
/// Clones share credentials, so signing in through one clone authenticates
/// all of them.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    app_id: String,
    default_credentials: Credentials,
    credentials: Arc<RwLock<Credentials>>,
}

impl ApiClient {
    /// Build a client from configuration.
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()?;

        let default_credentials = match &config.master_key {
            Some(key) => Credentials::MasterKey(key.clone()),
            None => Credentials::Anonymous,
        };

        Ok(Self {
            http,
            base_url: config.api_url.clone(),
            app_id: config.app_id.clone(),
            credentials: Arc::new(RwLock::new(default_credentials.clone())),
            default_credentials,
        })
    }

    /// Base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Credentials currently in use.
    pub fn credentials(&self) -> Credentials {
        self.credentials
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the credentials of this client and all its clones.
    pub fn set_credentials(&self, credentials: Credentials) {
        *self
            .credentials
            .write()
            .unwrap_or_else(PoisonError::into_inner) = credentials;
    }

    /// Authenticate subsequent requests with a session token.
    pub fn use_session(&self, token: impl Into<String>) {
        self.set_credentials(Credentials::Session(token.into()));
    }

    /// Go back to the configured credentials (master key or anonymous).
    pub fn reset_credentials(&self) {
        self.set_credentials(self.default_credentials.clone());
    }

    /// URL of `segments` under the base URL. Each segment is escaped, so an
    /// id containing `/`, `?` or `#` stays a single segment.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ClientError::InvalidUrl(format!("{}: {e}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|()| ClientError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn resource_url(&self, resource: &Resource, id: Option<&str>) -> Result<Url> {
        let [kind, name] = resource.segments();
        match id {
            Some(id) => self.url(&[kind, name, id]),
            None => self.url(&[kind, name]),
        }
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self
            .http
            .request(method, url)
            .header(APP_ID_HEADER, &self.app_id);

        match self.credentials() {
            Credentials::Anonymous => builder,
            Credentials::MasterKey(key) => builder.header(MASTER_KEY_HEADER, key),
            Credentials::Session(token) => builder.header(AUTHORIZATION, format!("Bearer {token}")),
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Value> {
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = error_message(&body, status);
            tracing::warn!(%status, %message, "API request failed");
            return Err(ClientError::Api { status, message });
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }

    /// List items of a resource.
    ///
    /// Accepts both a bare JSON array and an object with a `results` array.
    pub async fn list(&self, resource: &Resource, query: &ListQuery) -> Result<Vec<Value>> {
        tracing::debug!(%resource, "listing");
        let builder = self
            .request(Method::GET, self.resource_url(resource, None)?)
            .query(&query.to_pairs());

        match self.send(builder).await? {
            Value::Array(items) => Ok(items),
            Value::Object(mut map) => match map.remove("results") {
                Some(Value::Array(items)) => Ok(items),
                _ => Err(ClientError::InvalidResponse(format!(
                    "list of {resource} without results array"
                ))),
            },
            Value::Null => Ok(Vec::new()),
            other => Err(ClientError::InvalidResponse(format!(
                "list of {resource} returned {other}"
            ))),
        }
    }

    /// Fetch one item.
    pub async fn get(&self, resource: &Resource, id: &str) -> Result<Value> {
        tracing::debug!(%resource, id, "fetching");
        let url = self.resource_url(resource, Some(id))?;
        self.send(self.request(Method::GET, url)).await
    }

    /// Create an item; the response carries at least the new `id`.
    pub async fn create(&self, resource: &Resource, body: &Value) -> Result<Value> {
        tracing::debug!(%resource, "creating");
        let url = self.resource_url(resource, None)?;
        self.send(self.request(Method::POST, url).json(body)).await
    }

    /// Replace an item.
    pub async fn update(&self, resource: &Resource, id: &str, body: &Value) -> Result<Value> {
        tracing::debug!(%resource, id, "replacing");
        let url = self.resource_url(resource, Some(id))?;
        self.send(self.request(Method::PUT, url).json(body)).await
    }

    /// Change some fields of an item.
    pub async fn patch(&self, resource: &Resource, id: &str, body: &Value) -> Result<Value> {
        tracing::debug!(%resource, id, "patching");
        let url = self.resource_url(resource, Some(id))?;
        self.send(self.request(Method::PATCH, url).json(body)).await
    }

    /// Delete an item.
    pub async fn delete(&self, resource: &Resource, id: &str) -> Result<()> {
        tracing::debug!(%resource, id, "deleting");
        let url = self.resource_url(resource, Some(id))?;
        self.send(self.request(Method::DELETE, url)).await?;
        Ok(())
    }

    /// Exchange username and password for a session token.
    pub async fn sign_in(&self, username: &str, password: &str) -> Result<LoginResponse> {
        tracing::debug!(username, "signing in");
        let builder = self
            .http
            .post(self.url(&["login"])?)
            .header(APP_ID_HEADER, &self.app_id)
            .json(&json!({ "username": username, "password": password }));

        let value = self.send(builder).await?;
        Ok(serde_json::from_value(value)?)
    }
}

fn error_message(body: &str, status: StatusCode) -> String {
    let parsed = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error.or(b.message));

    match parsed {
        Some(message) => message,
        None if body.trim().is_empty() => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string(),
        None => body.trim().to_string(),
    }
}
