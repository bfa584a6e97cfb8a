//! In-process fake of the collections/objects data API.
//!
//! Serves `/login`, `/collections/<name>` and `/objects/<name>` from memory.
//! Tests can seed data, make the next matching request fail, or hold a
//! request until released.

#![allow(dead_code)]

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, Method, StatusCode},
    routing::{get, post},
    Json, Router,
};
use ballot_client::api::{APP_ID_HEADER, MASTER_KEY_HEADER};
use ballot_client::Config;
use dashmap::DashMap;
use serde_json::{json, Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

pub const APP_ID: &str = "test-app";
pub const MASTER_KEY: &str = "test-master-key";

type Reply = (StatusCode, Json<Value>);

/// One request as the fake server saw it.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub path: String,
    pub master_key: bool,
    pub bearer: Option<String>,
    pub body: Value,
}

#[derive(Default)]
pub struct FakeState {
    /// resource name -> items in insertion order
    data: DashMap<String, Vec<Value>>,
    /// username -> (password, user object)
    accounts: DashMap<String, (String, Value)>,
    /// session token -> user id
    sessions: DashMap<String, String>,
    /// "METHOD name" -> status for the next matching request
    failures: DashMap<String, StatusCode>,
    /// "METHOD name" -> gate the next matching request waits on
    holds: DashMap<String, Arc<Notify>>,
    login_delays: DashMap<String, Duration>,
    requests: Mutex<Vec<Recorded>>,
}

/// A running fake server.
pub struct FakeApi {
    pub url: String,
    pub state: Arc<FakeState>,
}

impl FakeApi {
    pub async fn start() -> Self {
        let state = Arc::new(FakeState::default());

        let routes = Router::new()
            .route("/login", post(login))
            .route("/{kind}/{name}", get(list).post(create))
            .route(
                "/{kind}/{name}/{id}",
                get(fetch).put(replace).patch(patch).delete(remove),
            );
        let app = Router::new()
            .nest("/v1", routes)
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{addr}/v1"),
            state,
        }
    }

    /// Client configuration pointing at this server. Each call gets its own
    /// session file.
    pub fn config(&self) -> Config {
        let mut config = Config::new(&self.url, APP_ID);
        config.session_file = std::env::temp_dir()
            .join(format!("ballot-test-{}", uuid::Uuid::new_v4()))
            .join("session.json");
        config.http_timeout = Duration::from_secs(5);
        config
    }

    pub fn seed(&self, name: &str, items: Vec<Value>) {
        self.state.data.insert(name.to_string(), items);
    }

    pub fn items(&self, name: &str) -> Vec<Value> {
        self.state
            .data
            .get(name)
            .map(|items| items.clone())
            .unwrap_or_default()
    }

    pub fn item(&self, name: &str, id: &str) -> Option<Value> {
        self.items(name).into_iter().find(|item| item["id"] == id)
    }

    pub fn add_account(&self, username: &str, password: &str, user: Value) {
        self.state
            .accounts
            .insert(username.to_string(), (password.to_string(), user));
    }

    /// Make the next `method` request on `name` fail with `status`.
    pub fn fail_next(&self, method: &str, name: &str, status: u16) {
        self.state.failures.insert(
            format!("{method} {name}"),
            StatusCode::from_u16(status).unwrap(),
        );
    }

    /// Hold the next `method` request on `name` until the returned gate is
    /// notified.
    pub fn hold_next(&self, method: &str, name: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.state
            .holds
            .insert(format!("{method} {name}"), gate.clone());
        gate
    }

    pub fn delay_login(&self, username: &str, delay: Duration) {
        self.state
            .login_delays
            .insert(username.to_string(), delay);
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, method: Method, path_prefix: &str) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.path.starts_with(path_prefix))
            .collect()
    }
}

fn error(status: StatusCode, message: &str) -> Reply {
    (status, Json(json!({ "code": status.as_u16(), "error": message })))
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

impl FakeState {
    fn record(&self, method: Method, path: String, headers: &HeaderMap, body: &Value) {
        let master_key = headers
            .get(MASTER_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            == Some(MASTER_KEY);
        let bearer = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(String::from);

        self.requests.lock().unwrap().push(Recorded {
            method,
            path,
            master_key,
            bearer,
            body: body.clone(),
        });
    }

    /// Every request needs the application id. Writes also need the master
    /// key or a live session.
    fn authorize(&self, headers: &HeaderMap, write: bool) -> Result<(), Reply> {
        let app_id = headers.get(APP_ID_HEADER).and_then(|v| v.to_str().ok());
        if app_id != Some(APP_ID) {
            return Err(error(StatusCode::UNAUTHORIZED, "unauthorized"));
        }
        if !write {
            return Ok(());
        }

        let master_key = headers
            .get(MASTER_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            == Some(MASTER_KEY);
        let session = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| self.sessions.contains_key(token));

        if master_key || session {
            Ok(())
        } else {
            Err(error(StatusCode::UNAUTHORIZED, "invalid session token"))
        }
    }

    /// Apply a queued failure or hold for this request.
    async fn intercept(&self, method: &Method, name: &str) -> Result<(), Reply> {
        let key = format!("{method} {name}");
        if let Some((_, gate)) = self.holds.remove(&key) {
            gate.notified().await;
        }
        if let Some((_, status)) = self.failures.remove(&key) {
            return Err(error(status, "injected failure"));
        }
        Ok(())
    }

    async fn guard(
        &self,
        method: Method,
        path: String,
        name: &str,
        headers: &HeaderMap,
        body: &Value,
    ) -> Result<(), Reply> {
        self.record(method.clone(), path, headers, body);
        self.authorize(headers, method != Method::GET)?;
        self.intercept(&method, name).await
    }
}

async fn login(
    State(state): State<Arc<FakeState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Reply {
    state.record(Method::POST, "/login".into(), &headers, &body);
    if let Err(reply) = state.authorize(&headers, false) {
        return reply;
    }

    let username = body["username"].as_str().unwrap_or_default().to_string();
    let password = body["password"].as_str().unwrap_or_default();

    let delay = state.login_delays.get(&username).map(|d| *d);
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    let account = state.accounts.get(&username).map(|a| a.clone());
    match account {
        Some((expected, user)) if expected == password => {
            let token = format!("r:{}", uuid::Uuid::new_v4().simple());
            let user_id = user["id"].as_str().unwrap_or_default().to_string();
            state.sessions.insert(token.clone(), user_id);
            (
                StatusCode::OK,
                Json(json!({ "sessionToken": token, "user": user })),
            )
        }
        _ => error(StatusCode::NOT_FOUND, "Invalid username/password."),
    }
}

fn compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .unwrap_or_default()
            .partial_cmp(&y.as_f64().unwrap_or_default())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

fn matches_filter(item: &Value, filter: &Map<String, Value>) -> bool {
    filter.iter().all(|(key, expected)| &item[key] == expected)
}

async fn list(
    State(state): State<Arc<FakeState>>,
    Path((kind, name)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Reply {
    let path = format!("/{kind}/{name}");
    if let Err(reply) = state
        .guard(Method::GET, path, &name, &headers, &Value::Null)
        .await
    {
        return reply;
    }

    let mut items = state
        .data
        .get(&name)
        .map(|items| items.clone())
        .unwrap_or_default();

    if let Some(filter) = params.get("where") {
        match serde_json::from_str::<Value>(filter) {
            Ok(Value::Object(filter)) => items.retain(|item| matches_filter(item, &filter)),
            _ => return error(StatusCode::BAD_REQUEST, "invalid where"),
        }
    }
    if let Some(order) = params.get("order") {
        let (key, descending) = match order.strip_prefix('-') {
            Some(key) => (key, true),
            None => (order.as_str(), false),
        };
        items.sort_by(|a, b| {
            let ord = compare(&a[key], &b[key]);
            if descending {
                ord.reverse()
            } else {
                ord
            }
        });
    }
    let skip = params
        .get("skip")
        .and_then(|s| s.parse().ok())
        .unwrap_or(0usize);
    let limit = params
        .get("limit")
        .and_then(|s| s.parse().ok())
        .unwrap_or(usize::MAX);
    let items: Vec<Value> = items.into_iter().skip(skip).take(limit).collect();

    (StatusCode::OK, Json(json!({ "results": items })))
}

async fn create(
    State(state): State<Arc<FakeState>>,
    Path((kind, name)): Path<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Reply {
    let path = format!("/{kind}/{name}");
    if let Err(reply) = state
        .guard(Method::POST, path, &name, &headers, &body)
        .await
    {
        return reply;
    }

    let Value::Object(mut fields) = body else {
        return error(StatusCode::BAD_REQUEST, "body must be an object");
    };
    let id = uuid::Uuid::new_v4().simple().to_string()[..10].to_string();
    let created_at = now();
    fields.insert("id".into(), json!(id));
    fields.insert("createdAt".into(), json!(created_at));

    state
        .data
        .entry(name)
        .or_default()
        .push(Value::Object(fields));

    // Like most BaaS backends, only the generated fields come back.
    (
        StatusCode::CREATED,
        Json(json!({ "id": id, "createdAt": created_at })),
    )
}

async fn fetch(
    State(state): State<Arc<FakeState>>,
    Path((kind, name, id)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Reply {
    let path = format!("/{kind}/{name}/{id}");
    if let Err(reply) = state
        .guard(Method::GET, path, &name, &headers, &Value::Null)
        .await
    {
        return reply;
    }

    let found = state
        .data
        .get(&name)
        .and_then(|items| items.iter().find(|item| item["id"] == id.as_str()).cloned());
    match found {
        Some(item) => (StatusCode::OK, Json(item)),
        None => error(StatusCode::NOT_FOUND, "Object not found"),
    }
}

/// Shared body of PUT and PATCH; PUT replaces every field but `id`.
async fn write(
    state: Arc<FakeState>,
    method: Method,
    (kind, name, id): (String, String, String),
    headers: HeaderMap,
    body: Value,
) -> Reply {
    let path = format!("/{kind}/{name}/{id}");
    if let Err(reply) = state
        .guard(method.clone(), path, &name, &headers, &body)
        .await
    {
        return reply;
    }

    let Value::Object(changes) = body else {
        return error(StatusCode::BAD_REQUEST, "body must be an object");
    };
    let Some(mut items) = state.data.get_mut(&name) else {
        return error(StatusCode::NOT_FOUND, "Object not found");
    };
    let Some(Value::Object(item)) = items.iter_mut().find(|item| item["id"] == id.as_str())
    else {
        return error(StatusCode::NOT_FOUND, "Object not found");
    };

    if method == Method::PUT {
        item.retain(|key, _| key == "id" || key == "createdAt");
    }
    item.extend(changes);
    let updated_at = now();
    item.insert("updatedAt".into(), json!(updated_at));

    (StatusCode::OK, Json(json!({ "updatedAt": updated_at })))
}

async fn replace(
    State(state): State<Arc<FakeState>>,
    Path(path): Path<(String, String, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Reply {
    write(state, Method::PUT, path, headers, body).await
}

async fn patch(
    State(state): State<Arc<FakeState>>,
    Path(path): Path<(String, String, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Reply {
    write(state, Method::PATCH, path, headers, body).await
}

async fn remove(
    State(state): State<Arc<FakeState>>,
    Path((kind, name, id)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Reply {
    let path = format!("/{kind}/{name}/{id}");
    if let Err(reply) = state
        .guard(Method::DELETE, path, &name, &headers, &Value::Null)
        .await
    {
        return reply;
    }

    let Some(mut items) = state.data.get_mut(&name) else {
        return error(StatusCode::NOT_FOUND, "Object not found");
    };
    let before = items.len();
    items.retain(|item| item["id"] != id.as_str());
    if items.len() == before {
        return error(StatusCode::NOT_FOUND, "Object not found");
    }
    (StatusCode::OK, Json(json!({})))
}
