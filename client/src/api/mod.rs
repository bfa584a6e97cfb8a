//! Remote data API access.

mod client;
mod resource;

pub use client::{ApiClient, Credentials, LoginResponse, APP_ID_HEADER, MASTER_KEY_HEADER};
pub use resource::{ListQuery, Resource};
