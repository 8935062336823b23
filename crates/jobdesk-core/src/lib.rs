//! Core library for the jobdesk job marketplace client.
//!
//! The interesting part is the authenticated request pipeline:
//! [`api::RequestGateway`] executes calls against the backend and, when an
//! access token is rejected and the locally recorded session has expired,
//! rotates it through [`auth::CredentialStore`] and replays the call once.

pub mod api;
pub mod auth;
pub mod config;
pub mod i18n;
pub mod models;
pub mod notify;
pub mod utils;

#[cfg(test)]
mod test_support;

pub use api::{ApiClient, GatewayError, OutboundRequest, RequestGateway};
pub use auth::{CredentialStore, Credentials};
pub use config::Config;
