//! Data models for the job marketplace backend.
//!
//! Only the authentication surface is modelled here: the payloads that
//! create or rotate a session, and the `Platform` identifier the backend
//! expects on token refresh.

pub mod auth;

pub use auth::{
    LoginRequest, OtpVerificationRequest, Platform, RefreshRequest, RegisterRequest,
    SessionTokens,
};
