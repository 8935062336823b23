//! Credential persistence for the authenticated session.
//!
//! This module provides:
//! - `CredentialStore`: access token, refresh token and expiry, with
//!   fail-closed expiry checks and token rotation
//! - `KeyValueStore` backends: in-memory, JSON file, and OS keyring
//!
//! Credentials are created at login, registration or OTP verification,
//! overwritten on every refresh, and cleared on logout or failed refresh.

pub mod credentials;
pub mod storage;

pub use credentials::{
    CredentialStore, Credentials, TokenRefresher, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY,
    SESSION_EXPIRATION_KEY,
};
pub use storage::{FileStore, KeyValueStore, KeyringStore, MemoryStore};
