use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use tracing::{debug, info, warn};

use crate::models::{Platform, RefreshRequest, SessionTokens};
use crate::utils::parse_timestamp;

use super::storage::KeyValueStore;

/// Storage key for the access token
pub const ACCESS_TOKEN_KEY: &str = "jwt";

/// Storage key for the refresh token
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

/// Storage key for the session expiration timestamp
pub const SESSION_EXPIRATION_KEY: &str = "sessionExpiration";

const ALL_KEYS: [&str; 3] = [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, SESSION_EXPIRATION_KEY];

/// The backend's token-rotation operation.
pub trait TokenRefresher: Send + Sync {
    fn refresh_tokens(&self, request: RefreshRequest) -> BoxFuture<'_, Result<SessionTokens>>;
}

/// Session credentials as persisted. Values are stored verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: String,
}

impl From<SessionTokens> for Credentials {
    fn from(tokens: SessionTokens) -> Self {
        Self {
            access_token: tokens.jwt,
            refresh_token: tokens.refresh_token,
            expires_at: tokens.session_expiration_date,
        }
    }
}

/// Owner of the persisted access token, refresh token and session expiration.
pub struct CredentialStore {
    storage: Arc<dyn KeyValueStore>,
    refresher: Arc<dyn TokenRefresher>,
    platform: Platform,
}

impl CredentialStore {
    pub fn new(
        storage: Arc<dyn KeyValueStore>,
        refresher: Arc<dyn TokenRefresher>,
        platform: Platform,
    ) -> Self {
        Self {
            storage,
            refresher,
            platform,
        }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Read a key, treating storage failures as absence
    fn read(&self, key: &str) -> Option<String> {
        match self.storage.get(key) {
            Ok(value) => value,
            Err(e) => {
                warn!(key = key, error = %e, "Failed to read credential");
                None
            }
        }
    }

    pub fn access_token(&self) -> Option<String> {
        self.read(ACCESS_TOKEN_KEY)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.read(REFRESH_TOKEN_KEY)
    }

    /// Raw stored expiration string
    pub fn session_expiration(&self) -> Option<String> {
        self.read(SESSION_EXPIRATION_KEY)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.session_expiration()?;
        let parsed = parse_timestamp(&raw);
        if parsed.is_none() {
            warn!(value = %raw, "Stored session expiration is not a timestamp");
        }
        parsed
    }

    /// All three fields, if all are present
    pub fn load(&self) -> Option<Credentials> {
        Some(Credentials {
            access_token: self.access_token()?,
            refresh_token: self.refresh_token()?,
            expires_at: self.session_expiration()?,
        })
    }

    pub fn has_session(&self) -> bool {
        self.access_token().is_some()
    }

    /// Overwrite all three fields
    pub fn save(&self, credentials: &Credentials) -> Result<()> {
        self.storage.set(ACCESS_TOKEN_KEY, &credentials.access_token)?;
        self.storage.set(REFRESH_TOKEN_KEY, &credentials.refresh_token)?;
        self.storage.set(SESSION_EXPIRATION_KEY, &credentials.expires_at)?;
        debug!("Credentials saved");
        Ok(())
    }

    /// Remove all three fields. Every key is attempted; the first failure is returned.
    pub fn clear(&self) -> Result<()> {
        let mut first_error = None;
        for key in ALL_KEYS {
            if let Err(e) = self.storage.remove(key) {
                warn!(key = key, error = %e, "Failed to remove credential");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => {
                debug!("Credentials cleared");
                Ok(())
            }
        }
    }

    /// True when no expiration is stored or `now` has reached it.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at() {
            Some(expiry) => now >= expiry,
            None => true,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Rotate the session using the stored refresh token.
    ///
    /// Returns the new access token. `None` means the session is gone:
    /// either there was no refresh token, or the backend refused it and
    /// every stored field has been cleared.
    pub async fn refresh(&self) -> Option<String> {
        let Some(refresh_token) = self.refresh_token() else {
            debug!("No refresh token stored");
            return None;
        };

        let request = RefreshRequest {
            refresh_token,
            platform: self.platform,
        };

        let tokens = match self.refresher.refresh_tokens(request).await {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!(error = %e, "Token refresh failed, clearing credentials");
                let _ = self.clear();
                return None;
            }
        };

        let credentials = Credentials::from(tokens);
        if let Err(e) = self.save(&credentials) {
            warn!(error = %e, "Failed to persist refreshed credentials, clearing");
            let _ = self.clear();
            return None;
        }

        info!("Session tokens refreshed");
        Some(credentials.access_token)
    }
}
