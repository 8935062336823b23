//! Authentication endpoints: the calls that create or rotate a session.

use std::sync::Arc;

use anyhow::{Context, Result};
use futures::future::BoxFuture;
use serde::Serialize;
use tracing::info;

use crate::auth::{CredentialStore, Credentials, TokenRefresher};
use crate::models::{
    LoginRequest, OtpVerificationRequest, Platform, RefreshRequest, RegisterRequest,
    SessionTokens,
};

use super::envelope::{unwrap_body, EnvelopeFailure};
use super::error::GatewayError;
use super::presenter::ErrorPresenter;
use super::transport::{join_url, OutboundRequest, Transport};

pub const LOGIN_PATH: &str = "/auth/login";
pub const REGISTER_PATH: &str = "/auth/register";
pub const VERIFY_OTP_PATH: &str = "/auth/verify-otp";
pub const REFRESH_PATH: &str = "/auth/refresh-token";

/// Backend token rotation over a `Transport`.
///
/// Sends no Authorization header and never notifies the user; any failure,
/// including a `hasError` envelope, is reported to `CredentialStore` as a
/// rejected refresh token.
pub struct RefreshEndpoint {
    transport: Arc<dyn Transport>,
    url: String,
}

impl RefreshEndpoint {
    pub fn new(transport: Arc<dyn Transport>, base_url: &str) -> Self {
        Self {
            transport,
            url: join_url(base_url, REFRESH_PATH),
        }
    }

    async fn refresh(&self, request: RefreshRequest) -> Result<SessionTokens> {
        let body = serde_json::to_value(&request).context("Failed to encode refresh request")?;
        let response = self
            .transport
            .send(OutboundRequest::post(self.url.clone(), body))
            .await
            .context("Failed to send refresh request")?;

        match unwrap_body(&response) {
            Ok(tokens) => Ok(tokens),
            Err(EnvelopeFailure::Business(error)) => Err(anyhow::anyhow!(
                "Refresh rejected: {}",
                error
                    .code
                    .or(error.message)
                    .unwrap_or_else(|| "no error code".to_string())
            )),
            Err(EnvelopeFailure::Malformed(e)) => {
                Err(e).context("Failed to parse refresh response")
            }
        }
    }
}

impl TokenRefresher for RefreshEndpoint {
    fn refresh_tokens(&self, request: RefreshRequest) -> BoxFuture<'_, Result<SessionTokens>> {
        Box::pin(self.refresh(request))
    }
}

/// Login, registration, OTP verification and logout.
///
/// Successful calls store the returned session in the `CredentialStore`.
pub struct AuthApi {
    transport: Arc<dyn Transport>,
    credentials: Arc<CredentialStore>,
    presenter: ErrorPresenter,
    base_url: String,
}

impl AuthApi {
    pub fn new(
        transport: Arc<dyn Transport>,
        credentials: Arc<CredentialStore>,
        presenter: ErrorPresenter,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            credentials,
            presenter,
            base_url: base_url.into(),
        }
    }

    fn platform(&self) -> Platform {
        self.credentials.platform()
    }

    /// POST without bearer decoration and unwrap the envelope.
    async fn post_unauthenticated<B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<SessionTokens, GatewayError> {
        let url = join_url(&self.base_url, path);
        let body = serde_json::to_value(body).map_err(|source| GatewayError::InvalidBody {
            url: url.clone(),
            source,
        })?;
        let response = self
            .transport
            .send(OutboundRequest::post(url.clone(), body))
            .await?;

        match unwrap_body(&response) {
            Ok(tokens) => Ok(tokens),
            Err(EnvelopeFailure::Business(error)) => Err(self.presenter.present(error).into()),
            Err(EnvelopeFailure::Malformed(source)) => {
                Err(GatewayError::InvalidEnvelope { url, source })
            }
        }
    }

    fn store(&self, tokens: SessionTokens) -> Result<Credentials> {
        let credentials = Credentials::from(tokens);
        self.credentials
            .save(&credentials)
            .context("Failed to store session credentials")?;
        Ok(credentials)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Credentials> {
        let request = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
            platform: self.platform(),
        };
        let tokens = self.post_unauthenticated(LOGIN_PATH, &request).await?;
        info!("Logged in");
        self.store(tokens)
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<Credentials> {
        let tokens = self.post_unauthenticated(REGISTER_PATH, request).await?;
        info!("Account registered");
        self.store(tokens)
    }

    pub async fn verify_otp(&self, email: &str, code: &str) -> Result<Credentials> {
        let request = OtpVerificationRequest {
            email: email.to_string(),
            code: code.to_string(),
            platform: self.platform(),
        };
        let tokens = self.post_unauthenticated(VERIFY_OTP_PATH, &request).await?;
        info!("One-time code verified");
        self.store(tokens)
    }

    /// Forget the local session. Routing the user elsewhere is the host's job.
    pub fn logout(&self) -> Result<()> {
        self.credentials.clear()?;
        info!("Logged out");
        Ok(())
    }
}
