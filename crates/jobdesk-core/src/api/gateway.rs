//! Authenticated request pipeline.
//!
//! `RequestGateway` decorates each request with the stored access token,
//! unwraps the response envelope, and recovers from a rejected token by
//! refreshing the session and replaying the request once.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::auth::CredentialStore;

use super::envelope::{unwrap_body, EnvelopeFailure};
use super::error::{GatewayError, TransportError};
use super::presenter::ErrorPresenter;
use super::transport::{join_url, OutboundRequest, Transport};

pub struct RequestGateway {
    transport: Arc<dyn Transport>,
    credentials: Arc<CredentialStore>,
    presenter: ErrorPresenter,
    base_url: String,
}

impl RequestGateway {
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

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    /// Execute `request` and return its unwrapped payload.
    ///
    /// A 401 is retried at most once, and only when the stored session is
    /// expired and the refresh succeeds. Every other failure is returned
    /// as-is. Business errors are reported through the notification sink
    /// before being returned.
    pub async fn call<T: DeserializeOwned>(
        &self,
        request: OutboundRequest,
    ) -> Result<T, GatewayError> {
        let request = match self.credentials.access_token() {
            Some(token) => request.with_bearer(&token),
            None => request.without_authorization(),
        };
        let url = request.url.clone();

        let body = match self.transport.send(request).await {
            Ok(body) => body,
            Err(e) if e.is_unauthorized() => self.recover(e).await?,
            Err(e) => return Err(e.into()),
        };

        self.unwrap_envelope(&url, &body)
    }

    /// Refresh-and-replay after a 401. Returns the original error when the
    /// session cannot be renewed.
    async fn recover(&self, rejected: TransportError) -> Result<String, GatewayError> {
        if !self.credentials.is_expired() {
            debug!(
                request = %rejected.request(),
                "Token rejected but not locally expired, not refreshing"
            );
            return Err(rejected.into());
        }

        let Some(token) = self.credentials.refresh().await else {
            warn!(request = %rejected.request(), "Session could not be refreshed");
            return Err(rejected.into());
        };

        let retry = rejected.into_request().with_bearer(&token);
        info!(request = %retry, "Retrying request with refreshed token");

        Ok(self.transport.send(retry).await?)
    }

    fn unwrap_envelope<T: DeserializeOwned>(
        &self,
        url: &str,
        body: &str,
    ) -> Result<T, GatewayError> {
        match unwrap_body(body) {
            Ok(payload) => Ok(payload),
            Err(EnvelopeFailure::Business(error)) => {
                debug!(url = url, code = ?error.code, "Backend reported an error");
                Err(self.presenter.present(error).into())
            }
            Err(EnvelopeFailure::Malformed(source)) => Err(GatewayError::InvalidEnvelope {
                url: url.to_string(),
                source,
            }),
        }
    }

    // ===== Convenience methods =====

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, GatewayError> {
        self.call(OutboundRequest::get(join_url(&self.base_url, path))).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, GatewayError> {
        let body = serde_json::to_value(body).map_err(|source| GatewayError::InvalidBody {
            url: join_url(&self.base_url, path),
            source,
        })?;
        self.call(OutboundRequest::post(join_url(&self.base_url, path), body)).await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, GatewayError> {
        let body = serde_json::to_value(body).map_err(|source| GatewayError::InvalidBody {
            url: join_url(&self.base_url, path),
            source,
        })?;
        self.call(OutboundRequest::put(join_url(&self.base_url, path), body)).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, GatewayError> {
        self.call(OutboundRequest::delete(join_url(&self.base_url, path))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{
        Credentials, KeyValueStore, MemoryStore, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY,
        SESSION_EXPIRATION_KEY,
    };
    use crate::i18n::{Catalog, DEFAULT_UNKNOWN_ERROR, UNKNOWN_ERROR_KEY};
    use crate::models::Platform;
    use crate::test_support::{
        error_envelope, ok_envelope, session_tokens, FakeRefresher, RecordingSink, Reply,
        ScriptedTransport,
    };
    use serde::Deserialize;
    use serde_json::json;

    const BASE_URL: &str = "https://api.example.com";
    const EXPIRED: &str = "2000-01-01T00:00:00Z";
    const VALID: &str = "2999-01-01T00:00:00Z";

    #[derive(Debug, Deserialize, PartialEq)]
    struct Job {
        id: u64,
        title: String,
    }

    struct Harness {
        gateway: RequestGateway,
        transport: Arc<ScriptedTransport>,
        refresher: Arc<FakeRefresher>,
        storage: Arc<MemoryStore>,
        sink: Arc<RecordingSink>,
    }

    fn harness(replies: Vec<Reply>, refresher: FakeRefresher, catalog: Catalog) -> Harness {
        let transport = Arc::new(ScriptedTransport::new(replies));
        let refresher = Arc::new(refresher);
        let storage = Arc::new(MemoryStore::new());
        let sink = Arc::new(RecordingSink::default());
        let credentials = Arc::new(CredentialStore::new(
            storage.clone(),
            refresher.clone(),
            Platform::Ios,
        ));
        let presenter = ErrorPresenter::new(Arc::new(catalog), sink.clone());
        let gateway = RequestGateway::new(transport.clone(), credentials, presenter, BASE_URL);
        Harness {
            gateway,
            transport,
            refresher,
            storage,
            sink,
        }
    }

    fn sign_in(h: &Harness, expires_at: &str) {
        h.gateway
            .credentials()
            .save(&Credentials {
                access_token: "old-jwt".to_string(),
                refresh_token: "old-refresh".to_string(),
                expires_at: expires_at.to_string(),
            })
            .unwrap();
    }

    #[tokio::test]
    async fn test_returns_payload_exactly() {
        let h = harness(
            vec![Reply::Body(ok_envelope(json!({"id": 1, "title": "Plumber"})))],
            FakeRefresher::failing(),
            Catalog::new(),
        );
        let job: Job = h.gateway.get("/jobs/1").await.unwrap();
        assert_eq!(job, Job { id: 1, title: "Plumber".to_string() });
        assert!(h.sink.messages().is_empty());
    }

    #[tokio::test]
    async fn test_attaches_bearer_when_token_stored() {
        let h = harness(
            vec![Reply::Body(ok_envelope(json!(null)))],
            FakeRefresher::failing(),
            Catalog::new(),
        );
        sign_in(&h, VALID);
        h.gateway.get::<()>("/profile").await.unwrap();

        let sent = h.transport.requests();
        assert_eq!(sent[0].bearer_token(), Some("old-jwt"));
        assert_eq!(sent[0].url, "https://api.example.com/profile");
    }

    #[tokio::test]
    async fn test_omits_authorization_without_token() {
        let h = harness(
            vec![Reply::Body(ok_envelope(json!(null)))],
            FakeRefresher::failing(),
            Catalog::new(),
        );
        let request = OutboundRequest::get(format!("{}/jobs", BASE_URL)).with_bearer("leftover");
        h.gateway.call::<()>(request).await.unwrap();

        let sent = h.transport.requests();
        assert!(sent[0].headers.get(reqwest::header::AUTHORIZATION).is_none());
    }

    #[tokio::test]
    async fn test_business_error_is_translated_and_notified() {
        let catalog = Catalog::new().with("error.JOB_CLOSED", "This job is closed");
        let h = harness(
            vec![Reply::Body(error_envelope(json!({"code": "JOB_CLOSED", "message": "closed"})))],
            FakeRefresher::failing(),
            catalog,
        );
        let err = h
            .gateway
            .post::<Job, _>("/applications", &json!({"jobId": 1}))
            .await
            .unwrap_err();

        let business = err.as_business().expect("business error");
        assert_eq!(business.message, "This job is closed");
        assert_eq!(err.to_string(), "This job is closed");
        assert_eq!(business.code(), Some("JOB_CLOSED"));
        assert_eq!(business.error.message.as_deref(), Some("closed"));
        assert_eq!(h.sink.messages(), vec!["This job is closed".to_string()]);
    }

    #[tokio::test]
    async fn test_business_error_keyed_by_message_without_code() {
        let catalog = Catalog::new().with("error.PROFILE_INCOMPLETE", "Finish your profile first");
        let h = harness(
            vec![Reply::Body(error_envelope(json!({"message": "PROFILE_INCOMPLETE"})))],
            FakeRefresher::failing(),
            catalog,
        );
        let err = h.gateway.get::<Job>("/jobs/1").await.unwrap_err();
        assert_eq!(err.to_string(), "Finish your profile first");
    }

    #[tokio::test]
    async fn test_business_error_falls_back_to_unknown() {
        let catalog = Catalog::new().with(UNKNOWN_ERROR_KEY, "Unexpected problem");
        let h = harness(
            vec![
                Reply::Body(error_envelope(json!({"code": "NOT_REGISTERED"}))),
                Reply::Body(error_envelope(json!(null))),
            ],
            FakeRefresher::failing(),
            catalog,
        );
        let first = h.gateway.get::<Job>("/jobs/1").await.unwrap_err();
        let second = h.gateway.get::<Job>("/jobs/2").await.unwrap_err();
        assert_eq!(first.to_string(), "Unexpected problem");
        assert_eq!(second.to_string(), "Unexpected problem");
        assert_eq!(h.sink.messages().len(), 2);
    }

    #[tokio::test]
    async fn test_business_error_builtin_fallback() {
        let h = harness(
            vec![Reply::Body(error_envelope(json!({})))],
            FakeRefresher::failing(),
            Catalog::new(),
        );
        let err = h.gateway.get::<Job>("/jobs/1").await.unwrap_err();
        assert_eq!(err.to_string(), DEFAULT_UNKNOWN_ERROR);
    }

    #[tokio::test]
    async fn test_401_with_unexpired_session_is_not_refreshed() {
        let h = harness(
            vec![Reply::Status(401, "revoked".to_string())],
            FakeRefresher::returning(session_tokens("new-jwt", "new-refresh", VALID)),
            Catalog::new(),
        );
        sign_in(&h, VALID);

        let err = h.gateway.get::<Job>("/jobs/1").await.unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(h.refresher.calls(), 0);
        assert_eq!(h.transport.requests().len(), 1);
        assert_eq!(h.storage.get(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("old-jwt"));
    }

    #[tokio::test]
    async fn test_401_with_expired_session_refreshes_and_retries_once() {
        let h = harness(
            vec![
                Reply::Status(401, String::new()),
                Reply::Body(ok_envelope(json!({"id": 9, "title": "Painter"}))),
            ],
            FakeRefresher::returning(session_tokens("new-jwt", "new-refresh", VALID)),
            Catalog::new(),
        );
        sign_in(&h, EXPIRED);

        let body = json!({"title": "Painter"});
        let job: Job = h.gateway.put("/jobs/9", &body).await.unwrap();
        assert_eq!(job.id, 9);
        assert_eq!(h.refresher.calls(), 1);

        let sent = h.transport.requests();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].bearer_token(), Some("old-jwt"));
        assert_eq!(sent[1].bearer_token(), Some("new-jwt"));
        assert_eq!(sent[1].method, sent[0].method);
        assert_eq!(sent[1].url, sent[0].url);
        assert_eq!(sent[1].body, Some(body));
        assert_eq!(h.storage.get(REFRESH_TOKEN_KEY).unwrap().as_deref(), Some("new-refresh"));
    }

    #[tokio::test]
    async fn test_second_401_is_not_refreshed_again() {
        let h = harness(
            vec![
                Reply::Status(401, "first".to_string()),
                Reply::Status(401, "second".to_string()),
            ],
            FakeRefresher::returning(session_tokens("new-jwt", "new-refresh", EXPIRED)),
            Catalog::new(),
        );
        sign_in(&h, EXPIRED);

        let err = h.gateway.get::<Job>("/jobs/1").await.unwrap_err();
        match err {
            GatewayError::Transport(TransportError::Status { status, body, request }) => {
                assert_eq!(status, 401);
                assert_eq!(body, "second");
                assert_eq!(request.bearer_token(), Some("new-jwt"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(h.refresher.calls(), 1);
        assert_eq!(h.transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_401s_each_refresh_independently() {
        // Both refreshes must be in flight before either answers
        let barrier = Arc::new(tokio::sync::Barrier::new(2));
        let h = harness(
            vec![
                Reply::Status(401, "first".to_string()),
                Reply::Status(401, "second".to_string()),
                Reply::Body(ok_envelope(json!({"id": 1, "title": "Plumber"}))),
                Reply::Body(ok_envelope(json!({"id": 2, "title": "Painter"}))),
            ],
            FakeRefresher::returning(session_tokens("new-jwt", "new-refresh", VALID))
                .gated(barrier),
            Catalog::new(),
        );
        sign_in(&h, EXPIRED);

        let (first, second) = tokio::join!(
            h.gateway.get::<Job>("/jobs/1"),
            h.gateway.get::<Job>("/jobs/2"),
        );
        let mut ids = vec![first.unwrap().id, second.unwrap().id];
        ids.sort();
        assert_eq!(ids, vec![1, 2]);

        assert_eq!(h.refresher.calls(), 2);
        for request in h.refresher.requests() {
            assert_eq!(request.refresh_token, "old-refresh");
        }

        let sent = h.transport.requests();
        assert_eq!(sent.len(), 4);
        assert_eq!(sent[0].bearer_token(), Some("old-jwt"));
        assert_eq!(sent[1].bearer_token(), Some("old-jwt"));
        assert_eq!(sent[2].bearer_token(), Some("new-jwt"));
        assert_eq!(sent[3].bearer_token(), Some("new-jwt"));
        assert_eq!(h.storage.get(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("new-jwt"));
    }

    #[tokio::test]
    async fn test_retry_business_error_is_presented() {
        let catalog = Catalog::new().with("error.FORBIDDEN_ROLE", "Workers cannot post jobs");
        let h = harness(
            vec![
                Reply::Status(401, String::new()),
                Reply::Body(error_envelope(json!({"code": "FORBIDDEN_ROLE"}))),
            ],
            FakeRefresher::returning(session_tokens("new-jwt", "new-refresh", VALID)),
            catalog,
        );
        sign_in(&h, EXPIRED);

        let err = h.gateway.post::<Job, _>("/jobs", &json!({})).await.unwrap_err();
        assert_eq!(err.to_string(), "Workers cannot post jobs");
        assert_eq!(h.sink.messages(), vec!["Workers cannot post jobs".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_refresh_returns_original_error_and_clears() {
        let h = harness(
            vec![Reply::Status(401, "original".to_string())],
            FakeRefresher::failing(),
            Catalog::new(),
        );
        sign_in(&h, EXPIRED);

        let err = h.gateway.get::<Job>("/jobs/1").await.unwrap_err();
        match err {
            GatewayError::Transport(TransportError::Status { status, body, request }) => {
                assert_eq!(status, 401);
                assert_eq!(body, "original");
                assert_eq!(request.bearer_token(), Some("old-jwt"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(h.refresher.calls(), 1);
        assert_eq!(h.transport.requests().len(), 1);
        for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, SESSION_EXPIRATION_KEY] {
            assert_eq!(h.storage.get(key).unwrap(), None);
        }
    }

    #[tokio::test]
    async fn test_401_without_any_session_propagates() {
        let h = harness(
            vec![Reply::Status(401, String::new())],
            FakeRefresher::returning(session_tokens("new-jwt", "new-refresh", VALID)),
            Catalog::new(),
        );

        let err = h.gateway.get::<Job>("/jobs/1").await.unwrap_err();
        assert!(err.is_unauthorized());
        // Expired by absence, but there is no refresh token to use
        assert_eq!(h.refresher.calls(), 0);
        assert_eq!(h.transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_other_statuses_are_never_retried() {
        let h = harness(
            vec![Reply::Status(500, "boom".to_string())],
            FakeRefresher::returning(session_tokens("new-jwt", "new-refresh", VALID)),
            Catalog::new(),
        );
        sign_in(&h, EXPIRED);

        let err = h.gateway.get::<Job>("/jobs/1").await.unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert_eq!(h.refresher.calls(), 0);
        assert_eq!(h.transport.requests().len(), 1);
        assert!(h.sink.messages().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_envelope() {
        let h = harness(
            vec![
                Reply::Body("<html>gateway timeout</html>".to_string()),
                Reply::Body(ok_envelope(json!({"id": "nine"}))),
            ],
            FakeRefresher::failing(),
            Catalog::new(),
        );
        let first = h.gateway.get::<Job>("/jobs/1").await.unwrap_err();
        assert!(matches!(
            first,
            GatewayError::InvalidEnvelope { ref url, .. } if url == "https://api.example.com/jobs/1"
        ));
        let second = h.gateway.get::<Job>("/jobs/2").await.unwrap_err();
        assert!(matches!(second, GatewayError::InvalidEnvelope { .. }));
        assert!(h.sink.messages().is_empty());
    }
}
