//! Fakes shared by unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use futures::future::BoxFuture;
use serde_json::{json, Value};
use tokio::sync::Barrier;

use crate::api::{OutboundRequest, Transport, TransportError};
use crate::auth::TokenRefresher;
use crate::models::{RefreshRequest, SessionTokens};
use crate::notify::NotificationSink;

pub fn session_tokens(jwt: &str, refresh_token: &str, expiration: &str) -> SessionTokens {
    SessionTokens {
        jwt: jwt.to_string(),
        refresh_token: refresh_token.to_string(),
        session_expiration_date: expiration.to_string(),
    }
}

pub fn ok_envelope(payload: Value) -> String {
    json!({"payload": payload, "hasError": false, "error": null}).to_string()
}

pub fn error_envelope(error: Value) -> String {
    json!({"payload": null, "hasError": true, "error": error}).to_string()
}

#[derive(Default)]
pub struct RecordingSink {
    messages: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

/// Refresher that answers every call with the same outcome.
pub struct FakeRefresher {
    tokens: Option<SessionTokens>,
    calls: AtomicUsize,
    requests: Mutex<Vec<RefreshRequest>>,
    gate: Option<Arc<Barrier>>,
}

impl FakeRefresher {
    pub fn returning(tokens: SessionTokens) -> Self {
        Self {
            tokens: Some(tokens),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    pub fn failing() -> Self {
        Self {
            tokens: None,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    /// Hold every answer until `barrier` releases, so callers can be
    /// forced to overlap.
    pub fn gated(mut self, barrier: Arc<Barrier>) -> Self {
        self.gate = Some(barrier);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<RefreshRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl TokenRefresher for FakeRefresher {
    fn refresh_tokens(&self, request: RefreshRequest) -> BoxFuture<'_, Result<SessionTokens>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);
        let outcome = self
            .tokens
            .clone()
            .ok_or_else(|| anyhow::anyhow!("refresh token rejected"));
        let gate = self.gate.clone();
        Box::pin(async move {
            if let Some(barrier) = gate {
                barrier.wait().await;
            }
            outcome
        })
    }
}

/// A scripted transport reply.
pub enum Reply {
    Body(String),
    Status(u16, String),
}

/// Transport that replays scripted replies in order and records every request.
#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<OutboundRequest>>,
}

impl ScriptedTransport {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<OutboundRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Transport for ScriptedTransport {
    fn send(&self, request: OutboundRequest) -> BoxFuture<'_, Result<String, TransportError>> {
        self.requests.lock().unwrap().push(request.clone());
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected request: {request}"));
        let outcome = match reply {
            Reply::Body(body) => Ok(body),
            Reply::Status(status, body) => Err(TransportError::from_status(status, &body, request)),
        };
        Box::pin(async move { outcome })
    }
}
