//! Wiring for the request pipeline.
//!
//! `ApiClient` builds the transport, credential store, auth endpoints and
//! gateway from a `Config` so hosts only choose a localizer and a sink.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::debug;

use crate::auth::{CredentialStore, KeyValueStore};
use crate::config::Config;
use crate::i18n::{Catalog, Localizer};
use crate::notify::NotificationSink;

use super::auth::{AuthApi, RefreshEndpoint};
use super::gateway::RequestGateway;
use super::presenter::ErrorPresenter;
use super::transport::{ReqwestTransport, Transport};

pub struct ApiClient {
    gateway: RequestGateway,
    auth: AuthApi,
    credentials: Arc<CredentialStore>,
}

impl ApiClient {
    /// Build a client from configuration, loading the locale catalog if one is set
    pub fn from_config(config: &Config, sink: Arc<dyn NotificationSink>) -> Result<Self> {
        let transport = Arc::new(ReqwestTransport::new(Duration::from_secs(
            config.request_timeout_secs,
        ))?);
        let catalog = match config.locale_path {
            Some(ref path) => Catalog::load(path)?,
            None => Catalog::new(),
        };
        debug!(entries = catalog.len(), "Locale catalog loaded");

        Ok(Self::new(
            config,
            transport,
            config.credential_storage()?,
            Arc::new(catalog),
            sink,
        ))
    }

    pub fn new(
        config: &Config,
        transport: Arc<dyn Transport>,
        storage: Arc<dyn KeyValueStore>,
        localizer: Arc<dyn Localizer>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let refresher = Arc::new(RefreshEndpoint::new(
            transport.clone(),
            &config.api_base_url,
        ));
        let credentials = Arc::new(CredentialStore::new(storage, refresher, config.platform));
        let presenter = ErrorPresenter::new(localizer, sink);

        let auth = AuthApi::new(
            transport.clone(),
            credentials.clone(),
            presenter.clone(),
            config.api_base_url.clone(),
        );
        let gateway = RequestGateway::new(
            transport,
            credentials.clone(),
            presenter,
            config.api_base_url.clone(),
        );

        Self {
            gateway,
            auth,
            credentials,
        }
    }

    pub fn gateway(&self) -> &RequestGateway {
        &self.gateway
    }

    pub fn auth(&self) -> &AuthApi {
        &self.auth
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }
}
