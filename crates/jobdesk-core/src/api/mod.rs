//! REST client module for the job marketplace backend.
//!
//! Every backend response is wrapped in an `Envelope`. `RequestGateway`
//! unwraps it, surfaces business errors to the user, and transparently
//! refreshes an expired session once per call. `AuthApi` covers the
//! endpoints that create a session in the first place.

pub mod auth;
pub mod client;
pub mod envelope;
pub mod error;
pub mod gateway;
pub mod presenter;
pub mod transport;

pub use auth::{AuthApi, RefreshEndpoint};
pub use client::ApiClient;
pub use envelope::{ApiErrorBody, Envelope};
pub use error::{BusinessError, GatewayError, TransportError};
pub use gateway::RequestGateway;
pub use presenter::ErrorPresenter;
pub use transport::{OutboundRequest, ReqwestTransport, Transport};
