//! Outbound calls to the remote identity service.
//!
//! The handshake only needs two things from it: start a register/restore flow
//! for an email (returning a flow-scoped token), and acknowledge a reset email.

mod http;

pub use http::{HttpRemoteService, IntegrationRecord};

use std::{future::Future, pin::Pin};

use crate::handshake::FlowType;

pub type RemoteFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, RemoteError>> + Send + 'a>>;

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("remote service returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("remote service request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("remote service response could not be decoded: {0}")]
    Decode(String),
    #[error("invalid remote service URL: {0}")]
    Url(#[from] url::ParseError),
}

pub trait RemoteService: Send + Sync {
    /// Start `flow` server-side for `email` and return the flow-scoped token.
    fn start<'a>(&'a self, flow: FlowType, email: &'a str) -> RemoteFuture<'a, String>;

    /// Acknowledge a reset request for `email`.
    fn acknowledge<'a>(&'a self, email: &'a str) -> RemoteFuture<'a, ()>;
}
