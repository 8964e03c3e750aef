// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Gateway→engine request channel.
//!
//! Engines answer one HTTP POST per call on their loopback port. The trait
//! exists so dispatcher behavior can be exercised against a scripted
//! transport in tests.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use codelab_core::Reason;
use codelab_wire::{EngineMethod, EngineRequest};

#[async_trait]
pub trait EngineTransport: Send + Sync {
    async fn call(&self, method: EngineMethod, source: &str) -> Result<Value, TransportError>;
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("{0}")]
    Fault(String),

    #[error("response code {0}")]
    Status(u16),
}

impl From<TransportError> for Reason {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::Fault(detail) => Reason::Fault(detail),
            TransportError::Status(code) => Reason::ResponseCode(code),
        }
    }
}

/// Produces the transport for a freshly started engine's port.
pub type TransportFactory = Arc<dyn Fn(u16) -> Arc<dyn EngineTransport> + Send + Sync>;

pub fn http_factory() -> TransportFactory {
    Arc::new(|port| Arc::new(HttpTransport::new(port)))
}

pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
}

impl HttpTransport {
    pub fn new(port: u16) -> Self {
        // no request timeout: evaluation deadlines are enforced out-of-band
        // by the dispatcher's interrupt timer
        Self { client: reqwest::Client::new(), url: format!("http://127.0.0.1:{port}/") }
    }
}

#[async_trait]
impl EngineTransport for HttpTransport {
    async fn call(&self, method: EngineMethod, source: &str) -> Result<Value, TransportError> {
        let request = EngineRequest { method, source: source.to_string() };
        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|error| TransportError::Fault(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }
        response.json::<Value>().await.map_err(|error| TransportError::Fault(error.to_string()))
    }
}
