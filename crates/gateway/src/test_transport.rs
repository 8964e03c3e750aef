// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted engine transport for dispatcher and manager tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::Notify;

use codelab_wire::EngineMethod;

use crate::transport::{EngineTransport, TransportError, TransportFactory};

pub(crate) struct Scripted {
    pub delay: Option<Duration>,
    pub gate: Option<Arc<Notify>>,
    pub result: Result<Value, TransportError>,
}

impl Scripted {
    pub fn reply(value: Value) -> Self {
        Self { delay: None, gate: None, result: Ok(value) }
    }

    pub fn delayed(delay: Duration, value: Value) -> Self {
        Self { delay: Some(delay), gate: None, result: Ok(value) }
    }

    pub fn gated(gate: Arc<Notify>, value: Value) -> Self {
        Self { delay: None, gate: Some(gate), result: Ok(value) }
    }

    pub fn fault(detail: &str) -> Self {
        Self { delay: None, gate: None, result: Err(TransportError::Fault(detail.to_string())) }
    }
}

#[derive(Default)]
pub(crate) struct FakeTransport {
    script: Mutex<VecDeque<Scripted>>,
    calls: Mutex<Vec<(EngineMethod, String)>>,
}

impl FakeTransport {
    pub fn scripted(script: Vec<Scripted>) -> Arc<Self> {
        Arc::new(Self { script: Mutex::new(script.into()), calls: Mutex::new(Vec::new()) })
    }

    /// Calls the dispatcher actually put on the wire, in dispatch order.
    pub fn calls(&self) -> Vec<(EngineMethod, String)> {
        self.calls.lock().clone()
    }

    pub fn factory(self: &Arc<Self>) -> TransportFactory {
        let fake = Arc::clone(self);
        Arc::new(move |_port| Arc::clone(&fake) as Arc<dyn EngineTransport>)
    }
}

#[async_trait]
impl EngineTransport for FakeTransport {
    async fn call(&self, method: EngineMethod, source: &str) -> Result<Value, TransportError> {
        self.calls.lock().push((method, source.to_string()));
        let scripted = self.script.lock().pop_front().unwrap_or_else(|| {
            Scripted::fault("script exhausted")
        });
        if let Some(gate) = scripted.gate {
            gate.notified().await;
        }
        if let Some(delay) = scripted.delay {
            tokio::time::sleep(delay).await;
        }
        scripted.result
    }
}
