// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine process entry: bind the listener, start the interpreter, signal
//! readiness, serve one call at a time.

use std::io::Write as _;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::Value;
use thiserror::Error;
use tokio::signal::unix::{signal, SignalKind};

use codelab_wire::EngineRequest;

use crate::host::{self, HostError, HostHandle};
use crate::javascript::JavaScriptInterpreter;
use crate::python::PythonInterpreter;

/// Interpreter kinds this binary can host. `python` and `python3` are the
/// same embedded runtime under both wire names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    Python,
    JavaScript,
}

impl std::str::FromStr for EngineKind {
    type Err = UnknownKind;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "python" | "python3" => Ok(EngineKind::Python),
            "javascript" => Ok(EngineKind::JavaScript),
            other => Err(UnknownKind(other.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown engine kind: {0}")]
pub struct UnknownKind(String);

#[derive(Debug, Error)]
pub enum ServeError {
    #[error("failed to bind 127.0.0.1:{port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Host(#[from] HostError),

    #[error("listener failed: {0}")]
    Listener(std::io::Error),
}

/// Run an engine on the given loopback port. The readiness token is written
/// only after the listener is bound and the preface has completed, so the
/// gateway can start dispatching the moment it sees the line.
pub async fn run(kind: EngineKind, port: u16, code: Option<String>) -> Result<(), ServeError> {
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
        .await
        .map_err(|source| ServeError::Bind { port, source })?;

    let handle = match kind {
        EngineKind::Python => host::spawn(PythonInterpreter::new, code)?,
        EngineKind::JavaScript => {
            let interrupted = Arc::new(AtomicBool::new(false));
            trap_interrupts(Arc::clone(&interrupted)).map_err(ServeError::Listener)?;
            host::spawn(move || Ok(JavaScriptInterpreter::new(interrupted)), code)?
        }
    };

    notify_ready();

    let app = Router::new().route("/", post(dispatch)).with_state(handle);
    axum::serve(listener, app).await.map_err(ServeError::Listener)
}

/// The readiness token the gateway's runner waits for.
fn notify_ready() {
    println!("OK (pid={})", std::process::id());
    let _ = std::io::stdout().flush();
}

/// Without a handler SIGINT would kill the process; the JavaScript host
/// instead records it and reports the in-flight evaluation as interrupted.
fn trap_interrupts(flag: Arc<AtomicBool>) -> std::io::Result<()> {
    let mut interrupts = signal(SignalKind::interrupt())?;
    tokio::spawn(async move {
        while interrupts.recv().await.is_some() {
            flag.store(true, std::sync::atomic::Ordering::SeqCst);
        }
    });
    Ok(())
}

async fn dispatch(
    State(handle): State<HostHandle>,
    Json(request): Json<EngineRequest>,
) -> Result<Json<Value>, StatusCode> {
    handle
        .call(request.method, request.source)
        .await
        .map(Json)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}
