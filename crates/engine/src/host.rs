// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Interpreter thread plumbing.
//!
//! The language runtime lives on one dedicated thread for the lifetime of
//! the process: CPython delivers `KeyboardInterrupt` on the thread that
//! initialised it, and the boa context is not `Send`. The HTTP side talks
//! to that thread through a channel and never touches the runtime.

use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use codelab_wire::EngineMethod;

/// A language runtime hosted by this process.
pub trait Interpreter {
    /// Run a one-shot preface before the listener accepts requests.
    fn execute(&mut self, source: &str) -> Result<(), HostError>;

    /// Produce the structured result record for a source fragment.
    /// Engine-level failures (tracebacks, interruptions) are fields of the
    /// record, never errors.
    fn evaluate(&mut self, source: &str) -> Value;

    /// Produce completion candidates for a trailing prefix.
    fn complete(&mut self, source: &str) -> Value;
}

#[derive(Debug, Error)]
pub enum HostError {
    #[error("interpreter error: {0}")]
    Interpreter(String),

    #[error("interpreter thread failed: {0}")]
    Thread(String),
}

/// The interpreter thread exited; no further calls can be serviced.
#[derive(Debug, Error)]
#[error("interpreter thread is gone")]
pub struct HostGone;

struct HostRequest {
    method: EngineMethod,
    source: String,
    reply: oneshot::Sender<Value>,
}

/// Channel endpoint handed to the HTTP listener.
#[derive(Clone)]
pub struct HostHandle {
    tx: mpsc::Sender<HostRequest>,
}

impl HostHandle {
    pub async fn call(&self, method: EngineMethod, source: String) -> Result<Value, HostGone> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(HostRequest { method, source, reply: reply_tx })
            .await
            .map_err(|_| HostGone)?;
        reply_rx.await.map_err(|_| HostGone)
    }
}

/// Start the interpreter thread, run the preface, and return the handle.
///
/// The factory runs on the new thread so the runtime is created where it
/// will be used. Blocks until the preface has completed; a preface failure
/// aborts startup, which the gateway observes as `died`.
pub fn spawn<I, F>(factory: F, preface: Option<String>) -> Result<HostHandle, HostError>
where
    I: Interpreter + 'static,
    F: FnOnce() -> Result<I, HostError> + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<HostRequest>(1);
    let (ready_tx, ready_rx) = std::sync::mpsc::channel();

    std::thread::Builder::new()
        .name("interpreter".to_string())
        .spawn(move || {
            // the process blocks SIGINT everywhere else, so interrupts are
            // delivered here, where the runtime can act on them
            unblock_sigint();
            let mut interpreter = match factory() {
                Ok(interpreter) => interpreter,
                Err(error) => {
                    let _ = ready_tx.send(Err(error));
                    return;
                }
            };
            if let Some(code) = preface {
                if let Err(error) = interpreter.execute(&code) {
                    let _ = ready_tx.send(Err(error));
                    return;
                }
            }
            let _ = ready_tx.send(Ok(()));

            while let Some(request) = rx.blocking_recv() {
                let value = match request.method {
                    EngineMethod::Evaluate => interpreter.evaluate(&request.source),
                    EngineMethod::Complete => interpreter.complete(&request.source),
                };
                let _ = request.reply.send(value);
            }
        })
        .map_err(|error| HostError::Thread(error.to_string()))?;

    ready_rx
        .recv()
        .map_err(|_| HostError::Thread("interpreter thread exited during startup".to_string()))??;

    Ok(HostHandle { tx })
}

/// Route SIGINT to the calling thread.
pub fn unblock_sigint() {
    use nix::sys::signal::{pthread_sigmask, SigSet, Signal, SigmaskHow};
    let mut mask = SigSet::empty();
    mask.add(Signal::SIGINT);
    let _ = pthread_sigmask(SigmaskHow::SIG_UNBLOCK, Some(&mask), None);
}

/// Keep SIGINT away from the calling thread (and any it spawns).
pub fn block_sigint() {
    use nix::sys::signal::{pthread_sigmask, SigSet, Signal, SigmaskHow};
    let mut mask = SigSet::empty();
    mask.add(Signal::SIGINT);
    let _ = pthread_sigmask(SigmaskHow::SIG_BLOCK, Some(&mask), None);
}

/// Serialize a result record, degrading to an error record rather than
/// dropping the reply.
pub(crate) fn to_value<T: Serialize>(record: &T) -> Value {
    serde_json::to_value(record).unwrap_or_else(|error| {
        json!({
            "traceback": format!("result serialization failed: {error}"),
            "interrupted": false,
        })
    })
}

#[cfg(test)]
#[path = "host_tests.rs"]
mod tests;
