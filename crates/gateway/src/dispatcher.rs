// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-engine request broker.
//!
//! One actor task per live engine owns the child process, a FIFO queue of
//! pending calls, and the single in-flight slot. Child stdout/stderr are
//! drained into buffers as they become readable; each reply is augmented
//! with the captured bytes and the child's resident memory, then the
//! buffers reset so no output leaks between calls. Cancellation is
//! cooperative: the per-call deadline and explicit interrupts both deliver
//! SIGINT and let the in-flight call return normally.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use codelab_core::{CellId, EngineId, Reason};
use codelab_wire::{EngineMethod, EvalRecord};

use crate::manager::{EngineHandle, Registry};
use crate::stat;
use crate::transport::{EngineTransport, TransportError};

pub(crate) type CallReply = oneshot::Sender<Result<Value, Reason>>;
pub(crate) type StatusReply = oneshot::Sender<Result<&'static str, Reason>>;

pub(crate) enum Command {
    Evaluate { source: String, cellid: Option<CellId>, reply: CallReply },
    Complete { source: String, reply: CallReply },
    Interrupt { cellid: Option<CellId>, reply: StatusReply },
    Stat { reply: CallReply },
    Stop { reply: StatusReply },
    Kill,
}

struct PendingCall {
    method: EngineMethod,
    source: String,
    cellid: Option<CellId>,
    reply: CallReply,
}

struct InFlight {
    cellid: Option<CellId>,
    reply: CallReply,
    timed_out: bool,
}

pub(crate) struct DispatcherParts {
    pub id: EngineId,
    pub registry: Arc<Registry>,
    pub child: Child,
    pub pid: u32,
    pub cwd: PathBuf,
    pub transport: Arc<dyn EngineTransport>,
    pub evaluate_timeout: Duration,
    pub stdout: BufReader<ChildStdout>,
    pub stderr: ChildStderr,
}

pub(crate) struct Dispatcher {
    id: EngineId,
    registry: Arc<Registry>,
    child: Child,
    pid: u32,
    cwd: PathBuf,
    transport: Arc<dyn EngineTransport>,
    evaluate_timeout: Duration,
    queue: VecDeque<PendingCall>,
    in_flight: Option<InFlight>,
    stopping: Option<StatusReply>,
    deadline: Option<Instant>,
    out_buf: Vec<u8>,
    err_buf: Vec<u8>,
    system: sysinfo::System,
}

type TransportDone = mpsc::Sender<Result<Value, TransportError>>;

impl Dispatcher {
    /// Start the actor task and return the handle the registry keeps.
    pub(crate) fn spawn(parts: DispatcherParts) -> EngineHandle {
        let (tx, rx) = mpsc::channel(32);
        let pid = parts.pid;
        let dispatcher = Dispatcher {
            id: parts.id,
            registry: parts.registry,
            child: parts.child,
            pid: parts.pid,
            cwd: parts.cwd,
            transport: parts.transport,
            evaluate_timeout: parts.evaluate_timeout,
            queue: VecDeque::new(),
            in_flight: None,
            stopping: None,
            deadline: None,
            out_buf: Vec::new(),
            err_buf: Vec::new(),
            system: stat::system(),
        };
        tokio::spawn(dispatcher.run(rx, parts.stdout, parts.stderr));
        EngineHandle { tx, pid }
    }

    async fn run(
        mut self,
        mut rx: mpsc::Receiver<Command>,
        mut stdout: BufReader<ChildStdout>,
        mut stderr: ChildStderr,
    ) {
        let (done_tx, mut done_rx) = mpsc::channel::<Result<Value, TransportError>>(1);
        let mut out_chunk = vec![0u8; 8192];
        let mut err_chunk = vec![0u8; 8192];
        let mut commands_open = true;
        let mut stderr_open = true;

        enum Step {
            Command(Option<Command>),
            Done(Result<Value, TransportError>),
            Stdout(std::io::Result<usize>),
            Stderr(std::io::Result<usize>),
            Deadline,
        }

        loop {
            let deadline = self.deadline;
            let step = tokio::select! {
                command = rx.recv(), if commands_open => Step::Command(command),
                done = done_rx.recv() => match done {
                    Some(result) => Step::Done(result),
                    None => continue,
                },
                read = stdout.read(&mut out_chunk) => Step::Stdout(read),
                read = stderr.read(&mut err_chunk), if stderr_open => Step::Stderr(read),
                _ = sleep_until(deadline), if deadline.is_some() => Step::Deadline,
            };

            match step {
                Step::Command(Some(command)) => self.handle_command(command, &done_tx),
                Step::Command(None) => commands_open = false,
                Step::Done(result) => {
                    self.on_reply(result, &done_tx, &mut stdout, &mut stderr).await;
                }
                Step::Stdout(Ok(n)) if n > 0 => self.out_buf.extend_from_slice(&out_chunk[..n]),
                // stdout closing is how we learn the child is gone
                Step::Stdout(_) => {
                    self.on_child_exit().await;
                    return;
                }
                Step::Stderr(Ok(n)) if n > 0 => self.err_buf.extend_from_slice(&err_chunk[..n]),
                Step::Stderr(_) => stderr_open = false,
                Step::Deadline => self.on_evaluate_timeout(),
            }
        }
    }

    fn handle_command(&mut self, command: Command, done_tx: &TransportDone) {
        match command {
            Command::Stat { reply } => {
                let result = stat::sample(&mut self.system, self.pid)
                    .map(|stats| stats.to_value())
                    .ok_or(Reason::Died);
                let _ = reply.send(result);
            }

            Command::Evaluate { source, cellid, reply } => {
                self.queue.push_back(PendingCall {
                    method: EngineMethod::Evaluate,
                    source,
                    cellid,
                    reply,
                });
                self.pump(done_tx);
            }

            Command::Complete { source, reply } => {
                // completion never queues behind an evaluation
                if self.in_flight.is_some() {
                    let _ = reply.send(Err(Reason::Busy));
                    return;
                }
                self.queue.push_back(PendingCall {
                    method: EngineMethod::Complete,
                    source,
                    cellid: None,
                    reply,
                });
                self.pump(done_tx);
            }

            Command::Interrupt { cellid, reply } => self.on_interrupt(cellid, reply),

            Command::Stop { reply } => {
                if self.stopping.is_some() {
                    let _ = reply.send(Err(Reason::Terminating));
                    return;
                }
                self.stopping = Some(reply);
                self.signal(Signal::SIGTERM);
            }

            Command::Kill => {
                if self.stopping.is_none() {
                    self.signal(Signal::SIGKILL);
                }
            }
        }
    }

    /// Dispatch the next queued call if the in-flight slot is free.
    fn pump(&mut self, done_tx: &TransportDone) {
        if self.in_flight.is_some() {
            return;
        }
        let Some(call) = self.queue.pop_front() else {
            return;
        };
        self.in_flight =
            Some(InFlight { cellid: call.cellid, reply: call.reply, timed_out: false });

        let transport = Arc::clone(&self.transport);
        let done_tx = done_tx.clone();
        tokio::spawn(async move {
            let result = transport.call(call.method, &call.source).await;
            let _ = done_tx.send(result).await;
        });

        if !self.evaluate_timeout.is_zero() {
            self.deadline = Some(Instant::now() + self.evaluate_timeout);
        }
    }

    fn on_interrupt(&mut self, cellid: Option<CellId>, reply: StatusReply) {
        let Some(in_flight) = &self.in_flight else {
            let _ = reply.send(Ok("not-evaluating"));
            return;
        };

        if let Some(cellid) = &cellid {
            if in_flight.cellid.as_ref() != Some(cellid) {
                if let Some(position) =
                    self.queue.iter().position(|call| call.cellid.as_ref() == Some(cellid))
                {
                    // the engine never saw this call; answer it locally
                    if let Some(call) = self.queue.remove(position) {
                        let _ = reply.send(Ok("interrupted"));
                        let record = EvalRecord::cancelled(call.source);
                        let _ = call.reply.send(Ok(record_value(&record)));
                    }
                    return;
                }
                // unknown cell id falls through to the in-flight call
            }
        }

        self.signal(Signal::SIGINT);
        let _ = reply.send(Ok("interrupted"));
    }

    /// The evaluation outlived its deadline: interrupt the child and mark
    /// the in-flight call so its (now partial) reply carries the flag.
    fn on_evaluate_timeout(&mut self) {
        self.deadline = None;
        if let Some(in_flight) = &mut self.in_flight {
            in_flight.timed_out = true;
            tracing::info!(engine = %self.id, "evaluation deadline reached");
            self.signal(Signal::SIGINT);
        }
    }

    async fn on_reply(
        &mut self,
        result: Result<Value, TransportError>,
        done_tx: &TransportDone,
        stdout: &mut BufReader<ChildStdout>,
        stderr: &mut ChildStderr,
    ) {
        self.deadline = None;
        let Some(in_flight) = self.in_flight.take() else {
            return;
        };

        match result {
            Ok(mut value) => {
                // capture everything this call produced before the next one
                // can write a byte
                sweep(stdout, &mut self.out_buf).await;
                sweep(stderr, &mut self.err_buf).await;
                let out = String::from_utf8_lossy(&self.out_buf).into_owned();
                let err = String::from_utf8_lossy(&self.err_buf).into_owned();
                self.out_buf.clear();
                self.err_buf.clear();

                if let Some(record) = value.as_object_mut() {
                    record.insert(
                        "memory".to_string(),
                        Value::from(stat::rss(&mut self.system, self.pid)),
                    );
                    if in_flight.timed_out {
                        record.insert("timeout".to_string(), Value::Bool(true));
                    }
                    record.insert("out".to_string(), Value::String(out));
                    record.insert("err".to_string(), Value::String(err));
                }

                self.pump(done_tx);
                let _ = in_flight.reply.send(Ok(value));
            }
            Err(error) => {
                self.out_buf.clear();
                self.err_buf.clear();
                self.pump(done_tx);
                let _ = in_flight.reply.send(Err(error.into()));
            }
        }
    }

    /// Stdout closed: reap the child and settle the engine's fate.
    async fn on_child_exit(&mut self) {
        let _ = self.child.wait().await;

        if let Some(reply) = self.stopping.take() {
            tracing::info!(engine = %self.id, "terminated");
            self.fail_pending(Reason::Died);
            self.remove_cwd().await;
            self.registry.remove(&self.id);
            let _ = reply.send(Ok("terminated"));
        } else {
            tracing::info!(engine = %self.id, "died");
            self.fail_pending(Reason::Died);
            self.remove_cwd().await;
            // the slot stays dead so the next client call reports it
            self.registry.mark_dead(&self.id);
        }
    }

    fn fail_pending(&mut self, reason: Reason) {
        if let Some(in_flight) = self.in_flight.take() {
            let _ = in_flight.reply.send(Err(reason.clone()));
        }
        for call in self.queue.drain(..) {
            let _ = call.reply.send(Err(reason.clone()));
        }
    }

    async fn remove_cwd(&self) {
        if let Err(error) = tokio::fs::remove_dir_all(&self.cwd).await {
            tracing::debug!(engine = %self.id, %error, "working directory removal failed");
        }
    }

    fn signal(&self, signal: Signal) {
        if let Err(error) = signal::kill(Pid::from_raw(self.pid as i32), signal) {
            tracing::debug!(engine = %self.id, ?signal, %error, "signal delivery failed");
        }
    }
}

/// Read whatever is currently available without blocking on a quiet pipe.
async fn sweep<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut Vec<u8>) {
    let mut chunk = [0u8; 8192];
    loop {
        match tokio::time::timeout(Duration::from_millis(20), reader.read(&mut chunk)).await {
            Ok(Ok(n)) if n > 0 => buf.extend_from_slice(&chunk[..n]),
            _ => break,
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn record_value(record: &EvalRecord) -> Value {
    serde_json::to_value(record).unwrap_or(Value::Null)
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
