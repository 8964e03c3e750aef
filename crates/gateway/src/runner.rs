// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine startup.
//!
//! One runner task per `start` call: allocate a working directory and a
//! loopback port, spawn the child with a hardened environment, and race its
//! readiness token against the startup deadline and stop requests. On
//! readiness the registry slot is swapped to a dispatcher; on any failure
//! the working directory and the slot are cleaned up before the caller
//! hears the reason.

use std::collections::BTreeMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Duration;

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use regex::Regex;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Child;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use codelab_core::{EngineId, EngineSpec, Reason};

use crate::builders::BuilderRegistry;
use crate::dispatcher::{Dispatcher, DispatcherParts};
use crate::manager::Registry;
use crate::settings::Settings;
use crate::stat;
use crate::transport::TransportFactory;

pub(crate) struct RunnerCtx {
    pub id: EngineId,
    pub spec: EngineSpec,
    pub settings: Arc<Settings>,
    pub builders: Arc<BuilderRegistry>,
    pub registry: Arc<Registry>,
    pub transport_factory: TransportFactory,
    pub cancel: CancellationToken,
    pub reply: oneshot::Sender<Result<Value, Reason>>,
}

pub(crate) async fn run(ctx: RunnerCtx) {
    let RunnerCtx { id, spec, settings, builders, registry, transport_factory, cancel, reply } =
        ctx;
    let result = launch(&id, &spec, &settings, &builders, &registry, transport_factory, &cancel)
        .await;
    if result.is_err() {
        registry.remove(&id);
    }
    let _ = reply.send(result);
}

async fn launch(
    id: &EngineId,
    spec: &EngineSpec,
    settings: &Settings,
    builders: &BuilderRegistry,
    registry: &Arc<Registry>,
    transport_factory: TransportFactory,
    cancel: &CancellationToken,
) -> Result<Value, Reason> {
    let port = free_port().ok_or(Reason::Died)?;
    let command = builders.command(&spec.name, port, spec.code.as_deref()).ok_or(Reason::BadEngine)?;

    // a stale directory from a previous engine of the same name is discarded
    let cwd = settings.data_path.join(id.as_str());
    if cwd.exists() {
        let _ = tokio::fs::remove_dir_all(&cwd).await;
    }
    tokio::fs::create_dir_all(&cwd).await.map_err(|error| {
        tracing::warn!(engine = %id, %error, "working directory creation failed");
        Reason::Died
    })?;

    let env = build_env(settings, &cwd);
    let mut child = match spawn_child(&command, &cwd, &env) {
        Ok(child) => child,
        Err(error) => {
            tracing::warn!(engine = %id, %error, "spawn failed");
            cleanup_cwd(&cwd).await;
            return Err(Reason::Died);
        }
    };

    let Some(stdout) = child.stdout.take() else {
        let _ = child.start_kill();
        let _ = child.wait().await;
        cleanup_cwd(&cwd).await;
        return Err(Reason::Died);
    };
    let mut stdout = BufReader::new(stdout);

    let deadline = Instant::now() + Duration::from_secs_f64(settings.engine_timeout.max(0.0));
    let mut line = String::new();

    enum Step {
        Cancelled,
        Deadline,
        Read(std::io::Result<usize>),
    }

    loop {
        line.clear();
        let step = tokio::select! {
            _ = cancel.cancelled() => Step::Cancelled,
            _ = tokio::time::sleep_until(deadline) => Step::Deadline,
            read = stdout.read_line(&mut line) => Step::Read(read),
        };
        match step {
            Step::Cancelled => {
                terminate(&mut child).await;
                cleanup_cwd(&cwd).await;
                tracing::info!(engine = %id, "terminated during startup");
                return Err(Reason::Terminated);
            }
            Step::Deadline => {
                let _ = child.start_kill();
                let _ = child.wait().await;
                cleanup_cwd(&cwd).await;
                tracing::warn!(engine = %id, "startup timed out");
                return Err(Reason::Timeout);
            }
            Step::Read(Ok(0)) | Step::Read(Err(_)) => {
                let _ = child.wait().await;
                cleanup_cwd(&cwd).await;
                tracing::warn!(engine = %id, "engine exited before readiness");
                return Err(Reason::Died);
            }
            Step::Read(Ok(_)) => {
                if parse_ready(&line).is_some() {
                    break;
                }
                tracing::debug!(engine = %id, output = %line.trim_end(), "engine output before readiness");
            }
        }
    }

    // a stop that raced the readiness token still wins
    if cancel.is_cancelled() {
        terminate(&mut child).await;
        cleanup_cwd(&cwd).await;
        return Err(Reason::Terminated);
    }

    let Some(pid) = child.id() else {
        let _ = child.wait().await;
        cleanup_cwd(&cwd).await;
        return Err(Reason::Died);
    };
    let Some(stderr) = child.stderr.take() else {
        let _ = child.start_kill();
        let _ = child.wait().await;
        cleanup_cwd(&cwd).await;
        return Err(Reason::Died);
    };

    let mut system = stat::system();
    let memory = stat::rss(&mut system, pid);

    let handle = Dispatcher::spawn(DispatcherParts {
        id: id.clone(),
        registry: Arc::clone(registry),
        child,
        pid,
        cwd,
        transport: transport_factory(port),
        evaluate_timeout: Duration::from_secs_f64(settings.evaluate_timeout.max(0.0)),
        stdout,
        stderr,
    });
    registry.set_running(id, handle);

    tracing::info!(engine = %id, pid, port, "engine started");

    Ok(json!({ "status": "started", "uuid": id, "memory": memory }))
}

/// Bind port 0 on loopback and release it; the child re-binds the number.
fn free_port() -> Option<u16> {
    let listener = std::net::TcpListener::bind(("127.0.0.1", 0)).ok()?;
    Some(listener.local_addr().ok()?.port())
}

/// First line matching `OK (pid=<n>)` marks readiness.
pub(crate) fn parse_ready(line: &str) -> Option<u32> {
    static READY: OnceLock<Option<Regex>> = OnceLock::new();
    let pattern = READY.get_or_init(|| Regex::new(r"OK \(pid=(\d+)\)").ok()).as_ref()?;
    pattern.captures(line)?.get(1)?.as_str().parse().ok()
}

/// Hardened child environment: the configured policy, `PYTHONPATH` joined
/// with any inherited value, and `HOME`/`PYTHONUSERBASE` pinned to the
/// working directory.
pub(crate) fn build_env(settings: &Settings, cwd: &Path) -> BTreeMap<String, String> {
    let parent: BTreeMap<String, String> = std::env::vars().collect();
    let mut env = settings.environ.resolve(&parent);

    if let Some(computed) = &settings.python_path {
        let inherited =
            env.get("PYTHONPATH").cloned().or_else(|| parent.get("PYTHONPATH").cloned());
        let joined = match inherited {
            Some(path) if !path.is_empty() => format!("{computed}:{path}"),
            _ => computed.clone(),
        };
        env.insert("PYTHONPATH".to_string(), joined);
    }

    let home = cwd.to_string_lossy().into_owned();
    env.insert("HOME".to_string(), home.clone());
    env.insert("PYTHONUSERBASE".to_string(), home);
    env
}

fn spawn_child(
    command: &[String],
    cwd: &Path,
    env: &BTreeMap<String, String>,
) -> std::io::Result<Child> {
    let (program, args) = command
        .split_first()
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command"))?;
    tokio::process::Command::new(program)
        .args(args)
        .env_clear()
        .envs(env)
        .current_dir(cwd)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
}

/// Graceful termination with a forced fallback.
async fn terminate(child: &mut Child) {
    if let Some(pid) = child.id() {
        let _ = signal::kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
    }
    if tokio::time::timeout(Duration::from_secs(5), child.wait()).await.is_err() {
        let _ = child.start_kill();
        let _ = child.wait().await;
    }
}

async fn cleanup_cwd(cwd: &Path) {
    if let Err(error) = tokio::fs::remove_dir_all(cwd).await {
        tracing::debug!(%error, "working directory removal failed");
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
