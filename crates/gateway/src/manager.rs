// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process manager: the registry of logical engines and the entry points
//! the RPC layer calls.
//!
//! A slot is a runner while the engine is starting, a dispatcher handle
//! once it is live, and a tombstone after an unexpected exit. The
//! tombstone is evicted by the next client call, so `died` is reported
//! exactly once per crash.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use codelab_core::{CellId, EngineId, EngineSpec, Reason};

use crate::builders::BuilderRegistry;
use crate::dispatcher::Command;
use crate::runner::{self, RunnerCtx};
use crate::settings::Settings;
use crate::transport::{http_factory, TransportFactory};

/// Registry slot: one per logical engine identifier.
pub(crate) enum Slot {
    Starting { cancel: CancellationToken },
    Running(EngineHandle),
    Dead,
}

/// Channel to a live engine's dispatcher.
#[derive(Clone)]
pub(crate) struct EngineHandle {
    pub tx: mpsc::Sender<Command>,
    #[allow(dead_code)]
    pub pid: u32,
}

#[derive(Default)]
pub(crate) struct Registry {
    slots: Mutex<HashMap<EngineId, Slot>>,
}

impl Registry {
    pub(crate) fn set_running(&self, id: &EngineId, handle: EngineHandle) {
        self.slots.lock().insert(id.clone(), Slot::Running(handle));
    }

    pub(crate) fn mark_dead(&self, id: &EngineId) {
        let mut slots = self.slots.lock();
        if let Some(slot) = slots.get_mut(id) {
            *slot = Slot::Dead;
        }
    }

    pub(crate) fn remove(&self, id: &EngineId) {
        self.slots.lock().remove(id);
    }
}

pub struct ProcessManager {
    settings: Arc<Settings>,
    registry: Arc<Registry>,
    builders: Arc<BuilderRegistry>,
    transport_factory: TransportFactory,
}

impl ProcessManager {
    pub fn new(settings: Settings) -> Arc<Self> {
        let builders = BuilderRegistry::with_defaults(&settings.resolve_engine_binary());
        Self::with_parts(settings, builders, http_factory())
    }

    pub(crate) fn with_parts(
        settings: Settings,
        builders: BuilderRegistry,
        transport_factory: TransportFactory,
    ) -> Arc<Self> {
        Arc::new(Self {
            settings: Arc::new(settings),
            registry: Arc::new(Registry::default()),
            builders: Arc::new(builders),
            transport_factory,
        })
    }

    /// Start a new engine. Minting an identifier when the client supplied
    /// none; replies once the engine is ready (or failed to become so).
    pub async fn start(
        &self,
        uuid: Option<EngineId>,
        engine: Option<&Value>,
    ) -> Result<Value, Reason> {
        let id = uuid.unwrap_or_else(EngineId::mint);
        let cancel = CancellationToken::new();
        {
            let mut slots = self.registry.slots.lock();
            match slots.get(&id) {
                Some(Slot::Starting { .. }) => return Err(Reason::Starting),
                Some(Slot::Running(_)) => return Err(Reason::Running),
                Some(Slot::Dead) => {
                    slots.remove(&id);
                    return Err(Reason::Died);
                }
                None => {
                    slots.insert(id.clone(), Slot::Starting { cancel: cancel.clone() });
                }
            }
        }

        let spec = match EngineSpec::parse(engine) {
            Ok(spec) if self.builders.contains(&spec.name) => spec,
            _ => {
                self.registry.remove(&id);
                return Err(Reason::BadEngine);
            }
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        tokio::spawn(runner::run(RunnerCtx {
            id: id.clone(),
            spec,
            settings: Arc::clone(&self.settings),
            builders: Arc::clone(&self.builders),
            registry: Arc::clone(&self.registry),
            transport_factory: self.transport_factory.clone(),
            cancel,
            reply: reply_tx,
        }));

        reply_rx.await.map_err(|_| Reason::Died)?
    }

    /// Stop an engine. A starting engine is cancelled and reaped by its
    /// runner; a live one is terminated by its dispatcher.
    pub async fn stop(&self, id: &EngineId) -> Result<&'static str, Reason> {
        enum Route {
            Cancel(CancellationToken),
            Forward(mpsc::Sender<Command>),
        }

        let route = {
            let mut slots = self.registry.slots.lock();
            match slots.get(id) {
                None => return Err(Reason::DoesNotExist),
                Some(Slot::Dead) => {
                    slots.remove(id);
                    return Err(Reason::Died);
                }
                Some(Slot::Starting { cancel }) => Route::Cancel(cancel.clone()),
                Some(Slot::Running(handle)) => Route::Forward(handle.tx.clone()),
            }
        };

        match route {
            Route::Cancel(cancel) => {
                cancel.cancel();
                Ok("terminated")
            }
            Route::Forward(tx) => {
                let (reply_tx, reply_rx) = oneshot::channel();
                tx.send(Command::Stop { reply: reply_tx }).await.map_err(|_| Reason::Died)?;
                reply_rx.await.map_err(|_| Reason::Died)?
            }
        }
    }

    pub async fn evaluate(
        &self,
        id: &EngineId,
        source: String,
        cellid: Option<CellId>,
    ) -> Result<Value, Reason> {
        let tx = self.route(id)?;
        let (reply_tx, reply_rx) = oneshot::channel();
        tx.send(Command::Evaluate { source, cellid, reply: reply_tx })
            .await
            .map_err(|_| Reason::Died)?;
        reply_rx.await.map_err(|_| Reason::Died)?
    }

    pub async fn complete(&self, id: &EngineId, source: String) -> Result<Value, Reason> {
        let tx = self.route(id)?;
        let (reply_tx, reply_rx) = oneshot::channel();
        tx.send(Command::Complete { source, reply: reply_tx }).await.map_err(|_| Reason::Died)?;
        reply_rx.await.map_err(|_| Reason::Died)?
    }

    pub async fn interrupt(
        &self,
        id: &EngineId,
        cellid: Option<CellId>,
    ) -> Result<&'static str, Reason> {
        let tx = self.route(id)?;
        let (reply_tx, reply_rx) = oneshot::channel();
        tx.send(Command::Interrupt { cellid, reply: reply_tx }).await.map_err(|_| Reason::Died)?;
        reply_rx.await.map_err(|_| Reason::Died)?
    }

    pub async fn stat(&self, id: &EngineId) -> Result<Value, Reason> {
        let tx = self.route(id)?;
        let (reply_tx, reply_rx) = oneshot::channel();
        tx.send(Command::Stat { reply: reply_tx }).await.map_err(|_| Reason::Died)?;
        reply_rx.await.map_err(|_| Reason::Died)?
    }

    /// Force-kill every engine; used on service shutdown.
    pub async fn kill_all(&self) {
        enum Target {
            Cancel(CancellationToken),
            Kill(mpsc::Sender<Command>),
        }

        let targets: Vec<(EngineId, Target)> = {
            let slots = self.registry.slots.lock();
            slots
                .iter()
                .filter_map(|(id, slot)| match slot {
                    Slot::Starting { cancel } => {
                        Some((id.clone(), Target::Cancel(cancel.clone())))
                    }
                    Slot::Running(handle) => Some((id.clone(), Target::Kill(handle.tx.clone()))),
                    Slot::Dead => None,
                })
                .collect()
        };

        for (id, target) in targets {
            tracing::warn!(engine = %id, "forced kill");
            match target {
                Target::Cancel(cancel) => cancel.cancel(),
                Target::Kill(tx) => {
                    let _ = tx.send(Command::Kill).await;
                }
            }
        }
    }

    /// Route a non-start entry point to the engine's dispatcher.
    fn route(&self, id: &EngineId) -> Result<mpsc::Sender<Command>, Reason> {
        let mut slots = self.registry.slots.lock();
        match slots.get(id) {
            None => Err(Reason::DoesNotExist),
            Some(Slot::Starting { .. }) => Err(Reason::Starting),
            Some(Slot::Dead) => {
                slots.remove(id);
                Err(Reason::Died)
            }
            Some(Slot::Running(handle)) => Ok(handle.tx.clone()),
        }
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
