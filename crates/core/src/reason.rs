// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client-visible failure reasons.
//!
//! The `Display` form of each variant is the wire string delivered in
//! `{ok: false, reason}` replies.

use thiserror::Error;

/// Why an engine operation could not be carried out.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Reason {
    /// `start` on an identifier whose engine is already live.
    #[error("running")]
    Running,

    /// Operation while the runner has not handed over yet.
    #[error("starting")]
    Starting,

    /// Engine exited unexpectedly; the registry entry is evicted on this reply.
    #[error("died")]
    Died,

    /// `stop` while the engine is already terminating.
    #[error("terminating")]
    Terminating,

    /// A stop arrived while the engine was still starting.
    #[error("terminated")]
    Terminated,

    /// Identifier unknown to the registry.
    #[error("does-not-exist")]
    DoesNotExist,

    /// Unknown engine kind or malformed `engine` argument.
    #[error("bad-engine")]
    BadEngine,

    /// Startup exceeded `engine_timeout`.
    #[error("timeout")]
    Timeout,

    /// Completion requested while an evaluation is in flight.
    #[error("busy")]
    Busy,

    /// Engine reply could not be transported or decoded.
    #[error("fault: {0}")]
    Fault(String),

    /// Engine replied with a non-success HTTP status.
    #[error("response-code: {0}")]
    ResponseCode(u16),
}

#[cfg(test)]
#[path = "reason_tests.rs"]
mod tests;
