// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire formats for the codelab gateway.
//!
//! Two surfaces share this crate: the engine-facing request/result codec
//! (JSON over a loopback HTTP channel, one call one reply) and the
//! client-facing JSON-RPC 2.0 envelope.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod record;
mod request;
mod rpc;

pub use record::{
    BasicInfo, CompleteRecord, Completion, EvalRecord, InspectRecord, ObjectInfo, Plot, Traceback,
};
pub use request::{EngineMethod, EngineRequest};
pub use rpc::{
    RpcError, RpcRequest, RpcResponse, AUTH_REQUIRED, INTERNAL_ERROR, INVALID_PARAMS,
    INVALID_REQUEST, METHOD_NOT_FOUND, PARSE_ERROR,
};

#[cfg(test)]
mod property_tests;
