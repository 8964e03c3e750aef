// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client-facing JSON-RPC listener.
//!
//! A thin shim over the process manager: protocol failures become JSON-RPC
//! errors over HTTP 400, engine-level failures become `{ok: false, reason}`
//! results on HTTP 200.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use codelab_core::{EngineId, Reason};
use codelab_wire::{RpcRequest, RpcResponse, INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND, PARSE_ERROR};

use crate::manager::ProcessManager;

pub fn router(manager: Arc<ProcessManager>) -> Router {
    Router::new().route("/", post(handle)).with_state(manager)
}

struct ProtocolError {
    code: i64,
    message: String,
}

async fn handle(
    State(manager): State<Arc<ProcessManager>>,
    body: Bytes,
) -> (StatusCode, Json<RpcResponse>) {
    let request: RpcRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(error) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(RpcResponse::error(Value::Null, PARSE_ERROR, error.to_string())),
            );
        }
    };

    let id = request.id.clone();

    if request.jsonrpc != "2.0" {
        return (
            StatusCode::BAD_REQUEST,
            Json(RpcResponse::error(id, INVALID_REQUEST, "unsupported jsonrpc version")),
        );
    }

    match dispatch(&manager, &request).await {
        Ok(result) => (StatusCode::OK, Json(RpcResponse::result(id, result))),
        Err(error) => {
            (StatusCode::BAD_REQUEST, Json(RpcResponse::error(id, error.code, error.message)))
        }
    }
}

#[derive(Deserialize)]
struct InitParams {
    uuid: Option<String>,
    engine: Option<Value>,
}

#[derive(Deserialize)]
struct UuidParams {
    uuid: String,
}

#[derive(Deserialize)]
struct SourceParams {
    uuid: String,
    source: String,
}

#[derive(Deserialize)]
struct EvaluateParams {
    uuid: String,
    source: String,
    cellid: Option<String>,
}

#[derive(Deserialize)]
struct InterruptParams {
    uuid: String,
    cellid: Option<String>,
}

async fn dispatch(manager: &ProcessManager, request: &RpcRequest) -> Result<Value, ProtocolError> {
    match request.method.as_str() {
        "Engine.init" => {
            let params: InitParams = params(request)?;
            let uuid = params.uuid.map(EngineId::from);
            Ok(outcome(manager.start(uuid, params.engine.as_ref()).await))
        }

        "Engine.kill" => {
            let params: UuidParams = params(request)?;
            Ok(status_outcome(manager.stop(&EngineId::from(params.uuid)).await))
        }

        "Engine.stat" => {
            let params: UuidParams = params(request)?;
            Ok(outcome(manager.stat(&EngineId::from(params.uuid)).await))
        }

        "Engine.complete" => {
            let params: SourceParams = params(request)?;
            Ok(outcome(manager.complete(&EngineId::from(params.uuid), params.source).await))
        }

        "Engine.evaluate" => {
            let params: EvaluateParams = params(request)?;
            let cellid = params.cellid.map(Into::into);
            Ok(outcome(
                manager.evaluate(&EngineId::from(params.uuid), params.source, cellid).await,
            ))
        }

        "Engine.interrupt" => {
            let params: InterruptParams = params(request)?;
            let cellid = params.cellid.map(Into::into);
            Ok(status_outcome(manager.interrupt(&EngineId::from(params.uuid), cellid).await))
        }

        other => Err(ProtocolError {
            code: METHOD_NOT_FOUND,
            message: format!("unknown method: {other}"),
        }),
    }
}

fn params<T: DeserializeOwned>(request: &RpcRequest) -> Result<T, ProtocolError> {
    serde_json::from_value(request.params.clone())
        .map_err(|error| ProtocolError { code: INVALID_PARAMS, message: error.to_string() })
}

/// Fold a manager result into the `{ok, ...}` shape clients consume.
fn outcome(result: Result<Value, Reason>) -> Value {
    match result {
        Ok(mut value) => match value.as_object_mut() {
            Some(record) => {
                record.insert("ok".to_string(), Value::Bool(true));
                value
            }
            None => json!({"ok": true, "result": value}),
        },
        Err(reason) => json!({"ok": false, "reason": reason.to_string()}),
    }
}

fn status_outcome(result: Result<&'static str, Reason>) -> Value {
    match result {
        Ok(status) => json!({"ok": true, "status": status}),
        Err(reason) => json!({"ok": false, "reason": reason.to_string()}),
    }
}

#[cfg(test)]
#[path = "rpc_tests.rs"]
mod tests;
