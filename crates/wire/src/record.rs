// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Structured result records produced by engine processes.
//!
//! The gateway augments decoded records with captured stdio and resource
//! statistics before handing them to clients; fields that only exist after
//! augmentation are optional here.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Either no traceback (`false` on the wire) or formatted traceback text.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Traceback {
    #[default]
    None,
    Text(String),
}

impl Traceback {
    pub fn is_none(&self) -> bool {
        matches!(self, Traceback::None)
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Traceback::None => None,
            Traceback::Text(text) => Some(text),
        }
    }
}

impl From<String> for Traceback {
    fn from(text: String) -> Self {
        Traceback::Text(text)
    }
}

impl Serialize for Traceback {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Traceback::None => serializer.serialize_bool(false),
            Traceback::Text(text) => serializer.serialize_str(text),
        }
    }
}

impl<'de> Deserialize<'de> for Traceback {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Bool(false) => Ok(Traceback::None),
            Value::String(text) => Ok(Traceback::Text(text)),
            other => Err(D::Error::custom(format!("expected false or string, got {}", other))),
        }
    }
}

/// One plot artefact harvested from an evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plot {
    pub data: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub mime: String,
    pub encoding: String,
    pub checksum: String,
}

/// Result record for an `evaluate` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalRecord {
    pub source: String,
    /// Monotonic per engine; null only in results synthesised for calls
    /// cancelled while still queued.
    pub index: Option<u64>,
    pub time: f64,
    #[serde(default)]
    pub plots: Vec<Plot>,
    #[serde(default)]
    pub traceback: Traceback,
    pub interrupted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub err: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<bool>,
}

impl EvalRecord {
    /// The record delivered to a queued call cancelled by `interrupt`.
    /// The engine never saw the call, so there is no index and no timing.
    pub fn cancelled(source: String) -> Self {
        Self {
            source,
            index: None,
            time: 0.0,
            plots: Vec::new(),
            traceback: Traceback::None,
            interrupted: true,
            out: Some(String::new()),
            err: Some(String::new()),
            memory: None,
            timeout: None,
        }
    }
}

/// Result record for an inspection request (`?name` and friends).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InspectRecord {
    pub source: String,
    pub text: String,
    /// Null when the dotted name does not resolve.
    pub info: Option<ObjectInfo>,
    pub more: bool,
    pub index: u64,
    pub interrupted: bool,
}

/// Details about an inspected object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectInfo {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docstring: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Result record for a `complete` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteRecord {
    /// Null when completion was interrupted before producing candidates.
    pub completions: Option<Vec<Completion>>,
    pub interrupted: bool,
}

/// One completion candidate with its resolved kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    #[serde(rename = "match")]
    pub matched: String,
    pub info: BasicInfo,
}

/// Kind attached to a completion candidate (`keyword` when the dotted path
/// does not resolve in the namespace).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicInfo {
    #[serde(rename = "type")]
    pub kind: String,
}

impl BasicInfo {
    pub fn keyword() -> Self {
        Self { kind: "keyword".to_string() }
    }
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod tests;
