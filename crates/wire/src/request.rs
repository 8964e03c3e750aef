// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};

/// One call carried from the dispatcher to an engine process.
///
/// Unicode source is preserved verbatim; the engine replies with a single
/// structured result record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineRequest {
    pub method: EngineMethod,
    pub source: String,
}

/// Engine-side operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineMethod {
    Evaluate,
    Complete,
}

impl std::fmt::Display for EngineMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineMethod::Evaluate => write!(f, "evaluate"),
            EngineMethod::Complete => write!(f, "complete"),
        }
    }
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
