// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine kind selection from the client's `engine` argument.

use serde_json::Value;

use crate::Reason;

/// What kind of engine to start, and an optional one-shot preface executed
/// before the engine accepts requests.
///
/// Accepted wire forms: absent/null (defaults to `python`), a bare kind
/// string, or an object `{name?, code?}`. Anything else is `bad-engine`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSpec {
    pub name: String,
    pub code: Option<String>,
}

impl Default for EngineSpec {
    fn default() -> Self {
        Self { name: "python".to_string(), code: None }
    }
}

impl EngineSpec {
    pub fn parse(engine: Option<&Value>) -> Result<Self, Reason> {
        match engine {
            None | Some(Value::Null) => Ok(Self::default()),
            Some(Value::String(name)) => Ok(Self { name: name.to_lowercase(), code: None }),
            Some(Value::Object(map)) => {
                let name = match map.get("name") {
                    None => "python".to_string(),
                    Some(Value::String(name)) => name.to_lowercase(),
                    Some(_) => return Err(Reason::BadEngine),
                };
                let code = match map.get("code") {
                    None | Some(Value::Null) => None,
                    Some(Value::String(code)) => Some(code.clone()),
                    Some(_) => return Err(Reason::BadEngine),
                };
                Ok(Self { name, code })
            }
            Some(_) => Err(Reason::BadEngine),
        }
    }
}

#[cfg(test)]
#[path = "spec_tests.rs"]
mod tests;
