// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

struct EchoInterpreter {
    preface: Vec<String>,
    calls: u64,
}

impl Interpreter for EchoInterpreter {
    fn execute(&mut self, source: &str) -> Result<(), HostError> {
        if source == "boom" {
            return Err(HostError::Interpreter("boom".to_string()));
        }
        self.preface.push(source.to_string());
        Ok(())
    }

    fn evaluate(&mut self, source: &str) -> Value {
        self.calls += 1;
        json!({"source": source, "index": self.calls})
    }

    fn complete(&mut self, source: &str) -> Value {
        json!({"completions": [source], "interrupted": false})
    }
}

fn echo() -> Result<EchoInterpreter, HostError> {
    Ok(EchoInterpreter { preface: Vec::new(), calls: 0 })
}

#[tokio::test]
async fn calls_are_serviced_in_order() {
    let handle = spawn(echo, None).unwrap();
    let first = handle.call(EngineMethod::Evaluate, "a".to_string()).await.unwrap();
    let second = handle.call(EngineMethod::Evaluate, "b".to_string()).await.unwrap();
    assert_eq!(first, json!({"source": "a", "index": 1}));
    assert_eq!(second, json!({"source": "b", "index": 2}));
}

#[tokio::test]
async fn complete_routes_to_interpreter() {
    let handle = spawn(echo, None).unwrap();
    let reply = handle.call(EngineMethod::Complete, "imp".to_string()).await.unwrap();
    assert_eq!(reply, json!({"completions": ["imp"], "interrupted": false}));
}

#[tokio::test]
async fn preface_failure_aborts_startup() {
    let result = spawn(echo, Some("boom".to_string()));
    assert!(matches!(result, Err(HostError::Interpreter(_))));
}

#[test]
fn to_value_degrades_instead_of_dropping() {
    let value = to_value(&json!({"k": "v"}));
    assert_eq!(value, json!({"k": "v"}));
}
