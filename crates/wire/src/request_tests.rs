// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn methods_use_lowercase_wire_names() {
    let req = EngineRequest { method: EngineMethod::Evaluate, source: "1+1".into() };
    let json = serde_json::to_string(&req).unwrap();
    assert_eq!(json, r#"{"method":"evaluate","source":"1+1"}"#);

    let decoded: EngineRequest =
        serde_json::from_str(r#"{"method":"complete","source":"imp"}"#).unwrap();
    assert_eq!(decoded.method, EngineMethod::Complete);
    assert_eq!(decoded.source, "imp");
}

#[test]
fn unicode_source_survives_round_trip() {
    let req = EngineRequest { method: EngineMethod::Evaluate, source: "print('π ≈ 3.14')".into() };
    let json = serde_json::to_string(&req).unwrap();
    let back: EngineRequest = serde_json::from_str(&json).unwrap();
    assert_eq!(back, req);
}
