// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Codec properties: arbitrary source text and tracebacks survive the wire.

use proptest::prelude::*;

use crate::{EngineMethod, EngineRequest, Traceback};

proptest! {
    #[test]
    fn engine_request_round_trips(source in "\\PC*") {
        let req = EngineRequest { method: EngineMethod::Evaluate, source };
        let json = serde_json::to_string(&req).unwrap();
        let back: EngineRequest = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(back, req);
    }

    #[test]
    fn traceback_round_trips(text in proptest::option::of("\\PC*")) {
        let traceback = match text {
            None => Traceback::None,
            Some(text) => Traceback::Text(text),
        };
        let json = serde_json::to_string(&traceback).unwrap();
        let back: Traceback = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(back, traceback);
    }
}
