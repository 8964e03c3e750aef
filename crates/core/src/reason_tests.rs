// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    running = { Reason::Running, "running" },
    starting = { Reason::Starting, "starting" },
    died = { Reason::Died, "died" },
    terminating = { Reason::Terminating, "terminating" },
    terminated = { Reason::Terminated, "terminated" },
    does_not_exist = { Reason::DoesNotExist, "does-not-exist" },
    bad_engine = { Reason::BadEngine, "bad-engine" },
    timeout = { Reason::Timeout, "timeout" },
    busy = { Reason::Busy, "busy" },
)]
fn wire_strings(reason: Reason, expected: &str) {
    assert_eq!(reason.to_string(), expected);
}

#[test]
fn fault_carries_detail() {
    assert_eq!(Reason::Fault("boom".into()).to_string(), "fault: boom");
    assert_eq!(Reason::ResponseCode(500).to_string(), "response-code: 500");
}
