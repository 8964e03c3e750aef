// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    python = { "python" },
    python3 = { "python3" },
    javascript = { "javascript" },
)]
fn default_kinds_are_registered(kind: &str) {
    let registry = BuilderRegistry::with_defaults(Path::new("/opt/codelab/codelab-engine"));
    assert!(registry.contains(kind));
    let command = registry.command(kind, 4100, None).unwrap();
    assert_eq!(
        command,
        vec![
            "/opt/codelab/codelab-engine".to_string(),
            "--engine".to_string(),
            kind.to_string(),
            "--port".to_string(),
            "4100".to_string(),
        ]
    );
}

#[test]
fn code_is_appended_when_present() {
    let registry = BuilderRegistry::with_defaults(Path::new("codelab-engine"));
    let command = registry.command("python", 4000, Some("import math")).unwrap();
    assert_eq!(command[5], "--code");
    assert_eq!(command[6], "import math");
}

#[test]
fn unknown_kind_yields_none() {
    let registry = BuilderRegistry::with_defaults(Path::new("codelab-engine"));
    assert!(!registry.contains("nope"));
    assert!(registry.command("nope", 4000, None).is_none());
}

#[test]
fn custom_builders_can_be_registered() {
    let mut registry = BuilderRegistry::new();
    registry.register("stub", Box::new(|port, _| vec!["sh".to_string(), port.to_string()]));
    assert_eq!(registry.command("stub", 7, None).unwrap(), vec!["sh", "7"]);
}
