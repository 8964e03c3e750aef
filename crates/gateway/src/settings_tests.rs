// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn defaults_are_sensible() {
    let settings = Settings::default();
    assert_eq!(settings.host, "127.0.0.1");
    assert_eq!(settings.port, 8000);
    assert_eq!(settings.evaluate_timeout, 0.0);
    assert!(settings.engine_timeout > 0.0);
    assert_eq!(settings.environ, EnvPolicy::Inherit(true));
}

#[test]
fn partial_toml_fills_in_defaults() {
    let settings: Settings = toml::from_str("port = 9100\nevaluate_timeout = 1.5\n").unwrap();
    assert_eq!(settings.port, 9100);
    assert_eq!(settings.evaluate_timeout, 1.5);
    assert_eq!(settings.host, "127.0.0.1");
}

#[test]
fn environ_accepts_bool_and_table() {
    let inherit: Settings = toml::from_str("environ = true\n").unwrap();
    assert_eq!(inherit.environ, EnvPolicy::Inherit(true));

    let listed: Settings =
        toml::from_str("[environ]\nPATH = true\nLANG = \"C.UTF-8\"\nTERM = false\n").unwrap();
    let EnvPolicy::Whitelist(entries) = &listed.environ else {
        panic!("expected whitelist");
    };
    assert_eq!(entries["PATH"], EnvEntry::Passthrough(true));
    assert_eq!(entries["LANG"], EnvEntry::Literal("C.UTF-8".to_string()));
}

#[test]
fn whitelist_resolution() {
    let mut parent = BTreeMap::new();
    parent.insert("PATH".to_string(), "/usr/bin".to_string());
    parent.insert("SECRET".to_string(), "hunter2".to_string());

    let policy = EnvPolicy::Whitelist(BTreeMap::from([
        ("PATH".to_string(), EnvEntry::Passthrough(true)),
        ("MISSING".to_string(), EnvEntry::Passthrough(true)),
        ("DISABLED".to_string(), EnvEntry::Passthrough(false)),
        ("LANG".to_string(), EnvEntry::Literal("C".to_string())),
    ]));

    let env = policy.resolve(&parent);
    assert_eq!(env.get("PATH").map(String::as_str), Some("/usr/bin"));
    assert_eq!(env.get("LANG").map(String::as_str), Some("C"));
    assert!(!env.contains_key("SECRET"));
    assert!(!env.contains_key("MISSING"));
    assert!(!env.contains_key("DISABLED"));
}

#[test]
fn inherit_false_is_empty() {
    let mut parent = BTreeMap::new();
    parent.insert("PATH".to_string(), "/usr/bin".to_string());
    assert!(EnvPolicy::Inherit(false).resolve(&parent).is_empty());
    assert_eq!(EnvPolicy::Inherit(true).resolve(&parent), parent);
}

#[test]
fn load_reports_missing_file() {
    let result = Settings::load(Path::new("/nonexistent/codelab.toml"));
    assert!(matches!(result, Err(SettingsError::Read { .. })));
}

#[test]
fn load_reads_a_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("codelab.toml");
    std::fs::write(&path, "port = 9200\n").unwrap();
    let settings = Settings::load(&path).unwrap();
    assert_eq!(settings.port, 9200);
}
