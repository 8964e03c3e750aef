// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

use serial_test::serial;
use yare::parameterized;

use crate::settings::{EnvEntry, EnvPolicy};

#[parameterized(
    bare = { "OK (pid=123)\n", Some(123) },
    prefixed = { "warming up... OK (pid=9)\n", Some(9) },
    diagnostics = { "loading numpy\n", None },
    malformed = { "OK pid=3\n", None },
    empty = { "", None },
)]
fn readiness_token(line: &str, expected: Option<u32>) {
    assert_eq!(parse_ready(line), expected);
}

#[test]
#[serial]
fn child_env_pins_home_to_the_working_directory() {
    let settings = Settings { environ: EnvPolicy::Inherit(false), ..Settings::default() };
    let env = build_env(&settings, Path::new("/data/e-1"));
    assert_eq!(env.get("HOME").map(String::as_str), Some("/data/e-1"));
    assert_eq!(env.get("PYTHONUSERBASE").map(String::as_str), Some("/data/e-1"));
    assert!(!env.contains_key("PYTHONPATH"));
}

#[test]
#[serial]
fn python_path_joins_the_inherited_value() {
    std::env::set_var("PYTHONPATH", "/site/packages");
    let settings = Settings {
        environ: EnvPolicy::Inherit(false),
        python_path: Some("/lab/python".to_string()),
        ..Settings::default()
    };
    let env = build_env(&settings, Path::new("/data/e-1"));
    assert_eq!(env.get("PYTHONPATH").map(String::as_str), Some("/lab/python:/site/packages"));
    std::env::remove_var("PYTHONPATH");
}

#[test]
#[serial]
fn python_path_stands_alone_without_inherited_value() {
    std::env::remove_var("PYTHONPATH");
    let settings = Settings {
        environ: EnvPolicy::Inherit(false),
        python_path: Some("/lab/python".to_string()),
        ..Settings::default()
    };
    let env = build_env(&settings, Path::new("/data/e-1"));
    assert_eq!(env.get("PYTHONPATH").map(String::as_str), Some("/lab/python"));
}

#[test]
#[serial]
fn whitelist_literal_pythonpath_feeds_the_join() {
    std::env::remove_var("PYTHONPATH");
    let settings = Settings {
        environ: EnvPolicy::Whitelist(
            [("PYTHONPATH".to_string(), EnvEntry::Literal("/extra".to_string()))].into(),
        ),
        python_path: Some("/lab/python".to_string()),
        ..Settings::default()
    };
    let env = build_env(&settings, Path::new("/data/e-1"));
    assert_eq!(env.get("PYTHONPATH").map(String::as_str), Some("/lab/python:/extra"));
}
