// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the gateway crate.

use std::path::PathBuf;

/// Settings file location when `--config` is not given.
pub fn config_path() -> Option<PathBuf> {
    std::env::var("CODELAB_CONFIG").ok().map(PathBuf::from)
}

/// Locate the engine binary: `CODELAB_ENGINE_BIN` wins, then a sibling of
/// the current executable (test binaries live one directory deeper), then
/// whatever `PATH` resolves.
pub fn engine_binary() -> PathBuf {
    if let Ok(path) = std::env::var("CODELAB_ENGINE_BIN") {
        return PathBuf::from(path);
    }
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let sibling = dir.join("codelab-engine");
            if sibling.exists() {
                return sibling;
            }
            if let Some(above) = dir.parent() {
                let candidate = above.join("codelab-engine");
                if candidate.exists() {
                    return candidate;
                }
            }
        }
    }
    PathBuf::from("codelab-engine")
}
