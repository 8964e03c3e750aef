// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-kind command builders.
//!
//! Each engine kind maps to a factory that turns `(port, code)` into the
//! argument vector for the child process. The default builders all launch
//! the `codelab-engine` binary with the kind on its command line.

use std::collections::HashMap;
use std::path::Path;

/// Builds the child's argument vector for one engine kind.
pub type CommandBuilder = Box<dyn Fn(u16, Option<&str>) -> Vec<String> + Send + Sync>;

#[derive(Default)]
pub struct BuilderRegistry {
    builders: HashMap<String, CommandBuilder>,
}

impl BuilderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the stock engine kinds.
    pub fn with_defaults(engine_binary: &Path) -> Self {
        let mut registry = Self::new();
        for kind in ["python", "python3", "javascript"] {
            registry.register(kind, engine_command(engine_binary, kind));
        }
        registry
    }

    pub fn register(&mut self, kind: impl Into<String>, builder: CommandBuilder) {
        self.builders.insert(kind.into(), builder);
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.builders.contains_key(kind)
    }

    /// The command vector for `kind`, or `None` for unknown kinds.
    pub fn command(&self, kind: &str, port: u16, code: Option<&str>) -> Option<Vec<String>> {
        self.builders.get(kind).map(|builder| builder(port, code))
    }
}

fn engine_command(binary: &Path, kind: &'static str) -> CommandBuilder {
    let binary = binary.to_string_lossy().into_owned();
    Box::new(move |port, code| {
        let mut command = vec![
            binary.clone(),
            "--engine".to_string(),
            kind.to_string(),
            "--port".to_string(),
            port.to_string(),
        ];
        if let Some(code) = code {
            command.push("--code".to_string());
            command.push(code.to_string());
        }
        command
    })
}

#[cfg(test)]
#[path = "builders_tests.rs"]
mod tests;
