// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Gateway configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Address the JSON-RPC listener binds.
    pub host: String,
    pub port: u16,

    /// Root for per-engine working directories (`<data_path>/<uuid>`).
    pub data_path: PathBuf,

    /// Seconds a child may take to emit its readiness token.
    pub engine_timeout: f64,

    /// Wall-clock bound per evaluation, in seconds; 0 disables the timer.
    pub evaluate_timeout: f64,

    /// Child environment policy: `true` clones the parent environment, a
    /// table starts empty and copies the listed entries (`NAME = true`
    /// passes the parent value through, `NAME = "text"` is literal).
    pub environ: EnvPolicy,

    /// Prepended to the child's `PYTHONPATH` when set.
    pub python_path: Option<String>,

    /// Engine binary override; resolved next to the current executable
    /// when unset.
    pub engine_binary: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            data_path: default_data_path(),
            engine_timeout: 25.0,
            evaluate_timeout: 0.0,
            environ: EnvPolicy::default(),
            python_path: None,
            engine_binary: None,
        }
    }
}

fn default_data_path() -> PathBuf {
    dirs::data_local_dir().map_or_else(|| PathBuf::from("data"), |dir| dir.join("codelab"))
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|source| SettingsError::Read { path: path.to_path_buf(), source })?;
        toml::from_str(&contents)
            .map_err(|source| SettingsError::Parse { path: path.to_path_buf(), source })
    }

    /// The engine binary this gateway launches.
    pub fn resolve_engine_binary(&self) -> PathBuf {
        self.engine_binary.clone().unwrap_or_else(crate::env::engine_binary)
    }
}

/// How the child environment is assembled.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum EnvPolicy {
    /// `environ = true` clones the parent environment (`false` starts empty).
    Inherit(bool),
    /// Explicit whitelist; everything else is withheld from the child.
    Whitelist(BTreeMap<String, EnvEntry>),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum EnvEntry {
    /// `true` copies the parent's value when present.
    Passthrough(bool),
    Literal(String),
}

impl Default for EnvPolicy {
    fn default() -> Self {
        EnvPolicy::Inherit(true)
    }
}

impl EnvPolicy {
    /// Resolve the policy against a parent environment.
    pub fn resolve(&self, parent: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        match self {
            EnvPolicy::Inherit(true) => parent.clone(),
            EnvPolicy::Inherit(false) => BTreeMap::new(),
            EnvPolicy::Whitelist(entries) => entries
                .iter()
                .filter_map(|(key, entry)| match entry {
                    EnvEntry::Passthrough(true) => {
                        parent.get(key).map(|value| (key.clone(), value.clone()))
                    }
                    EnvEntry::Passthrough(false) => None,
                    EnvEntry::Literal(value) => Some((key.clone(), value.clone())),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;
