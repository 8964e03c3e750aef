// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Embedded Python interpreter with two-stage evaluation.
//!
//! Multi-line source is split into a statement prelude and an expression
//! tail at the last logical line (located with Python's own `tokenize`);
//! the tail's value is routed through `sys.displayhook` so it prints the
//! way a REPL would. Results, tracebacks and interruptions are folded into
//! a single structured record.

mod inspector;
pub mod namespace;

use std::time::Instant;

use pyo3::exceptions::{PyKeyboardInterrupt, PySystemExit};
use pyo3::prelude::*;
use pyo3::types::PyDict;
use serde_json::Value;

use codelab_wire::{
    BasicInfo, CompleteRecord, Completion, EvalRecord, InspectRecord, Plot, Traceback,
};

use crate::host::{to_value, HostError, Interpreter};

const SOURCE_NAME: &str = "<codelab>";

pub struct PythonInterpreter {
    namespace: Py<PyDict>,
    index: u64,
}

impl PythonInterpreter {
    pub fn new() -> Result<Self, HostError> {
        Self::with_disabled(namespace::DEFAULT_DISABLE)
    }

    pub fn with_disabled(disable: &[&str]) -> Result<Self, HostError> {
        Python::with_gil(|py| {
            // pyo3 initialises CPython without its SIGINT handler; install it
            // so evaluation raises KeyboardInterrupt at the next bytecode
            // check. Only the thread that owns the runtime may do this, so a
            // failure leaves interruption disabled rather than aborting.
            let _ = py.run_bound(
                "import signal; signal.signal(signal.SIGINT, signal.default_int_handler)",
                None,
                None,
            );
            let ns = PyDict::new_bound(py);
            namespace::setup(py, &ns, disable)
                .map_err(|error| HostError::Interpreter(error.to_string()))?;
            Ok(Self { namespace: ns.unbind(), index: 0 })
        })
    }

    fn evaluate_with_gil(&mut self, py: Python<'_>, raw: &str) -> Value {
        self.discard_stale_interrupt(py);

        let normalised = raw.replace('\r', "");
        let source = normalised.trim_end().to_string();

        let (prelude, tail) = if source.contains('\n') {
            split_last_logical_line(py, &source)
        } else {
            (None, source.clone())
        };

        let mut exec_src = prelude;
        let eval_code = match compile(py, &format!("{tail}\n"), "eval") {
            Ok(code) => Some(code),
            Err(_) => {
                if !source.contains('\n') && is_inspect(&source) {
                    return to_value(&self.inspect(py, &source));
                }
                exec_src = Some(source.clone());
                None
            }
        };

        let namespace = self.namespace.bind(py).clone();
        let _ = namespace.del_item("__plots__");

        let mut interrupted = false;
        let mut traceback = Traceback::None;
        let mut result: Option<Bound<'_, PyAny>> = None;

        let started = Instant::now();

        'evaluate: {
            if let Some(prelude) = &exec_src {
                let code = match compile(py, prelude, "exec") {
                    Ok(code) => code,
                    Err(error) => {
                        traceback = Traceback::Text(format_syntax_error(py, &error));
                        break 'evaluate;
                    }
                };
                if let Err(error) = run_code(py, &code, &namespace) {
                    (traceback, interrupted) = trap(py, error);
                    break 'evaluate;
                }
            }
            if let Some(code) = &eval_code {
                match run_code(py, code, &namespace) {
                    Ok(value) => {
                        let _ = display(py, &value);
                        if !value.is_none() {
                            result = Some(value);
                        }
                    }
                    Err(error) => (traceback, interrupted) = trap(py, error),
                }
            }
        }

        let time = started.elapsed().as_secs_f64();

        self.index += 1;
        if let Some(value) = &result {
            let _ = namespace.set_item(format!("_{}", self.index), value);
            rotate_history(py, &namespace, value);
        }

        to_value(&EvalRecord {
            source,
            index: Some(self.index),
            time,
            plots: harvest_plots(&namespace),
            traceback,
            interrupted,
            out: None,
            err: None,
            memory: None,
            timeout: None,
        })
    }

    fn inspect(&mut self, py: Python<'_>, source: &str) -> InspectRecord {
        let mut text = source;
        let mut more = false;

        if let Some(stripped) = text.strip_prefix("??") {
            text = stripped;
            more = true;
        }
        if let Some(stripped) = text.strip_suffix("??") {
            text = stripped;
            more = true;
        }
        if !more {
            if let Some(stripped) = text.strip_prefix('?') {
                text = stripped;
            }
            if let Some(stripped) = text.strip_suffix('?') {
                text = stripped;
            }
        }
        let text = text.trim().to_string();

        let namespace = self.namespace.bind(py);
        let info = resolve_dotted(py, namespace, &text)
            .map(|object| inspector::describe(py, &object, more));

        self.index += 1;

        InspectRecord {
            source: source.to_string(),
            text,
            info,
            more,
            index: self.index,
            interrupted: false,
        }
    }

    fn complete_with_gil(&mut self, py: Python<'_>, source: &str) -> Value {
        self.discard_stale_interrupt(py);

        let namespace = self.namespace.bind(py);
        let gather = || -> PyResult<Vec<String>> {
            let completer =
                py.import_bound("rlcompleter")?.getattr("Completer")?.call1((namespace,))?;
            let mut matches = std::collections::BTreeSet::new();
            let mut state: usize = 0;
            loop {
                let candidate = completer.call_method1("complete", (source, state))?;
                if candidate.is_none() {
                    break;
                }
                matches.insert(candidate.extract::<String>()?);
                state += 1;
            }
            // candidates carry rlcompleter's decorations: a call paren for
            // callables, a space or colon after keywords
            let stripped: std::collections::BTreeSet<String> = matches
                .into_iter()
                .map(|m| m.trim_end().trim_end_matches(':').trim_end_matches('(').to_string())
                .filter(|m| !m.is_empty())
                .collect();
            Ok(stripped.into_iter().collect())
        };

        let record = match gather() {
            Ok(matches) => {
                let completions = matches
                    .into_iter()
                    .map(|matched| {
                        let info = match resolve_dotted(py, namespace, &matched) {
                            Some(object) => BasicInfo { kind: inspector::kind_of(py, &object) },
                            None => BasicInfo::keyword(),
                        };
                        Completion { matched, info }
                    })
                    .collect();
                CompleteRecord { completions: Some(completions), interrupted: false }
            }
            Err(error) if error.is_instance_of::<PyKeyboardInterrupt>(py) => {
                CompleteRecord { completions: None, interrupted: true }
            }
            Err(error) if error.is_instance_of::<PySystemExit>(py) => orderly_exit(py, &error),
            Err(error) => {
                tracing::warn!(%error, "completion failed");
                CompleteRecord { completions: Some(Vec::new()), interrupted: false }
            }
        };

        to_value(&record)
    }

    /// A SIGINT that lands while no call is being evaluated would otherwise
    /// fire inside the next one; drop it, the way the original idle serve
    /// loop swallowed it.
    fn discard_stale_interrupt(&self, py: Python<'_>) {
        if let Err(error) = py.check_signals() {
            if error.is_instance_of::<PySystemExit>(py) {
                orderly_exit(py, &error);
            }
            tracing::debug!("discarded interrupt received between requests");
        }
    }

    #[cfg(test)]
    fn global_i64(&self, name: &str) -> Option<i64> {
        Python::with_gil(|py| {
            self.namespace
                .bind(py)
                .get_item(name)
                .ok()
                .flatten()
                .and_then(|value| value.extract::<i64>().ok())
        })
    }
}

impl Interpreter for PythonInterpreter {
    fn execute(&mut self, source: &str) -> Result<(), HostError> {
        Python::with_gil(|py| {
            let namespace = self.namespace.bind(py);
            let code = compile(py, source, "exec")
                .map_err(|error| HostError::Interpreter(error.to_string()))?;
            run_code(py, &code, namespace)
                .map(|_| ())
                .map_err(|error| HostError::Interpreter(error.to_string()))
        })
    }

    fn evaluate(&mut self, source: &str) -> Value {
        Python::with_gil(|py| self.evaluate_with_gil(py, source))
    }

    fn complete(&mut self, source: &str) -> Value {
        Python::with_gil(|py| self.complete_with_gil(py, source))
    }
}

fn is_inspect(source: &str) -> bool {
    source.starts_with('?') || source.ends_with('?')
}

fn compile<'py>(py: Python<'py>, source: &str, mode: &str) -> PyResult<Bound<'py, PyAny>> {
    py.import_bound("builtins")?.getattr("compile")?.call1((source, SOURCE_NAME, mode))
}

fn run_code<'py>(
    py: Python<'py>,
    code: &Bound<'py, PyAny>,
    namespace: &Bound<'py, PyDict>,
) -> PyResult<Bound<'py, PyAny>> {
    py.import_bound("builtins")?.getattr("eval")?.call1((code, namespace))
}

fn display(py: Python<'_>, value: &Bound<'_, PyAny>) -> PyResult<()> {
    py.import_bound("sys")?.getattr("displayhook")?.call1((value,))?;
    Ok(())
}

fn trap(py: Python<'_>, error: PyErr) -> (Traceback, bool) {
    if error.is_instance_of::<PySystemExit>(py) {
        orderly_exit(py, &error);
    }
    let interrupted = error.is_instance_of::<PyKeyboardInterrupt>(py);
    (Traceback::Text(format_traceback(py, &error)), interrupted)
}

/// SystemExit propagates unchanged: the process goes down and the gateway
/// observes the stdio closure.
fn orderly_exit(py: Python<'_>, error: &PyErr) -> ! {
    let code = error
        .value_bound(py)
        .getattr("code")
        .ok()
        .and_then(|code| code.extract::<i32>().ok())
        .unwrap_or(0);
    tracing::info!(code, "interpreter requested shutdown");
    std::process::exit(code)
}

/// Locate the row of the last logical line via Python's tokenizer and cut
/// the source there. Falls back to treating the whole source as the tail
/// when tokenization fails.
fn split_last_logical_line(py: Python<'_>, source: &str) -> (Option<String>, String) {
    match last_newline_row(py, source) {
        Some(row) => {
            let lines: Vec<&str> = source.split('\n').collect();
            if row == 0 || row >= lines.len() {
                return (None, source.to_string());
            }
            (Some(lines[..row].join("\n")), lines[row..].join("\n"))
        }
        None => (None, source.to_string()),
    }
}

fn last_newline_row(py: Python<'_>, source: &str) -> Option<usize> {
    let scan = || -> PyResult<Option<usize>> {
        let tokenize = py.import_bound("tokenize")?;
        let io = py.import_bound("io")?;
        let newline: i64 = tokenize.getattr("NEWLINE")?.extract()?;
        let readline = io.getattr("StringIO")?.call1((source,))?.getattr("readline")?;
        let tokens = tokenize.getattr("generate_tokens")?.call1((readline,))?;

        let mut last = None;
        for token in tokens.iter()? {
            let token = token?;
            let kind: i64 = token.get_item(0)?.extract()?;
            // the tokenizer emits a synthetic empty NEWLINE at end of input
            let text: String = token.get_item(1)?.extract()?;
            if kind == newline && !text.is_empty() {
                let (row, _col): (usize, usize) = token.get_item(2)?.extract()?;
                last = Some(row);
            }
        }
        Ok(last)
    };
    scan().ok().flatten()
}

fn rotate_history(py: Python<'_>, namespace: &Bound<'_, PyDict>, value: &Bound<'_, PyAny>) {
    let fetch = |name: &str| {
        namespace
            .get_item(name)
            .ok()
            .flatten()
            .map(|object| object.unbind())
            .unwrap_or_else(|| py.None())
    };
    let single = fetch("_");
    let double = fetch("__");
    let _ = namespace.set_item("___", double);
    let _ = namespace.set_item("__", single);
    let _ = namespace.set_item("_", value);
}

fn harvest_plots(namespace: &Bound<'_, PyDict>) -> Vec<Plot> {
    let Ok(Some(list)) = namespace.get_item("__plots__") else {
        return Vec::new();
    };
    let Ok(items) = list.iter() else {
        return Vec::new();
    };
    let mut plots = Vec::new();
    for item in items.flatten() {
        let extract = || -> PyResult<Plot> {
            Ok(Plot {
                data: item.get_item("data")?.extract()?,
                size: item.get_item("size")?.extract()?,
                mime: item.get_item("type")?.extract()?,
                encoding: item.get_item("encoding")?.extract()?,
                checksum: item.get_item("checksum")?.extract()?,
            })
        };
        if let Ok(plot) = extract() {
            plots.push(plot);
        }
    }
    plots
}

fn resolve_dotted<'py>(
    py: Python<'py>,
    namespace: &Bound<'py, PyDict>,
    path: &str,
) -> Option<Bound<'py, PyAny>> {
    let (name, attrs) = match path.split_once('.') {
        Some((name, attrs)) => (name, Some(attrs)),
        None => (path, None),
    };
    if name.is_empty() {
        return None;
    }
    let mut object = match namespace.get_item(name).ok().flatten() {
        Some(object) => object,
        None => py.import_bound("builtins").ok()?.getattr(name).ok()?,
    };
    if let Some(attrs) = attrs {
        for attr in attrs.split('.') {
            object = object.getattr(attr).ok()?;
        }
    }
    Some(object)
}

fn format_syntax_error(py: Python<'_>, error: &PyErr) -> String {
    let formatted = (|| -> PyResult<String> {
        let lines: Vec<String> = py
            .import_bound("traceback")?
            .getattr("format_exception_only")?
            .call1((error.get_type_bound(py), error.value_bound(py)))?
            .extract()?;
        Ok(lines.concat())
    })()
    .unwrap_or_else(|_| format!("{error}\n"));
    format!("Traceback (most recent call last):\n{formatted}")
}

fn format_traceback(py: Python<'_>, error: &PyErr) -> String {
    let formatted = (|| -> PyResult<String> {
        let traceback = py.import_bound("traceback")?;
        match error.traceback_bound(py) {
            Some(tb) => {
                let lines: Vec<String> = traceback
                    .getattr("format_exception")?
                    .call1((error.get_type_bound(py), error.value_bound(py), tb))?
                    .extract()?;
                Ok(lines.concat())
            }
            None => {
                let lines: Vec<String> = traceback
                    .getattr("format_exception_only")?
                    .call1((error.get_type_bound(py), error.value_bound(py)))?
                    .extract()?;
                Ok(format!("Traceback (most recent call last):\n{}", lines.concat()))
            }
        }
    })();
    formatted.unwrap_or_else(|_| format!("{error}\n"))
}

#[cfg(test)]
#[path = "interpreter_tests.rs"]
mod tests;
