// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Embedded JavaScript interpreter.
//!
//! Evaluates in a persistent boa context. A non-null result of a source not
//! terminated by `;` is echoed to stdout in string form, where the gateway
//! captures it. boa has no preemption primitive, so interruption is
//! best-effort: a SIGINT trapped during evaluation marks the reply
//! `interrupted` without stopping the running script.

use std::io::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use boa_engine::{js_string, Context, JsResult, JsValue, NativeFunction, Source};
use serde_json::Value;

use codelab_wire::{CompleteRecord, EvalRecord, Traceback};

use crate::host::{to_value, HostError, Interpreter};

pub struct JavaScriptInterpreter {
    context: Context,
    interrupted: Arc<AtomicBool>,
    index: u64,
}

impl JavaScriptInterpreter {
    pub fn new(interrupted: Arc<AtomicBool>) -> Self {
        let mut context = Context::default();
        let _ = context.register_global_builtin_callable(
            js_string!("print"),
            1,
            NativeFunction::from_fn_ptr(js_print),
        );
        let _ = context.register_global_builtin_callable(
            js_string!("sleep"),
            1,
            NativeFunction::from_fn_ptr(js_sleep),
        );
        Self { context, interrupted, index: 0 }
    }
}

impl Interpreter for JavaScriptInterpreter {
    fn execute(&mut self, source: &str) -> Result<(), HostError> {
        self.context
            .eval(Source::from_bytes(source))
            .map(|_| ())
            .map_err(|error| HostError::Interpreter(error.to_string()))
    }

    fn evaluate(&mut self, raw: &str) -> Value {
        let source = raw.trim_end().to_string();
        self.interrupted.store(false, Ordering::SeqCst);

        let mut traceback = Traceback::None;
        let started = Instant::now();

        match self.context.eval(Source::from_bytes(&source)) {
            Ok(value) => {
                if !value.is_undefined()
                    && !value.is_null()
                    && !source.is_empty()
                    && !source.ends_with(';')
                {
                    if let Ok(text) = value.to_string(&mut self.context) {
                        println!("{}", text.to_std_string_escaped());
                        let _ = std::io::stdout().flush();
                    }
                }
            }
            Err(error) => traceback = Traceback::Text(error.to_string()),
        }

        let time = started.elapsed().as_secs_f64();
        let interrupted = self.interrupted.swap(false, Ordering::SeqCst);

        self.index += 1;

        to_value(&EvalRecord {
            source,
            index: Some(self.index),
            time,
            plots: Vec::new(),
            traceback,
            interrupted,
            out: None,
            err: None,
            memory: None,
            timeout: None,
        })
    }

    fn complete(&mut self, _source: &str) -> Value {
        // completion is not supported by this engine kind
        to_value(&CompleteRecord { completions: Some(Vec::new()), interrupted: false })
    }
}

fn js_print(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    let mut parts = Vec::with_capacity(args.len());
    for value in args {
        parts.push(value.to_string(context)?.to_std_string_escaped());
    }
    println!("{}", parts.join(" "));
    let _ = std::io::stdout().flush();
    Ok(JsValue::undefined())
}

fn js_sleep(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    let seconds = args.first().cloned().unwrap_or_default().to_number(context)?;
    if seconds.is_finite() && seconds > 0.0 {
        std::thread::sleep(Duration::from_secs_f64(seconds));
    }
    Ok(JsValue::undefined())
}

#[cfg(test)]
#[path = "javascript_tests.rs"]
mod tests;
