// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use codelab_wire::EvalRecord;

fn interpreter() -> PythonInterpreter {
    PythonInterpreter::new().unwrap()
}

fn evaluate(interp: &mut PythonInterpreter, source: &str) -> EvalRecord {
    serde_json::from_value(interp.evaluate(source)).unwrap()
}

#[test]
fn expression_result_is_bound_to_history() {
    let mut interp = interpreter();
    let record = evaluate(&mut interp, "1+1");
    assert_eq!(record.index, Some(1));
    assert!(record.traceback.is_none());
    assert!(!record.interrupted);
    assert_eq!(interp.global_i64("_1"), Some(2));
    assert_eq!(interp.global_i64("_"), Some(2));
}

#[test]
fn statements_split_from_expression_tail() {
    let mut interp = interpreter();
    let record = evaluate(&mut interp, "a = 1\nb = 2\na + b");
    assert!(record.traceback.is_none());
    assert_eq!(interp.global_i64("a"), Some(1));
    assert_eq!(interp.global_i64("b"), Some(2));
    assert_eq!(interp.global_i64("_1"), Some(3));
}

#[test]
fn multiline_tail_survives_the_split() {
    let mut interp = interpreter();
    let record = evaluate(&mut interp, "a = 1\n(a +\n 2)");
    assert!(record.traceback.is_none());
    assert_eq!(interp.global_i64("_1"), Some(3));
}

#[test]
fn pure_statements_produce_no_history_binding() {
    let mut interp = interpreter();
    let record = evaluate(&mut interp, "x = 5");
    assert_eq!(record.index, Some(1));
    assert!(record.traceback.is_none());
    assert_eq!(interp.global_i64("x"), Some(5));
    assert_eq!(interp.global_i64("_1"), None);
}

#[test]
fn history_rotates_over_three_results() {
    let mut interp = interpreter();
    evaluate(&mut interp, "1");
    evaluate(&mut interp, "2");
    let record = evaluate(&mut interp, "3");
    assert_eq!(record.index, Some(3));
    assert_eq!(interp.global_i64("_"), Some(3));
    assert_eq!(interp.global_i64("__"), Some(2));
    assert_eq!(interp.global_i64("___"), Some(1));
    assert_eq!(interp.global_i64("_3"), Some(3));
}

#[test]
fn runtime_error_becomes_traceback() {
    let mut interp = interpreter();
    let record = evaluate(&mut interp, "1/0");
    let text = record.traceback.text().unwrap();
    assert!(text.contains("ZeroDivisionError"));
    assert!(text.starts_with("Traceback (most recent call last):"));
    assert!(!record.interrupted);
    assert_eq!(record.index, Some(1));
}

#[test]
fn prelude_syntax_error_skips_the_tail() {
    let mut interp = interpreter();
    let record = evaluate(&mut interp, "def f(:\n    pass\nf");
    let text = record.traceback.text().unwrap();
    assert!(text.contains("SyntaxError"));
    assert_eq!(interp.global_i64("_1"), None);
}

#[test]
fn index_advances_on_every_call() {
    let mut interp = interpreter();
    evaluate(&mut interp, "x = 1");
    evaluate(&mut interp, "1/0");
    let record = evaluate(&mut interp, "x");
    assert_eq!(record.index, Some(3));
}

#[test]
fn empty_source_evaluates_cleanly() {
    let mut interp = interpreter();
    let record = evaluate(&mut interp, "");
    assert!(record.traceback.is_none());
    assert_eq!(record.index, Some(1));
}

#[test]
fn unicode_source_reaches_the_namespace() {
    let mut interp = interpreter();
    let record = evaluate(&mut interp, "s = 'π'\nlen(s)");
    assert!(record.traceback.is_none());
    assert_eq!(interp.global_i64("_1"), Some(1));
}

#[test]
fn preface_execute_populates_namespace() {
    let mut interp = interpreter();
    interp.execute("seed = 42").unwrap();
    assert_eq!(interp.global_i64("seed"), Some(42));
    assert!(interp.execute("this is not python").is_err());
}

#[test]
fn inspect_builtin_with_verbose_marker() {
    let mut interp = interpreter();
    let record: codelab_wire::InspectRecord =
        serde_json::from_value(interp.evaluate("??len")).unwrap();
    assert_eq!(record.text, "len");
    assert!(record.more);
    assert_eq!(record.index, 1);
    let info = record.info.unwrap();
    assert!(info.docstring.unwrap_or_default().contains("items"));
}

#[test]
fn inspect_unknown_name_has_null_info() {
    let mut interp = interpreter();
    let record: codelab_wire::InspectRecord =
        serde_json::from_value(interp.evaluate("?no_such_name_here")).unwrap();
    assert_eq!(record.text, "no_such_name_here");
    assert!(!record.more);
    assert!(record.info.is_none());
}

#[test]
fn inspect_resolves_dotted_names() {
    let mut interp = interpreter();
    evaluate(&mut interp, "import math");
    let record: codelab_wire::InspectRecord =
        serde_json::from_value(interp.evaluate("math.floor?")).unwrap();
    assert_eq!(record.text, "math.floor");
    assert!(record.info.is_some());
}

#[test]
fn completion_includes_keywords() {
    let mut interp = interpreter();
    let record: codelab_wire::CompleteRecord =
        serde_json::from_value(interp.complete("imp")).unwrap();
    assert!(!record.interrupted);
    let completions = record.completions.unwrap();
    let import = completions.iter().find(|c| c.matched == "import").unwrap();
    assert_eq!(import.info.kind, "keyword");
}

#[test]
fn completion_resolves_builtins() {
    let mut interp = interpreter();
    let record: codelab_wire::CompleteRecord =
        serde_json::from_value(interp.complete("pri")).unwrap();
    let completions = record.completions.unwrap();
    let print = completions.iter().find(|c| c.matched == "print").unwrap();
    assert_eq!(print.info.kind, "builtin");
}

#[test]
fn completion_is_sorted_and_deduplicated() {
    let mut interp = interpreter();
    let record: codelab_wire::CompleteRecord =
        serde_json::from_value(interp.complete("i")).unwrap();
    let matches: Vec<String> =
        record.completions.unwrap().into_iter().map(|c| c.matched).collect();
    let mut sorted = matches.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(matches, sorted);
}

#[test]
fn sleep_component_is_installed() {
    let mut interp = interpreter();
    let record = evaluate(&mut interp, "sleep(0)");
    assert!(record.traceback.is_none());
}

#[test]
fn plots_are_harvested_with_checksums() {
    let available = Python::with_gil(|py| py.import_bound("matplotlib").is_ok());
    if !available {
        // plotting library not installed in this environment
        return;
    }
    let mut interp = interpreter();
    let record = evaluate(&mut interp, "mplplot([1, 2, 3])");
    assert!(record.traceback.is_none(), "{:?}", record.traceback);
    assert_eq!(record.plots.len(), 1);
    let plot = &record.plots[0];
    assert_eq!(plot.mime, "image/png");
    assert_eq!(plot.encoding, "base64");

    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use sha1::{Digest, Sha1};
    let raw = STANDARD.decode(&plot.data).unwrap();
    assert_eq!(plot.size, raw.len() as u64);
    let checksum: String =
        Sha1::digest(plot.data.as_bytes()).iter().map(|b| format!("{b:02x}")).collect();
    assert_eq!(plot.checksum, checksum);
}

#[test]
fn plots_reset_between_evaluations() {
    let available = Python::with_gil(|py| py.import_bound("matplotlib").is_ok());
    if !available {
        return;
    }
    let mut interp = interpreter();
    let with_plot = evaluate(&mut interp, "mplplot([1, 2])");
    assert_eq!(with_plot.plots.len(), 1);
    let without = evaluate(&mut interp, "1+1");
    assert!(without.plots.is_empty());
}
