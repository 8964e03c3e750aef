// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Object introspection for inspection requests and completion info.

use pyo3::prelude::*;

use codelab_wire::ObjectInfo;

/// Classify an object the way the `inspect` module sees it.
pub(crate) fn kind_of(py: Python<'_>, object: &Bound<'_, PyAny>) -> String {
    let Ok(inspect) = py.import_bound("inspect") else {
        return "instance".to_string();
    };
    let checks = [
        ("ismodule", "module"),
        ("isclass", "class"),
        ("isbuiltin", "builtin"),
        ("isfunction", "function"),
        ("ismethod", "method"),
    ];
    for (check, kind) in checks {
        let matched = inspect
            .getattr(check)
            .and_then(|probe| probe.call1((object,)))
            .and_then(|result| result.extract::<bool>())
            .unwrap_or(false);
        if matched {
            return kind.to_string();
        }
    }
    "instance".to_string()
}

/// Collect details about an object; `verbose` additionally retrieves the
/// source text when the object has any.
pub(crate) fn describe(py: Python<'_>, object: &Bound<'_, PyAny>, verbose: bool) -> ObjectInfo {
    let inspect = py.import_bound("inspect").ok();

    let name = object.getattr("__name__").ok().and_then(|name| name.extract::<String>().ok());

    let docstring = inspect.as_ref().and_then(|inspect| {
        inspect
            .getattr("getdoc")
            .and_then(|getdoc| getdoc.call1((object,)))
            .ok()
            .and_then(|doc| doc.extract::<Option<String>>().ok())
            .flatten()
    });

    let args = if object.is_callable() {
        inspect.as_ref().and_then(|inspect| {
            inspect
                .getattr("signature")
                .and_then(|signature| signature.call1((object,)))
                .and_then(|signature| signature.str())
                .ok()
                .map(|signature| signature.to_string_lossy().into_owned())
        })
    } else {
        None
    };

    let source = if verbose {
        inspect.as_ref().and_then(|inspect| {
            inspect
                .getattr("getsource")
                .and_then(|getsource| getsource.call1((object,)))
                .ok()
                .and_then(|text| text.extract::<String>().ok())
        })
    } else {
        None
    };

    ObjectInfo { kind: kind_of(py, object), name, docstring, args, source }
}
