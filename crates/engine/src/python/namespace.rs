// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Global namespace components for Python engines.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use pyo3::prelude::*;
use pyo3::types::{PyCFunction, PyDict, PyList};
use sha1::{Digest, Sha1};

/// Plotting components are opt-in; importing them eagerly slows startup and
/// most worksheets never plot.
pub const DEFAULT_DISABLE: &[&str] = &["matplotlib", "pylab"];

const COMPONENTS: &[&str] = &["sleep", "matplotlib", "pylab", "mplplot"];

/// Populate the namespace with the enabled components, in declaration order.
pub fn setup(py: Python<'_>, namespace: &Bound<'_, PyDict>, disable: &[&str]) -> PyResult<()> {
    for component in COMPONENTS {
        if disable.contains(component) {
            continue;
        }
        match *component {
            "sleep" => {
                namespace.set_item("sleep", py.import_bound("time")?.getattr("sleep")?)?;
            }
            "matplotlib" => {
                if let Ok(matplotlib) = py.import_bound("matplotlib") {
                    let _ = matplotlib.call_method1("use", ("Agg",));
                }
            }
            "pylab" => {
                if let Ok(pylab) = py.import_bound("pylab") {
                    namespace.update(pylab.dict().as_mapping())?;
                }
            }
            "mplplot" => {
                let plot = mplplot(py, namespace.clone().unbind())?;
                namespace.set_item("mplplot", plot)?;
            }
            _ => {}
        }
    }
    Ok(())
}

/// Build the `mplplot(*args, **kwargs)` wrapper: render through pylab into
/// an in-memory PNG and append the artefact to the namespace's `__plots__`
/// list, which the interpreter harvests per evaluation.
fn mplplot(py: Python<'_>, namespace: Py<PyDict>) -> PyResult<Bound<'_, PyCFunction>> {
    PyCFunction::new_closure_bound(
        py,
        Some(c"mplplot"),
        Some(c"Plot data with pylab and capture the figure as a PNG artefact."),
        move |args, kwargs| -> PyResult<()> {
            let py = args.py();

            // the plotting backend is initialised lazily so engines that
            // never plot do not pay for matplotlib at startup
            if let Ok(matplotlib) = py.import_bound("matplotlib") {
                let _ = matplotlib.call_method1("use", ("Agg",));
            }
            let pylab = py.import_bound("pylab")?;
            pylab.getattr("plot")?.call(args.clone(), kwargs)?;

            let buffer = py.import_bound("io")?.getattr("BytesIO")?.call0()?;
            let options = PyDict::new_bound(py);
            options.set_item("format", "png")?;
            options.set_item("dpi", 80)?;
            pylab.getattr("savefig")?.call((buffer.clone(),), Some(&options))?;

            let raw: Vec<u8> = buffer.call_method0("getvalue")?.extract()?;
            let data = STANDARD.encode(&raw);
            let checksum = sha1_hex(data.as_bytes());

            let entry = PyDict::new_bound(py);
            entry.set_item("data", &data)?;
            entry.set_item("size", raw.len())?;
            entry.set_item("type", "image/png")?;
            entry.set_item("encoding", "base64")?;
            entry.set_item("checksum", checksum)?;

            let namespace = namespace.bind(py);
            let plots = match namespace.get_item("__plots__")? {
                Some(plots) => plots,
                None => PyList::empty_bound(py).into_any(),
            };
            plots.call_method1("append", (entry,))?;
            namespace.set_item("__plots__", plots)?;
            Ok(())
        },
    )
}

fn sha1_hex(data: &[u8]) -> String {
    Sha1::digest(data).iter().map(|byte| format!("{byte:02x}")).collect()
}
