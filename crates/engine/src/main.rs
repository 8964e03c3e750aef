// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `codelab-engine` binary: hosts one interpreter on a loopback port.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use codelab_engine::server::{self, EngineKind};

#[derive(Parser)]
#[command(name = "codelab-engine", about = "Interpreter host spawned by the codelab gateway")]
struct Args {
    /// Engine kind to host (python, python3, javascript)
    #[arg(long)]
    engine: String,

    /// Loopback port assigned by the gateway
    #[arg(long)]
    port: u16,

    /// One-shot source executed before the listener accepts requests
    #[arg(long)]
    code: Option<String>,
}

fn main() {
    // stdout carries the readiness token and evaluated output; logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    // interrupts are for the interpreter thread, not the listener
    codelab_engine::host::block_sigint();

    let kind = match args.engine.parse::<EngineKind>() {
        Ok(kind) => kind,
        Err(error) => {
            tracing::error!(%error, "refusing to start");
            std::process::exit(2);
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            tracing::error!(%error, "failed to build runtime");
            std::process::exit(1);
        }
    };

    if let Err(error) = runtime.block_on(server::run(kind, args.port, args.code)) {
        tracing::error!(%error, "engine failed");
        std::process::exit(1);
    }
}
