// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `codelabd` binary: the code-evaluation gateway service.

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use codelab_gateway::{env, rpc, ProcessManager, Settings};

#[derive(Parser)]
#[command(name = "codelabd", about = "Multi-tenant code-evaluation gateway")]
struct Args {
    /// Path to a TOML settings file (defaults to $CODELAB_CONFIG)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Listen address override
    #[arg(long)]
    host: Option<String>,

    /// Listen port override
    #[arg(long)]
    port: Option<u16>,

    /// Engine working-directory root override
    #[arg(long)]
    data_path: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let args = Args::parse();

    let mut settings = match args.config.or_else(env::config_path) {
        Some(path) => match Settings::load(&path) {
            Ok(settings) => settings,
            Err(error) => {
                tracing::error!(%error, "failed to load settings");
                std::process::exit(1);
            }
        },
        None => Settings::default(),
    };
    if let Some(host) = args.host {
        settings.host = host;
    }
    if let Some(port) = args.port {
        settings.port = port;
    }
    if let Some(data_path) = args.data_path {
        settings.data_path = data_path;
    }

    if let Err(error) = std::fs::create_dir_all(&settings.data_path) {
        tracing::error!(%error, path = %settings.data_path.display(), "cannot create data path");
        std::process::exit(1);
    }

    let address = (settings.host.clone(), settings.port);
    let manager = ProcessManager::new(settings);

    let listener = match tokio::net::TcpListener::bind((address.0.as_str(), address.1)).await {
        Ok(listener) => listener,
        Err(error) => {
            tracing::error!(%error, host = %address.0, port = address.1, "bind failed");
            std::process::exit(1);
        }
    };

    tracing::info!(host = %address.0, port = address.1, pid = std::process::id(), "gateway listening");

    let serve = axum::serve(listener, rpc::router(manager.clone()))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await;
    if let Err(error) = serve {
        tracing::error!(%error, "listener failed");
    }

    // engines do not outlive the service
    manager.kill_all().await;
    tracing::info!("gateway stopped");
}
