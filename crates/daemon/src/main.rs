// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! activityd: the Activity Manager daemon.

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use am_core::BusType;
use am_daemon::lifecycle::{startup, LifecycleError, Paths};
use am_daemon::listener::{bind, Listener};

fn init_tracing(paths: &Paths) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = am_daemon::env::log_filter()
        .map(EnvFilter::new)
        .unwrap_or_else(|| EnvFilter::new("info"));
    match std::fs::create_dir_all(&paths.log_dir) {
        Ok(()) => {
            let appender = tracing_appender::rolling::daily(&paths.log_dir, "activityd.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        Err(_) => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            None
        }
    }
}

#[tokio::main]
async fn main() {
    let paths = match Paths::resolve() {
        Ok(paths) => paths,
        Err(err) => {
            eprintln!("activityd: {err}");
            std::process::exit(1);
        }
    };
    let _log_guard = init_tracing(&paths);

    if let Err(err) = run(paths).await {
        tracing::error!(error = %err, "activityd failed");
        std::process::exit(1);
    }
}

async fn run(paths: Paths) -> Result<(), LifecycleError> {
    let daemon = startup(paths).await?;
    let shutdown = CancellationToken::new();

    let private = bind(&daemon.paths.socket_path)?;
    let private_listener = Listener::new(private, BusType::Private, daemon.handle.clone());
    tokio::spawn(private_listener.run(shutdown.clone()));

    if let Some(public_path) = &daemon.config.public_socket {
        let public = bind(public_path)?;
        let public_listener = Listener::new(public, BusType::Public, daemon.handle.clone());
        tokio::spawn(public_listener.run(shutdown.clone()));
    }

    let engine = tokio::spawn(daemon.engine.run(shutdown.clone()));

    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutdown requested"),
        Err(err) => tracing::warn!(error = %err, "signal handler failed, shutting down"),
    }
    shutdown.cancel();
    let _ = engine.await;
    Ok(())
}
