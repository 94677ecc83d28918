use anyhow::Result;
use tokio::signal;

use fastdeploy::agent::settings::{command, create_sample_config, load_settings};
use fastdeploy::agent::EngineBuilder;

/// Wait for shutdown signal (CTRL+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to listen for CTRL+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            log::info!("Received CTRL+C, shutting down...");
        },
        _ = terminate => {
            log::info!("Received SIGTERM, shutting down...");
        },
    }
}

async fn run() -> Result<()> {
    let matches = command().get_matches();

    if let Some(path) = matches.get_one::<String>("sample-config") {
        return create_sample_config(path);
    }

    let settings = load_settings(&matches)?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&settings.log_level))
        .init();
    log::info!(
        "fastdeploy {} starting deployment {:?}",
        fastdeploy::RELEASE,
        settings.name
    );
    match matches.get_one::<String>("config") {
        Some(path) if std::path::Path::new(path).exists() => {
            log::info!("Settings loaded from {path}")
        }
        Some(path) => log::info!("Settings file not found: {path}, using defaults"),
        None => {}
    }
    log::debug!("Final settings: {settings:?}");

    let builder = EngineBuilder::new(settings);
    let mut scheduler = builder.build_scheduler().await?;

    if matches.get_flag("once") {
        let result = scheduler.run_once().await;
        log::info!(
            "single cycle done: {} updated, {} restarted, {} errors",
            result.updates.len(),
            result.restarted.len(),
            result.errors.len()
        );
        return Ok(());
    }

    let handle = scheduler.spawn();
    shutdown_signal().await;

    let scheduler = handle.shutdown().await?;
    let stats = scheduler.engine().stats();
    log::info!(
        "Stopped after {} cycles ({} with updates, {} services restarted, {} errors)",
        stats.cycles,
        stats.cycles_with_updates,
        stats.services_restarted,
        stats.errors
    );
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        // The logger may not be up yet when settings fail
        if log::log_enabled!(log::Level::Error) {
            log::error!("{e:#}");
        } else {
            eprintln!("Error: {e:#}");
        }
        std::process::exit(1);
    }
}
