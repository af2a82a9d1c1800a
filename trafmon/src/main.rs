mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::CliArgs;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};
use trafmon::{Daemon, DatabaseStore, TrafmonConfig, signals};

fn main() -> Result<()> {
    let args = CliArgs::parse();

    let config_path = args.config.clone();
    let mut cfg = TrafmonConfig::load(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path))?;
    args.apply(&mut cfg);
    cfg.validate()?;

    let _log_guard = common::init_tracing(cfg.log_dir.as_deref(), &cfg.log_file, &cfg.log_level)
        .context("Failed to initialize logging")?;

    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if let Some(threads) = cfg.runtime_threads {
        builder.worker_threads(threads);
    }
    let runtime = builder.build().context("Failed to build tokio runtime")?;

    runtime.block_on(run(cfg))
}

async fn run(cfg: TrafmonConfig) -> Result<()> {
    info!(
        "Starting trafmon: listen={} write_period={}s snapshot_file={:?}",
        cfg.listen_addr,
        cfg.write_period_secs,
        cfg.snapshot_path()
    );
    let cfg = Arc::new(cfg);

    let (control_tx, control_rx) = mpsc::channel(16);
    let signal_task = signals::spawn_signal_forwarder(control_tx)
        .context("Failed to install signal handlers")?;

    let store = Arc::new(DatabaseStore::from_config(&cfg));
    let running = Daemon::new(cfg.clone(), store)
        .start()
        .await
        .inspect_err(|e| error!("Fatal: {}", e))?;

    let result = running.run_until(control_rx).await;
    signal_task.abort();
    result?;
    Ok(())
}
