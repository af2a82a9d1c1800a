use crate::config::TrafmonConfig;
use crate::counters::CounterTable;
use crate::error::Result;
use crate::flush::FlushScheduler;
use crate::listener::{ConnectionSettings, IngestListener};
use crate::store::TotalsStore;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Requests delivered to a running daemon, typically from OS signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    Shutdown,
    ResetCounters,
}

/// Wires the counter table, the ingest listener and the flush scheduler.
pub struct Daemon {
    config: Arc<TrafmonConfig>,
    counters: Arc<CounterTable>,
    store: Arc<dyn TotalsStore>,
}

impl Daemon {
    pub fn new(config: Arc<TrafmonConfig>, store: Arc<dyn TotalsStore>) -> Self {
        Self {
            config,
            counters: Arc::new(CounterTable::new()),
            store,
        }
    }

    pub fn counters(&self) -> Arc<CounterTable> {
        self.counters.clone()
    }

    /// Load persisted totals, bind the listener, then start ingesting and
    /// flushing. Nothing is started if either of the first two steps fails.
    pub async fn start(self) -> Result<RunningDaemon> {
        let scheduler = Arc::new(FlushScheduler::new(
            self.counters.clone(),
            self.store.clone(),
            self.config.snapshot_path(),
            self.config.write_period(),
        ));

        let users = scheduler.initial_load().await?;
        info!("Initial totals loaded for {} user(s)", users);

        let listener = IngestListener::bind(
            &self.config.listen_addr,
            self.counters.clone(),
            ConnectionSettings::from_config(&self.config),
        )
        .await?;
        let local_addr = listener.local_addr()?;

        let shutdown = CancellationToken::new();
        let listener_task = tokio::spawn(listener.run(shutdown.child_token()));
        let flush_task = {
            let scheduler = scheduler.clone();
            let shutdown = shutdown.child_token();
            tokio::spawn(async move { scheduler.run(shutdown).await })
        };

        info!(
            "Trafmon running: listening on {}, flushing every {:?}",
            local_addr,
            self.config.write_period()
        );

        Ok(RunningDaemon {
            local_addr,
            counters: self.counters,
            scheduler,
            shutdown,
            listener_task,
            flush_task,
            flush_on_shutdown: self.config.flush_on_shutdown,
        })
    }
}

pub struct RunningDaemon {
    local_addr: SocketAddr,
    counters: Arc<CounterTable>,
    scheduler: Arc<FlushScheduler>,
    shutdown: CancellationToken,
    listener_task: JoinHandle<Result<()>>,
    flush_task: JoinHandle<()>,
    flush_on_shutdown: bool,
}

impl RunningDaemon {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn counters(&self) -> &Arc<CounterTable> {
        &self.counters
    }

    /// Zero every counter. Ingestion and flushing carry on.
    pub fn reset_counters(&self) {
        self.counters.reset();
        info!("Traffic counters were reset");
    }

    /// Serve control events until a shutdown is requested or every sender is
    /// gone, then stop.
    pub async fn run_until(self, mut control: mpsc::Receiver<ControlEvent>) -> Result<()> {
        while let Some(event) = control.recv().await {
            match event {
                ControlEvent::ResetCounters => self.reset_counters(),
                ControlEvent::Shutdown => {
                    info!("Shutdown requested");
                    break;
                }
            }
        }
        self.stop().await
    }

    /// Stop both loops and wait for them to finish.
    pub async fn stop(self) -> Result<()> {
        self.shutdown.cancel();

        let listener_result = match self.listener_task.await {
            Ok(result) => result,
            Err(e) => {
                error!("Ingest listener task failed: {}", e);
                Ok(())
            }
        };
        if let Err(e) = self.flush_task.await {
            error!("Flush task failed: {}", e);
        }

        if self.flush_on_shutdown {
            info!("Flushing final totals");
            self.scheduler.flush_once().await;
        }

        info!("Trafmon stopped");
        listener_result
    }
}
