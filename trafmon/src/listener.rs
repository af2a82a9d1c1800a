use crate::codec::LogLineCodec;
use crate::config::TrafmonConfig;
use crate::counters::CounterTable;
use crate::error::{Result, TrafmonError};
use crate::parser::parse_line;
use futures::StreamExt;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncRead;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// Pause after a failed `accept` so a persistent error (e.g. fd exhaustion)
/// doesn't spin the loop.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy)]
pub struct ConnectionSettings {
    pub read_timeout: Option<Duration>,
    pub max_line_length: usize,
}

impl ConnectionSettings {
    pub fn from_config(config: &TrafmonConfig) -> Self {
        Self {
            read_timeout: config.read_timeout(),
            max_line_length: config.max_line_length,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionSummary {
    pub lines: u64,
    pub matched: u64,
}

/// Accepts dante log connections and feeds every line into the counter table.
pub struct IngestListener {
    listener: TcpListener,
    counters: Arc<CounterTable>,
    settings: ConnectionSettings,
}

impl IngestListener {
    pub async fn bind(
        addr: &str,
        counters: Arc<CounterTable>,
        settings: ConnectionSettings,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| TrafmonError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        Ok(Self {
            listener,
            counters,
            settings,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept until `shutdown` fires, then wait for every open connection to
    /// wind down.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        info!("Ingest listener accepting on {}", self.local_addr()?);
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                result = self.listener.accept() => match result {
                    Ok((stream, peer)) => {
                        info!("Connection established: {}", peer);
                        let counters = self.counters.clone();
                        let settings = self.settings;
                        let shutdown = shutdown.child_token();
                        connections.spawn(async move {
                            match ingest_lines(stream, &counters, settings, shutdown).await {
                                Ok(summary) => info!(
                                    "Connection closed: {} ({} lines, {} traffic records)",
                                    peer, summary.lines, summary.matched
                                ),
                                Err(e) => warn!("Connection {} ended with error: {}", peer, e),
                            }
                        });
                    }
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
                Some(joined) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(e) = joined {
                        error!("Connection task failed: {}", e);
                    }
                }
            }
        }

        debug!("Waiting for {} open connection(s) to close", connections.len());
        while let Some(joined) = connections.join_next().await {
            if let Err(e) = joined {
                error!("Connection task failed: {}", e);
            }
        }
        info!("Ingest listener stopped");
        Ok(())
    }
}

/// Read lines from `reader` until EOF, error, idle timeout or shutdown.
pub async fn ingest_lines<R>(
    reader: R,
    counters: &CounterTable,
    settings: ConnectionSettings,
    shutdown: CancellationToken,
) -> Result<ConnectionSummary>
where
    R: AsyncRead + Unpin,
{
    let mut frames = FramedRead::new(reader, LogLineCodec::new(settings.max_line_length));
    let mut summary = ConnectionSummary::default();

    loop {
        let next = tokio::select! {
            _ = shutdown.cancelled() => break,
            next = next_line(&mut frames, settings.read_timeout) => next?,
        };
        let Some(line) = next else {
            break;
        };

        summary.lines += 1;
        trace!("L: {}", line);
        if let Some(record) = parse_line(&line) {
            debug!(
                "{} {}: {} bytes",
                record.direction, record.username, record.byte_count
            );
            counters.apply(&record);
            summary.matched += 1;
        }
    }

    Ok(summary)
}

async fn next_line<R>(
    frames: &mut FramedRead<R, LogLineCodec>,
    read_timeout: Option<Duration>,
) -> io::Result<Option<String>>
where
    R: AsyncRead + Unpin,
{
    let next = match read_timeout {
        Some(limit) => tokio::time::timeout(limit, frames.next())
            .await
            .map_err(|_| {
                io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("no data received for {:?}", limit),
                )
            })?,
        None => frames.next().await,
    };
    next.transpose()
}
