//! Translate OS signals into [`ControlEvent`]s.
//!
//! SIGINT/SIGTERM request a graceful stop, SIGUSR1 resets the counters. The
//! handlers only forward a message; the daemon acts on it in its own task.

use crate::daemon::ControlEvent;
use crate::error::Result;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[cfg(unix)]
pub fn spawn_signal_forwarder(tx: mpsc::Sender<ControlEvent>) -> Result<JoinHandle<()>> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let mut reset = signal(SignalKind::user_defined1())?;

    Ok(tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                Some(()) = interrupt.recv() => {
                    info!("SIGINT received, program will be terminated");
                    ControlEvent::Shutdown
                }
                Some(()) = terminate.recv() => {
                    info!("SIGTERM received, program will be terminated");
                    ControlEvent::Shutdown
                }
                Some(()) = reset.recv() => {
                    info!("SIGUSR1 received, resetting stored counters");
                    ControlEvent::ResetCounters
                }
                else => break,
            };
            if tx.send(event).await.is_err() {
                warn!("Daemon no longer listening for control events");
                break;
            }
        }
    }))
}

#[cfg(not(unix))]
pub fn spawn_signal_forwarder(tx: mpsc::Sender<ControlEvent>) -> Result<JoinHandle<()>> {
    Ok(tokio::spawn(async move {
        loop {
            if tokio::signal::ctrl_c().await.is_err() {
                warn!("Unable to listen for Ctrl-C");
                break;
            }
            info!("Ctrl-C received, program will be terminated");
            if tx.send(ControlEvent::Shutdown).await.is_err() {
                break;
            }
        }
    }))
}
