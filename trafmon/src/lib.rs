//! Per-user traffic accounting for dante proxy logs.
//!
//! Log lines arrive over TCP, [`parser`] turns traffic lines into records,
//! [`counters::CounterTable`] accumulates them, and [`flush::FlushScheduler`]
//! periodically upserts the absolute totals into a database and a flat file.

pub mod codec;
pub mod config;
pub mod counters;
pub mod daemon;
pub mod entity;
pub mod error;
pub mod flush;
pub mod listener;
pub mod parser;
pub mod signals;
pub mod store;

pub use config::TrafmonConfig;
pub use counters::{CounterEntry, CounterTable};
pub use daemon::{ControlEvent, Daemon, RunningDaemon};
pub use error::{Result, TrafmonError};
pub use parser::{Direction, TrafficRecord, parse_line};
pub use store::{DatabaseStore, TotalsStore};
