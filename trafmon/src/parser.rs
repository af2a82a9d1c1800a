//! Recognition of dante traffic lines.
//!
//! A dante `iolog` line names the client as `username%<name>@<addr>` and the
//! transfer direction by where the `->` arrow sits relative to that token:
//!
//! ```text
//! ... username%alice@10.0.0.2.51234 10.0.0.1.1080 -> 93.184.216.34.443 (150)
//! ... 93.184.216.34.443 -> 10.0.0.1.1080 username%alice@10.0.0.2.51234 (75)
//! ```
//!
//! The first line is outgoing (client upload), the second incoming. The
//! parenthesised number at the end is the byte count.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static OUTGOING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"username%([^@]*)@.*->.*\(([^()]*)\)[^()]*$").expect("outgoing pattern is valid")
});

static INCOMING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"->.*username%([^@]*)@.*\(([^()]*)\)[^()]*$").expect("incoming pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Outgoing,
    Incoming,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Outgoing => f.write_str("out"),
            Direction::Incoming => f.write_str("in"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrafficRecord {
    pub username: String,
    pub direction: Direction,
    pub byte_count: u64,
}

/// Parse one log line. `None` means the line is not a traffic line, or is one
/// whose count is not a valid non-negative integer.
///
/// The outgoing shape is tried first: a line that fits it structurally is
/// never reinterpreted as incoming.
pub fn parse_line(line: &str) -> Option<TrafficRecord> {
    if let Some(caps) = OUTGOING.captures(line) {
        return record(Direction::Outgoing, &caps[1], &caps[2]);
    }
    if let Some(caps) = INCOMING.captures(line) {
        return record(Direction::Incoming, &caps[1], &caps[2]);
    }
    None
}

fn record(direction: Direction, username: &str, count: &str) -> Option<TrafficRecord> {
    if username.is_empty() {
        return None;
    }
    let byte_count = count.trim().parse::<u64>().ok()?;
    Some(TrafficRecord {
        username: username.to_string(),
        direction,
        byte_count,
    })
}
