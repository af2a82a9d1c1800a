use crate::parser::{Direction, TrafficRecord};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Absolute per-user totals, as held in memory and as persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterEntry {
    pub username: String,
    pub outgoing: u64,
    pub incoming: u64,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Counters {
    outgoing: u64,
    incoming: u64,
}

impl Counters {
    fn add(&mut self, direction: Direction, amount: u64) {
        match direction {
            Direction::Outgoing => self.outgoing = self.outgoing.saturating_add(amount),
            Direction::Incoming => self.incoming = self.incoming.saturating_add(amount),
        }
    }
}

/// Per-user outgoing/incoming byte totals.
///
/// A single table-wide lock serialises every operation, so a snapshot never
/// sees half of an update and a reset can't lose or resurrect increments.
/// Critical sections only touch the map; callers do their I/O outside.
#[derive(Debug, Default)]
pub struct CounterTable {
    inner: Mutex<HashMap<String, Counters>>,
}

impl CounterTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self, username: &str, direction: Direction, amount: u64) {
        let mut table = self.inner.lock();
        if let Some(counters) = table.get_mut(username) {
            counters.add(direction, amount);
            return;
        }
        table
            .entry(username.to_string())
            .or_default()
            .add(direction, amount);
    }

    pub fn apply(&self, record: &TrafficRecord) {
        self.increment(&record.username, record.direction, record.byte_count);
    }

    /// Point-in-time copy of every entry, sorted by username.
    pub fn snapshot(&self) -> Vec<CounterEntry> {
        let copied: Vec<(String, Counters)> = {
            let table = self.inner.lock();
            table.iter().map(|(k, v)| (k.clone(), *v)).collect()
        };
        let mut entries: Vec<CounterEntry> = copied
            .into_iter()
            .map(|(username, counters)| CounterEntry {
                username,
                outgoing: counters.outgoing,
                incoming: counters.incoming,
            })
            .collect();
        entries.sort_by(|a, b| a.username.cmp(&b.username));
        entries
    }

    pub fn reset(&self) {
        let old = std::mem::take(&mut *self.inner.lock());
        drop(old);
    }

    /// Replace the whole table with previously persisted totals.
    ///
    /// Duplicate usernames in `entries` keep the last value.
    pub fn load<I>(&self, entries: I)
    where
        I: IntoIterator<Item = CounterEntry>,
    {
        let loaded: HashMap<String, Counters> = entries
            .into_iter()
            .map(|e| {
                (
                    e.username,
                    Counters {
                        outgoing: e.outgoing,
                        incoming: e.incoming,
                    },
                )
            })
            .collect();
        *self.inner.lock() = loaded;
    }

    pub fn get(&self, username: &str) -> Option<CounterEntry> {
        self.inner.lock().get(username).map(|c| CounterEntry {
            username: username.to_string(),
            outgoing: c.outgoing,
            incoming: c.incoming,
        })
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn entry(username: &str, outgoing: u64, incoming: u64) -> CounterEntry {
        CounterEntry {
            username: username.to_string(),
            outgoing,
            incoming,
        }
    }

    #[test]
    fn increment_creates_zeroed_entry() {
        let table = CounterTable::new();
        table.increment("alice", Direction::Outgoing, 150);
        assert_eq!(table.get("alice"), Some(entry("alice", 150, 0)));

        table.increment("alice", Direction::Incoming, 75);
        table.increment("alice", Direction::Outgoing, 10);
        assert_eq!(table.get("alice"), Some(entry("alice", 160, 75)));
        assert_eq!(table.get("bob"), None);
    }

    #[test]
    fn increment_saturates() {
        let table = CounterTable::new();
        table.increment("alice", Direction::Incoming, u64::MAX - 1);
        table.increment("alice", Direction::Incoming, 5);
        assert_eq!(table.get("alice").unwrap().incoming, u64::MAX);
    }

    #[test]
    fn snapshot_is_sorted_and_detached() {
        let table = CounterTable::new();
        table.increment("carol", Direction::Outgoing, 3);
        table.increment("alice", Direction::Outgoing, 1);
        table.increment("bob", Direction::Incoming, 2);

        let snapshot = table.snapshot();
        table.increment("alice", Direction::Outgoing, 100);

        assert_eq!(
            snapshot,
            vec![entry("alice", 1, 0), entry("bob", 0, 2), entry("carol", 3, 0)]
        );
    }

    #[test]
    fn reset_clears_everything() {
        let table = CounterTable::new();
        table.increment("alice", Direction::Outgoing, 500);
        table.reset();
        assert!(table.is_empty());

        table.increment("alice", Direction::Incoming, 7);
        assert_eq!(table.get("alice"), Some(entry("alice", 0, 7)));
    }

    #[test]
    fn load_of_snapshot_restores_identical_table() {
        let table = CounterTable::new();
        table.increment("alice", Direction::Outgoing, 100);
        table.increment("alice", Direction::Incoming, 50);
        table.increment("bob", Direction::Incoming, 9);
        let before = table.snapshot();

        let restored = CounterTable::new();
        restored.load(before.clone());
        assert_eq!(restored.snapshot(), before);

        restored.load(restored.snapshot());
        assert_eq!(restored.snapshot(), before);
    }

    #[test]
    fn load_replaces_existing_contents() {
        let table = CounterTable::new();
        table.increment("stale", Direction::Outgoing, 1);
        table.load(vec![entry("alice", 100, 50)]);
        assert_eq!(table.snapshot(), vec![entry("alice", 100, 50)]);
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        let table = Arc::new(CounterTable::new());
        let users = ["alice", "bob", "carol"];
        let threads = 8;
        let per_thread = 1_000u64;

        let handles: Vec<_> = (0..threads)
            .map(|t| {
                let table = table.clone();
                thread::spawn(move || {
                    for i in 0..per_thread {
                        let user = users[(i as usize + t) % users.len()];
                        let direction = if i % 2 == 0 {
                            Direction::Outgoing
                        } else {
                            Direction::Incoming
                        };
                        table.increment(user, direction, i + 1);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let expected: u64 = threads as u64 * (1..=per_thread).sum::<u64>();
        let total: u64 = table
            .snapshot()
            .iter()
            .map(|e| e.outgoing + e.incoming)
            .sum();
        assert_eq!(total, expected);
    }

    #[test]
    fn snapshots_taken_during_increments_see_whole_updates() {
        let table = Arc::new(CounterTable::new());
        let writer = {
            let table = table.clone();
            thread::spawn(move || {
                for _ in 0..10_000 {
                    // paired updates keep outgoing == incoming at every lock release
                    let mut guard = table.inner.lock();
                    let c = guard.entry("alice".to_string()).or_default();
                    c.outgoing += 3;
                    c.incoming += 3;
                }
            })
        };

        for _ in 0..1_000 {
            for e in table.snapshot() {
                assert_eq!(e.outgoing, e.incoming);
                assert_eq!(e.outgoing % 3, 0);
            }
        }
        writer.join().unwrap();
        assert_eq!(table.get("alice"), Some(entry("alice", 30_000, 30_000)));
    }
}
