use core_types::{ActivityLog, StrategyKind};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// Capacity of the advisory in-memory log ring per engine.
pub const RING_CAPACITY: usize = 500;

/// Newest-first bounded buffer of recent activity log entries.
///
/// Purely advisory: the durable `activity_logs` table is the source of truth
/// for audit. The ring backs the fast logs API.
#[derive(Debug)]
pub struct LogRing {
    entries: Mutex<VecDeque<ActivityLog>>,
}

impl Default for LogRing {
    fn default() -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(RING_CAPACITY)),
        }
    }
}

impl LogRing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: ActivityLog) {
        let mut entries = self.entries.lock().expect("log ring poisoned");
        entries.push_front(entry);
        entries.truncate(RING_CAPACITY);
    }

    /// Up to `limit` most recent entries, newest first.
    pub fn recent(&self, limit: usize) -> Vec<ActivityLog> {
        let entries = self.entries.lock().expect("log ring poisoned");
        entries.iter().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("log ring poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One ring per strategy engine, shared between the engines and the logs API.
#[derive(Debug, Clone)]
pub struct LogRings {
    rings: Arc<HashMap<StrategyKind, Arc<LogRing>>>,
}

impl Default for LogRings {
    fn default() -> Self {
        let rings = StrategyKind::ALL
            .iter()
            .map(|kind| (*kind, Arc::new(LogRing::new())))
            .collect();
        Self {
            rings: Arc::new(rings),
        }
    }
}

impl LogRings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ring(&self, kind: StrategyKind) -> Arc<LogRing> {
        Arc::clone(
            self.rings
                .get(&kind)
                .expect("ring exists for every strategy"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::LogLevel;
    use serde_json::json;

    fn entry(message: &str) -> ActivityLog {
        ActivityLog::new(
            None,
            StrategyKind::Stabilizer,
            LogLevel::Info,
            message,
            json!({}),
        )
    }

    #[test]
    fn ring_is_newest_first() {
        let ring = LogRing::new();
        ring.push(entry("first"));
        ring.push(entry("second"));

        let recent = ring.recent(10);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].message, "second");
        assert_eq!(recent[1].message, "first");
    }

    #[test]
    fn ring_caps_at_capacity() {
        let ring = LogRing::new();
        for i in 0..(RING_CAPACITY + 50) {
            ring.push(entry(&format!("entry-{}", i)));
        }
        assert_eq!(ring.len(), RING_CAPACITY);
        // The newest entry survives; the oldest were dropped.
        assert_eq!(
            ring.recent(1)[0].message,
            format!("entry-{}", RING_CAPACITY + 49)
        );
    }

    #[test]
    fn every_strategy_has_a_ring() {
        let rings = LogRings::new();
        for kind in StrategyKind::ALL {
            rings.ring(kind).push(entry("x"));
            assert_eq!(rings.ring(kind).len(), 1);
        }
    }
}
