use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// How long a sync stays fresh before the next signed call resyncs first.
const MAX_SYNC_AGE_MS: i64 = 30_000;

/// Process-wide venue clock.
///
/// Signed requests must carry the venue's notion of "now"; this type keeps a
/// single `server − local` offset behind atomics so sign-time reads take no
/// lock. One writer (the resync path) swaps the offset; all signers read it
/// with acquire semantics.
#[derive(Debug, Default)]
pub struct VenueClock {
    offset_ms: AtomicI64,
    last_sync_local_ms: AtomicI64,
}

impl VenueClock {
    pub fn new() -> Self {
        Self::default()
    }

    fn local_ms() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }

    /// The venue's current time in epoch milliseconds.
    pub fn now_ms(&self) -> i64 {
        Self::local_ms() + self.offset_ms.load(Ordering::Acquire)
    }

    /// The current `server − local` offset in milliseconds.
    pub fn offset_ms(&self) -> i64 {
        self.offset_ms.load(Ordering::Acquire)
    }

    /// Records a fresh server timestamp, updating the offset.
    pub fn record(&self, server_ms: i64) {
        let local = Self::local_ms();
        self.offset_ms.store(server_ms - local, Ordering::Release);
        self.last_sync_local_ms.store(local, Ordering::Release);
    }

    /// True when the last sync is older than the freshness window (or never
    /// happened).
    pub fn is_stale(&self) -> bool {
        let last = self.last_sync_local_ms.load(Ordering::Acquire);
        last == 0 || Self::local_ms() - last > MAX_SYNC_AGE_MS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_clock_is_stale_until_first_sync() {
        let clock = VenueClock::new();
        assert!(clock.is_stale());
        clock.record(VenueClock::local_ms() + 1500);
        assert!(!clock.is_stale());
    }

    #[test]
    fn offset_tracks_server_ahead_and_behind() {
        let clock = VenueClock::new();
        let local = VenueClock::local_ms();

        clock.record(local + 2000);
        assert!((clock.offset_ms() - 2000).abs() < 50);

        clock.record(local - 2000);
        assert!((clock.offset_ms() + 2000).abs() < 50);
    }

    #[test]
    fn now_applies_offset() {
        let clock = VenueClock::new();
        clock.record(VenueClock::local_ms() + 60_000);
        let diff = clock.now_ms() - VenueClock::local_ms();
        assert!((diff - 60_000).abs() < 50);
    }
}
