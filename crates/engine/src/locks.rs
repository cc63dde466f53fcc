use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Per-bot in-flight locks.
///
/// Acquisition is try-only and never blocks: a tick that finds a bot still
/// busy from the previous tick simply skips it (no queueing). The guard
/// releases on every exit path, including panics and task aborts, because
/// release lives in `Drop`.
#[derive(Debug, Clone, Default)]
pub struct InFlightLocks {
    held: Arc<Mutex<HashSet<Uuid>>>,
}

impl InFlightLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempts to take the lock for one bot. `None` means another work unit
    /// currently owns it.
    pub fn try_acquire(&self, bot_id: Uuid) -> Option<InFlightGuard> {
        let mut held = self.held.lock().expect("lock map poisoned");
        if held.insert(bot_id) {
            Some(InFlightGuard {
                bot_id,
                held: Arc::clone(&self.held),
            })
        } else {
            None
        }
    }

    /// Number of work units currently in flight, for status reporting.
    pub fn in_flight(&self) -> usize {
        self.held.lock().expect("lock map poisoned").len()
    }
}

/// Releases the bot's lock when dropped.
#[derive(Debug)]
pub struct InFlightGuard {
    bot_id: Uuid,
    held: Arc<Mutex<HashSet<Uuid>>>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.held
            .lock()
            .expect("lock map poisoned")
            .remove(&self.bot_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_fails_while_held() {
        let locks = InFlightLocks::new();
        let bot = Uuid::new_v4();

        let guard = locks.try_acquire(bot).expect("first acquire succeeds");
        assert!(locks.try_acquire(bot).is_none());
        assert_eq!(locks.in_flight(), 1);

        drop(guard);
        assert!(locks.try_acquire(bot).is_some());
    }

    #[test]
    fn locks_are_per_bot() {
        let locks = InFlightLocks::new();
        let _a = locks.try_acquire(Uuid::new_v4()).unwrap();
        let _b = locks.try_acquire(Uuid::new_v4()).unwrap();
        assert_eq!(locks.in_flight(), 2);
    }

    #[test]
    fn panic_inside_a_work_unit_still_releases() {
        let locks = InFlightLocks::new();
        let bot = Uuid::new_v4();
        let cloned = locks.clone();

        let result = std::panic::catch_unwind(move || {
            let _guard = cloned.try_acquire(bot).unwrap();
            panic!("work unit exploded");
        });
        assert!(result.is_err());
        assert!(locks.try_acquire(bot).is_some());
    }
}
