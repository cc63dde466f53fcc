use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Suppresses repeated identical warnings within a window.
///
/// Replaces the source system's scattered "first error already logged" flags
/// with one value type: the first occurrence of a key passes, repeats are
/// silenced until the window elapses.
#[derive(Debug)]
pub struct Warnings {
    window: Duration,
    last_emitted: Mutex<HashMap<String, Instant>>,
}

impl Warnings {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_emitted: Mutex::new(HashMap::new()),
        }
    }

    /// True when the caller should emit the warning keyed by `key`.
    pub fn should_emit(&self, key: &str) -> bool {
        let mut last = self.last_emitted.lock().expect("warnings map poisoned");
        let now = Instant::now();
        match last.get(key) {
            Some(at) if now.duration_since(*at) < self.window => false,
            _ => {
                last.insert(key.to_string(), now);
                true
            }
        }
    }
}

impl Default for Warnings {
    fn default() -> Self {
        // One identical warning per minute is plenty for a 3-second tick.
        Self::new(Duration::from_secs(60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_emission_passes_then_suppresses() {
        let warnings = Warnings::new(Duration::from_secs(60));
        assert!(warnings.should_emit("depth-fetch-failed"));
        assert!(!warnings.should_emit("depth-fetch-failed"));
        assert!(warnings.should_emit("other-key"));
    }

    #[test]
    fn window_expiry_re_emits() {
        let warnings = Warnings::new(Duration::from_millis(0));
        assert!(warnings.should_emit("k"));
        assert!(warnings.should_emit("k"));
    }
}
