use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// In-memory window of recently seen storage events. Resets with the process.
#[derive(Debug)]
pub struct RecentEvents {
    window: Duration,
    seen: Mutex<HashMap<String, Instant>>,
}

impl RecentEvents {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            seen: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the time since the previous attempt when `key` is inside the window;
    /// otherwise records this attempt and returns `None`.
    pub fn check_and_record(&self, key: &str) -> Option<Duration> {
        self.check_and_record_at(key, Instant::now())
    }

    fn check_and_record_at(&self, key: &str, now: Instant) -> Option<Duration> {
        let mut seen = match self.seen.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(previous) = seen.get(key) {
            let elapsed = now.saturating_duration_since(*previous);
            if elapsed < self.window {
                return Some(elapsed);
            }
        }

        let window = self.window;
        seen.retain(|_, at| now.saturating_duration_since(*at) < window);
        seen.insert(key.to_string(), now);
        None
    }

    pub fn len(&self) -> usize {
        self.seen.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
