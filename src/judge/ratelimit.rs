//! Per-identifier sliding-window admission control. The counter resets fully
//! once a window elapses (bursts are possible at window boundaries; this is
//! the documented approximation, not a leaky bucket). A background sweep
//! purges stale entries so memory stays bounded by active identifiers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::time::interval;
use tracing::debug;

use crate::judge::types::JudgeError;

#[derive(Debug, Clone, Copy)]
struct WindowEntry {
    count: u32,
    window_start: Instant,
}

pub struct RateLimiter {
    entries: Mutex<HashMap<String, WindowEntry>>,
    max_requests: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_requests,
            window,
        }
    }

    /// Admit or reject one request for `identifier`. The read-modify-write is
    /// atomic under the map lock, so concurrent requests for the same
    /// identifier are serialized.
    pub fn check(&self, identifier: &str) -> Result<(), JudgeError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());

        let entry = entries
            .entry(identifier.to_string())
            .or_insert(WindowEntry {
                count: 0,
                window_start: now,
            });

        if now.duration_since(entry.window_start) >= self.window {
            // Window elapsed: reset, anchored at now.
            entry.count = 1;
            entry.window_start = now;
            return Ok(());
        }

        if entry.count >= self.max_requests {
            let remaining = self.window - now.duration_since(entry.window_start);
            let retry_after_secs = remaining.as_secs_f64().ceil().max(1.0) as u64;
            return Err(JudgeError::RateLimited { retry_after_secs });
        }

        entry.count += 1;
        Ok(())
    }

    /// Drop entries whose window has fully elapsed.
    pub fn sweep(&self) {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|_, entry| now.duration_since(entry.window_start) < self.window);
        let removed = before - entries.len();
        if removed > 0 {
            debug!("Rate limiter sweep removed {} stale entries", removed);
        }
    }

    pub fn tracked_identifiers(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Spawn the periodic sweep task. Runs for the process lifetime.
    pub fn start_sweeper(self: &Arc<Self>) {
        let limiter = self.clone();
        let period = limiter.window;
        tokio::spawn(async move {
            let mut ticker = interval(period);
            loop {
                ticker.tick().await;
                limiter.sweep();
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_exactly_the_ceiling_within_a_window() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        for _ in 0..3 {
            assert!(limiter.check("alice").is_ok());
        }
        let err = limiter.check("alice").unwrap_err();
        match err {
            JudgeError::RateLimited { retry_after_secs } => {
                assert!(retry_after_secs >= 1 && retry_after_secs <= 60);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn identifiers_are_independent() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.check("alice").is_ok());
        assert!(limiter.check("bob").is_ok());
        assert!(limiter.check("alice").is_err());
        assert!(limiter.check("bob").is_err());
    }

    #[test]
    fn window_elapse_resets_the_counter() {
        let limiter = RateLimiter::new(2, Duration::from_millis(30));
        assert!(limiter.check("alice").is_ok());
        assert!(limiter.check("alice").is_ok());
        assert!(limiter.check("alice").is_err());

        std::thread::sleep(Duration::from_millis(40));
        // Full budget again after the window has elapsed.
        assert!(limiter.check("alice").is_ok());
        assert!(limiter.check("alice").is_ok());
        assert!(limiter.check("alice").is_err());
    }

    #[test]
    fn sweep_drops_only_stale_entries() {
        let limiter = RateLimiter::new(5, Duration::from_millis(30));
        limiter.check("old").unwrap();
        std::thread::sleep(Duration::from_millis(40));
        limiter.check("fresh").unwrap();

        assert_eq!(limiter.tracked_identifiers(), 2);
        limiter.sweep();
        assert_eq!(limiter.tracked_identifiers(), 1);
    }

    #[test]
    fn concurrent_checks_never_exceed_the_ceiling() {
        let limiter = Arc::new(RateLimiter::new(50, Duration::from_secs(60)));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let limiter = limiter.clone();
            handles.push(std::thread::spawn(move || {
                (0..20).filter(|_| limiter.check("shared").is_ok()).count()
            }));
        }
        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(admitted, 50);
    }
}
