//! Identifier minting and a monotonic wall-clock source.

use chrono::{DateTime, Duration, Timelike, Utc};
use std::sync::Mutex;
use uuid::Uuid;

/// Mint a fresh opaque entity id.
pub fn mint_id() -> String {
    Uuid::new_v4().to_string()
}

/// Wall-clock source issuing strictly increasing timestamps per process.
///
/// Journal ordering relies on timestamps never repeating: when two reads land
/// in the same microsecond the second is bumped one microsecond past the last
/// issued value. Storage serializes these as fixed-width ISO-8601 UTC strings
/// so lexicographic and chronological order coincide.
#[derive(Debug)]
pub struct Clock {
    last: Mutex<DateTime<Utc>>,
}

impl Clock {
    pub fn new() -> Self {
        Self { last: Mutex::new(DateTime::<Utc>::MIN_UTC) }
    }

    /// Current time, strictly greater than any previously issued value.
    ///
    /// Truncated to microseconds up front: storage keeps microsecond
    /// precision, and sub-microsecond noise would let two issued values
    /// collide once serialized.
    pub fn now(&self) -> DateTime<Utc> {
        let mut last = self.last.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut now = Utc::now();
        now = now
            .with_nanosecond(now.nanosecond() / 1000 * 1000)
            .unwrap_or(now);
        if now <= *last {
            now = *last + Duration::microseconds(1);
        }
        *last = now;
        now
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        let a = mint_id();
        let b = mint_id();
        assert_ne!(a, b);
        assert!(Uuid::parse_str(&a).is_ok());
    }

    #[test]
    fn timestamps_strictly_increase() {
        let clock = Clock::new();
        let mut prev = clock.now();
        for _ in 0..10_000 {
            let next = clock.now();
            assert!(next > prev, "clock must never repeat or go backwards");
            prev = next;
        }
    }

    #[test]
    fn timestamps_strictly_increase_across_threads() {
        let clock = std::sync::Arc::new(Clock::new());
        let mut handles = Vec::new();
        for _ in 0..4 {
            let clock = clock.clone();
            handles.push(std::thread::spawn(move || {
                (0..1000).map(|_| clock.now()).collect::<Vec<_>>()
            }));
        }
        let mut all: Vec<_> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
        let total = all.len();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), total, "no two issued timestamps may collide");
    }
}
