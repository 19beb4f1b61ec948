use std::cmp::Ordering;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Current wall-clock time as milliseconds since the Unix epoch.
/// A clock before the epoch degrades to 0; the logical counter keeps
/// timestamps strictly increasing regardless.
fn physical_now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// A document timestamp: wall-clock milliseconds plus a logical counter
/// that disambiguates mutations landing in the same millisecond.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    pub wall_ms: u64,
    pub counter: u32,
}

impl Timestamp {
    pub fn new(wall_ms: u64, counter: u32) -> Self {
        Self { wall_ms, counter }
    }

    pub fn to_bytes(&self) -> [u8; 12] {
        let mut buf = [0u8; 12];
        buf[..8].copy_from_slice(&self.wall_ms.to_be_bytes());
        buf[8..].copy_from_slice(&self.counter.to_be_bytes());
        buf
    }

    pub fn from_bytes(bytes: &[u8; 12]) -> Self {
        let wall_ms = u64::from_be_bytes(bytes[..8].try_into().unwrap());
        let counter = u32::from_be_bytes(bytes[8..].try_into().unwrap());
        Self { wall_ms, counter }
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_bytes().cmp(&other.to_bytes())
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({}+{})", self.wall_ms, self.counter)
    }
}

/// A clock that issues strictly increasing timestamps for one session.
pub struct MonotonicClock {
    wall_ms: u64,
    counter: u32,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            wall_ms: 0,
            counter: 0,
        }
    }

    /// Generate the next strictly increasing timestamp.
    pub fn tick(&mut self) -> Timestamp {
        let now = physical_now_ms();

        let ts = if now > self.wall_ms {
            Timestamp::new(now, 0)
        } else {
            Timestamp::new(self.wall_ms, self.counter + 1)
        };

        self.wall_ms = ts.wall_ms;
        self.counter = ts.counter;
        ts
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_monotonicity() {
        let mut clock = MonotonicClock::new();
        let mut prev = clock.tick();
        for _ in 0..100 {
            let next = clock.tick();
            assert!(next > prev, "expected {next:?} > {prev:?}");
            prev = next;
        }
    }

    #[test]
    fn same_wall_time_increments_counter() {
        let mut clock = MonotonicClock::new();
        // Push the clock's wall_ms far into the future so physical_now < wall_ms
        let future_ms = physical_now_ms() + 100_000;
        clock.wall_ms = future_ms;
        clock.counter = 0;

        let t1 = clock.tick();
        assert_eq!(t1.wall_ms, future_ms);
        assert_eq!(t1.counter, 1);

        let t2 = clock.tick();
        assert_eq!(t2.wall_ms, future_ms);
        assert_eq!(t2.counter, 2);
    }

    #[test]
    fn byte_roundtrip() {
        let ts = Timestamp::new(1_700_000_000_000, 42);
        let bytes = ts.to_bytes();
        let recovered = Timestamp::from_bytes(&bytes);
        assert_eq!(ts, recovered);
    }

    #[test]
    fn ordering_matches_bytes() {
        let pairs = vec![
            (Timestamp::new(100, 0), Timestamp::new(200, 0)),
            (Timestamp::new(100, 0), Timestamp::new(100, 1)),
            (Timestamp::new(100, 999), Timestamp::new(101, 0)),
            (Timestamp::new(0, 0), Timestamp::new(0, 1)),
        ];

        for (a, b) in &pairs {
            assert_eq!(
                a.cmp(b),
                a.to_bytes().cmp(&b.to_bytes()),
                "ordering doesn't match byte ordering for {a:?} vs {b:?}"
            );
            assert!(a < b, "expected {a:?} < {b:?}");
        }
    }

    #[test]
    fn serde_roundtrip() {
        let ts = Timestamp::new(1_700_000_000_000, 7);
        let json = serde_json::to_string(&ts).unwrap();
        let back: Timestamp = serde_json::from_str(&json).unwrap();
        assert_eq!(ts, back);
    }
}
