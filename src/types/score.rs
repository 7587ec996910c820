use serde::{Deserialize, Serialize};

/// 2017-01-01T00:00:00Z, the zero point of the score axis.
pub const SCORE_EPOCH: i64 = 1_483_228_800;

/// Length of one score bucket in seconds (5 minutes).
pub const QUANTUM_SECONDS: i64 = 300;

/// Converts between unix timestamps (seconds) and integer scores.
///
/// A score names the 5-minute bucket that *ends* at
/// `timestamp_from_score(score)`; the raw ticks resampled into it are those
/// of [`ScoreClock::window`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreClock {
    epoch: i64,
    quantum: i64,
}

impl Default for ScoreClock {
    fn default() -> Self {
        Self {
            epoch: SCORE_EPOCH,
            quantum: QUANTUM_SECONDS,
        }
    }
}

impl ScoreClock {
    /// Bucket length in seconds.
    pub fn quantum(&self) -> i64 {
        self.quantum
    }

    /// Score of the bucket containing `timestamp`, rounding down.
    pub fn score_from_timestamp(&self, timestamp: i64) -> i64 {
        (timestamp - self.epoch).div_euclid(self.quantum)
    }

    /// Score of the first bucket that closes at or after `timestamp`.
    pub fn closing_score(&self, timestamp: i64) -> i64 {
        let offset = timestamp - self.epoch;
        offset.div_euclid(self.quantum) + i64::from(offset.rem_euclid(self.quantum) != 0)
    }

    pub fn timestamp_from_score(&self, score: i64) -> i64 {
        self.epoch + score * self.quantum
    }

    /// Whether `timestamp` sits exactly on a bucket boundary.
    pub fn is_aligned(&self, timestamp: i64) -> bool {
        (timestamp - self.epoch).rem_euclid(self.quantum) == 0
    }

    /// Raw-tick window resampled into `score`: `(ts(score) - quantum, ts(score)]`.
    pub fn window(&self, score: i64) -> TimeWindow {
        let end = self.timestamp_from_score(score);
        TimeWindow {
            start: end - self.quantum + 1,
            end,
        }
    }
}

/// Inclusive range of unix timestamps in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: i64,
    pub end: i64,
}

impl TimeWindow {
    pub fn contains(&self, timestamp: i64) -> bool {
        timestamp >= self.start && timestamp <= self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epoch_is_score_zero() {
        let clock = ScoreClock::default();
        assert_eq!(clock.score_from_timestamp(SCORE_EPOCH), 0);
        assert_eq!(clock.timestamp_from_score(0), SCORE_EPOCH);
    }

    #[test]
    fn test_score_round_trip_on_aligned_timestamps() {
        let clock = ScoreClock::default();
        let ts = SCORE_EPOCH + 155_773 * 300;
        assert!(clock.is_aligned(ts));
        assert_eq!(clock.score_from_timestamp(ts), 155_773);
        assert_eq!(clock.timestamp_from_score(155_773), ts);
    }

    #[test]
    fn test_unaligned_timestamps() {
        let clock = ScoreClock::default();
        let ts = SCORE_EPOCH + 10 * 300 + 17;
        assert!(!clock.is_aligned(ts));
        assert_eq!(clock.score_from_timestamp(ts), 10);
        assert_eq!(clock.closing_score(ts), 11);
        assert_eq!(clock.closing_score(SCORE_EPOCH + 10 * 300), 10);
    }

    #[test]
    fn test_timestamps_before_epoch() {
        let clock = ScoreClock::default();
        assert_eq!(clock.score_from_timestamp(SCORE_EPOCH - 1), -1);
        assert_eq!(clock.closing_score(SCORE_EPOCH - 1), 0);
    }

    #[test]
    fn test_window_covers_one_quantum_ending_at_score() {
        let clock = ScoreClock::default();
        let window = clock.window(3);
        assert_eq!(window.end, SCORE_EPOCH + 900);
        assert_eq!(window.end - window.start + 1, QUANTUM_SECONDS);
        assert!(window.contains(SCORE_EPOCH + 601));
        assert!(!window.contains(SCORE_EPOCH + 600));
        for ts in window.start..=window.end {
            assert_eq!(clock.closing_score(ts), 3);
        }
    }
}
