//! Simulated submission progress.
//!
//! The backend answers each submission with a single response and reports no
//! intermediate progress. The percentage shown while waiting is therefore a
//! local animation: it only moves forward, stays at or below a cap (95 by
//! default) for as long as the request is outstanding, and snaps to 100 when
//! the response arrives.
//!
//! # Example
//!
//! ```rust
//! use toolflow::SimulatedProgress;
//!
//! let mut progress = SimulatedProgress::with_seed(95, 7);
//! for _ in 0..100 {
//!     assert!(progress.tick() <= 95);
//! }
//! assert_eq!(progress.complete(), 100);
//! ```

/// Largest single step, in percent.
const MAX_STEP: u64 = 15;

/// Fake progress that only completes when the real response does.
#[derive(Debug, Clone)]
pub struct SimulatedProgress {
    percent: u8,
    cap: u8,
    state: u64,
}

impl SimulatedProgress {
    /// Start at 0 with steps seeded from the clock.
    pub fn new(cap: u8) -> Self {
        let seed = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0x9E37_79B9_7F4A_7C15);
        Self::with_seed(cap, seed)
    }

    /// Start at 0 with a fixed step sequence.
    pub fn with_seed(cap: u8, seed: u64) -> Self {
        Self {
            percent: 0,
            cap: cap.clamp(1, 99),
            // xorshift never leaves zero
            state: seed | 1,
        }
    }

    pub fn percent(&self) -> u8 {
        self.percent
    }

    pub fn is_complete(&self) -> bool {
        self.percent == 100
    }

    /// Advance by a random step of 1–15, never past the cap.
    pub fn tick(&mut self) -> u8 {
        if self.is_complete() {
            return 100;
        }
        let step = (self.next_random() % MAX_STEP + 1) as u8;
        self.percent = self.percent.saturating_add(step).min(self.cap);
        self.percent
    }

    /// Snap to 100.
    pub fn complete(&mut self) -> u8 {
        self.percent = 100;
        self.percent
    }

    /// Stage label for the current percentage.
    pub fn message(&self) -> &'static str {
        stage_message(self.percent)
    }

    fn next_random(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }
}

/// Label shown under the progress bar.
pub fn stage_message(percent: u8) -> &'static str {
    match percent {
        0..=19 => "Uploading files...",
        20..=59 => "Processing...",
        60..=99 => "Finalizing...",
        _ => "Complete!",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monotonic_and_capped() {
        for seed in [1u64, 42, 0xDEAD_BEEF, u64::MAX] {
            let mut p = SimulatedProgress::with_seed(95, seed);
            let mut last = 0;
            for _ in 0..200 {
                let now = p.tick();
                assert!(now >= last, "seed {seed}: {now} < {last}");
                assert!(now <= 95, "seed {seed}: {now}");
                last = now;
            }
            assert_eq!(last, 95, "seed {seed} never reached the cap");
        }
    }

    #[test]
    fn snaps_to_hundred_and_stays() {
        let mut p = SimulatedProgress::with_seed(95, 3);
        p.tick();
        assert_eq!(p.complete(), 100);
        assert_eq!(p.tick(), 100);
        assert_eq!(p.message(), "Complete!");
    }

    #[test]
    fn cap_is_clamped() {
        let mut p = SimulatedProgress::with_seed(100, 9);
        for _ in 0..200 {
            p.tick();
        }
        assert_eq!(p.percent(), 99);
    }

    #[test]
    fn stage_labels() {
        assert_eq!(stage_message(0), "Uploading files...");
        assert_eq!(stage_message(40), "Processing...");
        assert_eq!(stage_message(95), "Finalizing...");
    }
}
