//! Fisher-Yates permutation over a pluggable random source.
//!
//! Two sources are provided:
//! - [`EntropySource`]: fresh OS entropy per run; no seed to report.
//! - [`SeededSource`]: ChaCha8 stream from a `u64` seed. Every process that
//!   starts from the same seed and the same input order computes the same
//!   permutation. [`SeedStrategy::TimeBucket`] derives that seed from a coarse
//!   time bucket so instances agree without a lock. Two instances that shuffle
//!   in the same bucket from different snapshots still diverge.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Default width of a time bucket: two hours.
pub const DEFAULT_SEED_INTERVAL: Duration = Duration::from_secs(2 * 60 * 60);

pub trait RandomSource: Send {
    /// Uniformly distributed integer in `[0, upper]` (inclusive).
    fn index_through(&mut self, upper: usize) -> usize;

    /// Seed this source was built from, if it is reproducible.
    fn seed(&self) -> Option<u64>;
}

pub struct EntropySource {
    rng: StdRng,
}

impl EntropySource {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }
}

impl Default for EntropySource {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomSource for EntropySource {
    fn index_through(&mut self, upper: usize) -> usize {
        self.rng.gen_range(0..=upper)
    }

    fn seed(&self) -> Option<u64> {
        None
    }
}

pub struct SeededSource {
    seed: u64,
    rng: ChaCha8Rng,
}

impl SeededSource {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl RandomSource for SeededSource {
    fn index_through(&mut self, upper: usize) -> usize {
        self.rng.gen_range(0..=upper)
    }

    fn seed(&self) -> Option<u64> {
        Some(self.seed)
    }
}

/// Shuffle `items` in place: for `i` from the last index down to 1, swap `i`
/// with a uniform `j` in `[0, i]`.
pub fn shuffle_in_place<T>(items: &mut [T], source: &mut dyn RandomSource) {
    for i in (1..items.len()).rev() {
        let j = source.index_through(i);
        items.swap(i, j);
    }
}

/// Shuffled copy of `items`; the input is left untouched.
pub fn fisher_yates<T: Clone>(items: &[T], source: &mut dyn RandomSource) -> Vec<T> {
    let mut out = items.to_vec();
    shuffle_in_place(&mut out, source);
    out
}

/// `floor(unix_millis / interval_millis)`. Pre-epoch instants map to bucket 0.
pub fn time_bucket_seed(now: DateTime<Utc>, interval: Duration) -> u64 {
    let interval_ms = i64::try_from(interval.as_millis())
        .unwrap_or(i64::MAX)
        .max(1);
    let millis = now.timestamp_millis().max(0);
    (millis / interval_ms) as u64
}

/// How a run obtains its random source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedStrategy {
    Entropy,
    TimeBucket { interval: Duration },
    Fixed(u64),
}

impl SeedStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeedStrategy::Entropy => "entropy",
            SeedStrategy::TimeBucket { .. } => "time_bucket",
            SeedStrategy::Fixed(_) => "fixed",
        }
    }

    pub fn source_at(&self, now: DateTime<Utc>) -> Box<dyn RandomSource> {
        match *self {
            SeedStrategy::Entropy => Box::new(EntropySource::new()),
            SeedStrategy::TimeBucket { interval } => {
                Box::new(SeededSource::new(time_bucket_seed(now, interval)))
            }
            SeedStrategy::Fixed(seed) => Box::new(SeededSource::new(seed)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn empty_and_single_inputs_are_noops() {
        let mut src = SeededSource::new(7);
        let empty: Vec<u32> = Vec::new();
        assert!(fisher_yates(&empty, &mut src).is_empty());
        assert_eq!(fisher_yates(&[42u32], &mut src), vec![42]);
    }

    #[test]
    fn output_is_a_permutation_of_input() {
        let input: Vec<u32> = (0..500).collect();
        let mut out = fisher_yates(&input, &mut EntropySource::new());
        assert_eq!(out.len(), input.len());
        out.sort_unstable();
        assert_eq!(out, input);
    }

    #[test]
    fn same_seed_same_order() {
        let input: Vec<u32> = (0..200).collect();
        let a = fisher_yates(&input, &mut SeededSource::new(123_456));
        let b = fisher_yates(&input, &mut SeededSource::new(123_456));
        assert_eq!(a, b);
        assert_ne!(a, input, "200 elements should not survive a shuffle in order");
    }

    #[test]
    fn different_seeds_differ() {
        let input: Vec<u32> = (0..200).collect();
        let a = fisher_yates(&input, &mut SeededSource::new(1));
        let b = fisher_yates(&input, &mut SeededSource::new(2));
        assert_ne!(a, b);
    }

    #[test]
    fn seeded_source_reports_seed() {
        assert_eq!(SeededSource::new(99).seed(), Some(99));
        assert_eq!(EntropySource::new().seed(), None);
    }

    #[test]
    fn entropy_positions_are_roughly_uniform() {
        // 5 items, 20k shuffles: each (item, slot) cell expects 4000 hits, sd ~57.
        const ITEMS: usize = 5;
        const ROUNDS: usize = 20_000;
        let input: Vec<usize> = (0..ITEMS).collect();
        let mut counts = [[0usize; ITEMS]; ITEMS];
        let mut src = EntropySource::new();

        for _ in 0..ROUNDS {
            let out = fisher_yates(&input, &mut src);
            for (slot, item) in out.into_iter().enumerate() {
                counts[item][slot] += 1;
            }
        }

        let expected = ROUNDS / ITEMS;
        for row in counts.iter() {
            for &c in row.iter() {
                let diff = c.abs_diff(expected);
                assert!(diff < 400, "cell count {c} too far from {expected}");
            }
        }
    }

    #[test]
    fn time_bucket_groups_instants() {
        let interval = DEFAULT_SEED_INTERVAL;
        let t0 = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();
        let same = Utc.with_ymd_and_hms(2026, 3, 1, 11, 59, 59).unwrap();
        let next = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();

        assert_eq!(time_bucket_seed(t0, interval), time_bucket_seed(same, interval));
        assert_eq!(
            time_bucket_seed(next, interval),
            time_bucket_seed(t0, interval) + 1
        );
    }

    #[test]
    fn time_bucket_strategy_is_reproducible_within_bucket() {
        let strategy = SeedStrategy::TimeBucket {
            interval: DEFAULT_SEED_INTERVAL,
        };
        let t0 = Utc.with_ymd_and_hms(2026, 3, 1, 10, 5, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2026, 3, 1, 10, 55, 0).unwrap();
        let input: Vec<u32> = (0..64).collect();

        let mut a = strategy.source_at(t0);
        let mut b = strategy.source_at(t1);
        assert_eq!(a.seed(), b.seed());
        assert_eq!(
            fisher_yates(&input, a.as_mut()),
            fisher_yates(&input, b.as_mut())
        );
    }
}
