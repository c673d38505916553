// Seedable, replayable pseudo-random number generator for Maze Race.
//
// xoshiro256++ (Blackman & Vigna, 2019), expanded from a single `u64` seed
// through SplitMix64. Every random decision in a round draws from one
// `RaceRng` owned by the engine: recursive-backtracker carving, loop bridge
// placement, wanderer choices, sniffer noise, fragile-mouse mistakes, pickup
// placement and the rival controller. Replaying a round means replaying the
// seed plus the command log, nothing else.
//
// The helpers on top of the raw generator (`pick`, `chance`, `jitter`) are
// the vocabulary the sim actually speaks. They are built only from integer
// draws or the 53-bit `next_f64`, so their output is bit-identical across
// platforms.
//
// **Critical constraint: determinism.** No OS entropy, no stdlib hashing
// seeds, no floating point inside the core generator.

use serde::{Deserialize, Serialize};

/// The engine's single source of randomness.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceRng {
    s: [u64; 4],
}

impl RaceRng {
    /// Seed a generator. Equal seeds give equal streams.
    pub fn new(seed: u64) -> Self {
        let mut sm = seed;
        Self {
            s: [
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
            ],
        }
    }

    pub fn next_u64(&mut self) -> u64 {
        let result = (self.s[0].wrapping_add(self.s[3]))
            .rotate_left(23)
            .wrapping_add(self.s[0]);

        let t = self.s[1] << 17;

        self.s[2] ^= self.s[0];
        self.s[3] ^= self.s[1];
        self.s[1] ^= self.s[2];
        self.s[0] ^= self.s[3];

        self.s[2] ^= t;
        self.s[3] = self.s[3].rotate_left(45);

        result
    }

    /// Uniform `f64` in [0, 1) built from the top 53 bits.
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Uniform integer in `[low, high)`, rejection-sampled so small ranges
    /// carry no modulo bias.
    ///
    /// Panics if `low >= high`.
    pub fn range_u64(&mut self, low: u64, high: u64) -> u64 {
        assert!(low < high, "range_u64: empty range {low}..{high}");
        let span = high - low;
        if span.is_power_of_two() {
            return low + (self.next_u64() & (span - 1));
        }
        let threshold = span.wrapping_neg() % span;
        loop {
            let r = self.next_u64();
            if r >= threshold {
                return low + (r % span);
            }
        }
    }

    /// Uniform index in `[low, high)`.
    pub fn range_usize(&mut self, low: usize, high: usize) -> usize {
        self.range_u64(low as u64, high as u64) as usize
    }

    /// `true` with probability `p`. `p <= 0` never fires, `p >= 1` always does.
    pub fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// Uniform `f64` in `[0, scale)`. Used for scoring jitter.
    pub fn jitter(&mut self, scale: f64) -> f64 {
        self.next_f64() * scale
    }

    /// Pick one element uniformly, or `None` from an empty slice.
    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            None
        } else {
            Some(&items[self.range_usize(0, items.len())])
        }
    }
}

/// SplitMix64 step, used only to expand the seed.
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_replays_the_same_stream() {
        let mut a = RaceRng::new(7);
        let mut b = RaceRng::new(7);
        for _ in 0..1000 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn different_seeds_diverge() {
        let mut a = RaceRng::new(7);
        let mut b = RaceRng::new(8);
        assert_ne!(a.next_u64(), b.next_u64());
    }

    #[test]
    fn next_f64_stays_in_unit_interval() {
        let mut rng = RaceRng::new(12345);
        for _ in 0..10_000 {
            let v = rng.next_f64();
            assert!((0.0..1.0).contains(&v), "out of range: {v}");
        }
    }

    #[test]
    fn range_usize_hits_both_ends_and_nothing_else() {
        let mut rng = RaceRng::new(3);
        let mut seen = [false; 4];
        for _ in 0..2_000 {
            let v = rng.range_usize(2, 6);
            assert!((2..6).contains(&v));
            seen[v - 2] = true;
        }
        assert!(seen.iter().all(|s| *s), "every value in range should appear");
    }

    #[test]
    fn chance_extremes() {
        let mut rng = RaceRng::new(1);
        for _ in 0..100 {
            assert!(!rng.chance(0.0));
            assert!(rng.chance(1.0));
        }
    }

    #[test]
    fn chance_is_roughly_calibrated() {
        let mut rng = RaceRng::new(42);
        let hits = (0..10_000).filter(|_| rng.chance(0.25)).count();
        let pct = hits as f64 / 10_000.0;
        assert!((0.22..0.28).contains(&pct), "expected ~25%, got {pct}");
    }

    #[test]
    fn pick_from_empty_is_none() {
        let mut rng = RaceRng::new(5);
        let empty: [u8; 0] = [];
        assert!(rng.pick(&empty).is_none());
        assert_eq!(rng.pick(&[9]), Some(&9));
    }

    #[test]
    fn serialization_resumes_the_stream() {
        let mut rng = RaceRng::new(42);
        for _ in 0..100 {
            rng.next_u64();
        }
        let json = serde_json::to_string(&rng).unwrap();
        let mut restored: RaceRng = serde_json::from_str(&json).unwrap();
        for _ in 0..100 {
            assert_eq!(rng.next_u64(), restored.next_u64());
        }
    }
}
