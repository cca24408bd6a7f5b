use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use megasena_db::models::{Draw, PICK_COUNT, POOL_SIZE};

/// Uniform 6-of-60 draws from an injected random source.
pub struct DrawGenerator<R> {
    rng: R,
}

impl DrawGenerator<StdRng> {
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }

    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_rng(&mut rand::rng()))
    }

    pub fn with_seed(seed: Option<u64>) -> Self {
        match seed {
            Some(s) => Self::seeded(s),
            None => Self::from_entropy(),
        }
    }
}

impl<R: Rng> DrawGenerator<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// Rejection sampling on duplicates keeps every unordered 6-subset equally likely.
    pub fn sample(&mut self) -> Draw {
        let mut picked = [false; POOL_SIZE as usize + 1];
        let mut balls = [0u8; PICK_COUNT];
        let mut filled = 0;
        while filled < PICK_COUNT {
            let n = self.rng.random_range(1..=POOL_SIZE);
            if !picked[n as usize] {
                picked[n as usize] = true;
                balls[filled] = n;
                filled += 1;
            }
        }
        Draw::from_distinct(balls)
    }

    pub fn sample_batch(&mut self, count: usize) -> Vec<Draw> {
        (0..count).map(|_| self.sample()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_is_valid_draw() {
        let mut generator = DrawGenerator::seeded(42);
        for _ in 0..10_000 {
            let draw = generator.sample();
            let numbers = draw.numbers();
            assert!(numbers.iter().all(|&n| (1..=60).contains(&n)));
            assert!(numbers.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn test_seeded_is_reproducible() {
        let a = DrawGenerator::seeded(7).sample_batch(50);
        let b = DrawGenerator::seeded(7).sample_batch(50);
        assert_eq!(a, b);
    }

    #[test]
    fn test_uniformity() {
        let n = 100_000usize;
        let mut counts = [0usize; 61];
        let mut generator = DrawGenerator::seeded(2024);
        for draw in generator.sample_batch(n) {
            for &b in draw.numbers() {
                counts[b as usize] += 1;
            }
        }
        // Expected 10_000 per number, sigma is about 95.
        let expected = (n * 6 / 60) as f64;
        for (number, &c) in counts.iter().enumerate().skip(1) {
            let deviation = (c as f64 - expected).abs() / expected;
            assert!(deviation < 0.05, "numéro {} : {} tirages", number, c);
        }
    }
}
