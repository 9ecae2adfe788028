// src/exam/shuffle.rs

const MULTIPLIER: i64 = 9301;
const INCREMENT: i64 = 49297;
const MODULUS: i64 = 233280;

/// Linear congruential generator yielding values in [0, 1).
///
/// The state is kept reduced modulo `MODULUS`, so any `i64` seed (zero and
/// negatives included) produces the same sequence as the unreduced recurrence
/// does for non-negative seeds.
#[derive(Debug, Clone)]
pub struct SeededRandom {
    state: i64,
}

impl SeededRandom {
    pub fn new(seed: i64) -> Self {
        Self {
            state: seed.rem_euclid(MODULUS),
        }
    }

    pub fn next_f64(&mut self) -> f64 {
        self.state = (self.state * MULTIPLIER + INCREMENT).rem_euclid(MODULUS);
        self.state as f64 / MODULUS as f64
    }
}

/// Deterministic Fisher-Yates permutation of `items` driven by `seed`.
pub fn seeded_shuffle<T: Clone>(items: &[T], seed: i64) -> Vec<T> {
    let mut shuffled = items.to_vec();
    let mut random = SeededRandom::new(seed);

    for i in (1..shuffled.len()).rev() {
        let j = (random.next_f64() * (i + 1) as f64).floor() as usize;
        shuffled.swap(i, j);
    }

    shuffled
}
