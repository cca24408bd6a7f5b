use megasena_db::models::{Draw, PICK_COUNT, POOL_SIZE};

use crate::history::DrawSource;

const SLOTS: usize = POOL_SIZE as usize + 1;

/// Per-number counts for 1..=60. Slot 0 is never used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrequencyTable {
    counts: [u64; SLOTS],
}

impl Default for FrequencyTable {
    fn default() -> Self {
        Self { counts: [0; SLOTS] }
    }
}

impl FrequencyTable {
    pub fn count(&self, number: u8) -> u64 {
        if number == 0 {
            return 0;
        }
        self.counts.get(number as usize).copied().unwrap_or(0)
    }

    pub fn sum(&self) -> u64 {
        self.counts[1..].iter().sum()
    }

    pub fn max(&self) -> u64 {
        self.counts[1..].iter().copied().max().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u8, u64)> + '_ {
        (1..=POOL_SIZE).map(move |n| (n, self.counts[n as usize]))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumberFrequency {
    pub number: u8,
    pub count: u64,
}

/// Running frequency table plus the number of draws folded into it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrequencyAggregator {
    table: FrequencyTable,
    draws: u64,
}

impl FrequencyAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_source(source: &impl DrawSource) -> Self {
        let mut aggregator = Self::new();
        let draws: Vec<Draw> = source.draws().map(|(_, d)| *d).collect();
        aggregator.ingest(&draws);
        aggregator
    }

    /// Applies a whole batch at once: the table moves from one consistent total to the next.
    pub fn ingest(&mut self, draws: &[Draw]) {
        let mut delta = [0u64; SLOTS];
        for draw in draws {
            for &n in draw.numbers() {
                delta[n as usize] += 1;
            }
        }
        for (count, d) in self.table.counts.iter_mut().zip(delta) {
            *count += d;
        }
        self.draws += draws.len() as u64;
    }

    pub fn table(&self) -> &FrequencyTable {
        &self.table
    }

    pub fn count(&self, number: u8) -> u64 {
        self.table.count(number)
    }

    pub fn sum(&self) -> u64 {
        self.table.sum()
    }

    pub fn draws_ingested(&self) -> u64 {
        self.draws
    }

    pub fn is_consistent(&self) -> bool {
        self.sum() == PICK_COUNT as u64 * self.draws
    }

    /// The k most frequent numbers, ties broken by the smaller number first.
    pub fn top_k(&self, k: usize) -> Vec<NumberFrequency> {
        let mut ranking: Vec<NumberFrequency> = self
            .table
            .iter()
            .map(|(number, count)| NumberFrequency { number, count })
            .collect();
        ranking.sort_by(|a, b| b.count.cmp(&a.count).then(a.number.cmp(&b.number)));
        ranking.truncate(k);
        ranking
    }

    pub fn ranked_numbers(&self, k: usize) -> Vec<u8> {
        self.top_k(k).into_iter().map(|f| f.number).collect()
    }

    /// Bar width in percent relative to the most frequent number.
    pub fn relative_width(&self, count: u64) -> f64 {
        let max = self.table.max();
        if max == 0 {
            return 0.0;
        }
        (count as f64 / max as f64 * 100.0).clamp(0.0, 100.0)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
