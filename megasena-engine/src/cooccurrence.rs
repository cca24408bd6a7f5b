use std::collections::{BTreeMap, HashMap};

use megasena_db::models::{format_key, POOL_SIZE};

use crate::frequency::FrequencyAggregator;
use crate::history::DrawSource;

/// Pool cap bounding enumeration to at most C(6,k) subsets per draw.
pub const DEFAULT_POOL_CAP: usize = 16;
pub const MIN_COMBO: usize = 2;
pub const MAX_COMBO: usize = 6;

/// All k-subsets of `items`, in lexicographic order of positions.
pub fn k_combinations<T: Copy>(items: &[T], k: usize) -> Vec<Vec<T>> {
    let n = items.len();
    let mut result = Vec::new();
    if k == 0 || k > n {
        return result;
    }

    let mut idx: Vec<usize> = (0..k).collect();
    loop {
        result.push(idx.iter().map(|&i| items[i]).collect());

        let mut i = k;
        while i > 0 && idx[i - 1] == n - k + (i - 1) {
            i -= 1;
        }
        if i == 0 {
            break;
        }
        idx[i - 1] += 1;
        for j in i..k {
            idx[j] = idx[j - 1] + 1;
        }
    }
    result
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComboCount {
    pub combo: Vec<u8>,
    pub count: u32,
    pub percent_of_total: f64,
}

impl ComboCount {
    pub fn key(&self) -> String {
        format_key(&self.combo)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoOccurrenceReport {
    /// Numbers that actually took part in the enumeration.
    pub pool: Vec<u8>,
    /// Set when the caller asked for more numbers than the cap allows.
    pub truncated: bool,
    pub total_draws: usize,
    by_k: BTreeMap<usize, Vec<ComboCount>>,
}

impl CoOccurrenceReport {
    /// Ranked combos of size `k`; empty when history is too short or `k` is out of range.
    pub fn combos(&self, k: usize) -> &[ComboCount] {
        self.by_k.get(&k).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn top(&self, k: usize, n: usize) -> &[ComboCount] {
        let combos = self.combos(k);
        &combos[..n.min(combos.len())]
    }

    pub fn sizes(&self) -> impl Iterator<Item = usize> + '_ {
        self.by_k.keys().copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoOccurrenceAnalyzer {
    pool_cap: usize,
    min_k: usize,
    max_k: usize,
}

impl Default for CoOccurrenceAnalyzer {
    fn default() -> Self {
        Self {
            pool_cap: DEFAULT_POOL_CAP,
            min_k: MIN_COMBO,
            max_k: MAX_COMBO,
        }
    }
}

impl CoOccurrenceAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pool_cap(mut self, cap: usize) -> Self {
        self.pool_cap = cap.clamp(MIN_COMBO, POOL_SIZE as usize);
        self
    }

    pub fn with_k_range(mut self, min_k: usize, max_k: usize) -> Self {
        self.min_k = min_k.clamp(MIN_COMBO, MAX_COMBO);
        self.max_k = max_k.clamp(self.min_k, MAX_COMBO);
        self
    }

    pub fn pool_cap(&self) -> usize {
        self.pool_cap
    }

    /// Counts every k-subset of the pool that appears inside a draw.
    ///
    /// `ranked_pool` lists numbers by descending frequency; only its first `pool_cap`
    /// entries are used.
    pub fn analyze(&self, source: &impl DrawSource, ranked_pool: &[u8]) -> CoOccurrenceReport {
        let pool: Vec<u8> = ranked_pool.iter().copied().take(self.pool_cap).collect();
        let truncated = ranked_pool.len() > self.pool_cap;

        let mut in_pool = [false; POOL_SIZE as usize + 1];
        for &n in &pool {
            if let Some(slot) = in_pool.get_mut(n as usize) {
                *slot = n != 0;
            }
        }

        // Slot `i` holds the combos of size `min_k + i`.
        let mut counts: Vec<HashMap<Vec<u8>, u32>> =
            vec![HashMap::new(); self.max_k - self.min_k + 1];

        for (_, draw) in source.draws() {
            let inter: Vec<u8> = draw
                .numbers()
                .iter()
                .copied()
                .filter(|&n| in_pool[n as usize])
                .collect();
            for (k, by_combo) in (self.min_k..=inter.len()).zip(counts.iter_mut()) {
                for combo in k_combinations(&inter, k) {
                    *by_combo.entry(combo).or_insert(0) += 1;
                }
            }
        }

        let total_draws = source.draw_count();
        let by_k = (self.min_k..)
            .zip(counts)
            .map(|(k, by_combo)| {
                let mut ranked: Vec<ComboCount> = by_combo
                    .into_iter()
                    .map(|(combo, count)| ComboCount {
                        combo,
                        count,
                        percent_of_total: if total_draws == 0 {
                            0.0
                        } else {
                            100.0 * f64::from(count) / total_draws as f64
                        },
                    })
                    .collect();
                ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.combo.cmp(&b.combo)));
                (k, ranked)
            })
            .collect();

        log::debug!(
            "Co-occurrences : {} tirages, pool {:?}{}",
            total_draws,
            pool,
            if truncated { " (tronqué)" } else { "" }
        );

        CoOccurrenceReport {
            pool,
            truncated,
            total_draws,
            by_k,
        }
    }

    /// Ranks the history by frequency, keeps the `top_n` first numbers (1..=60) and analyzes them.
    pub fn analyze_top(&self, source: &impl DrawSource, top_n: usize) -> CoOccurrenceReport {
        let frequencies = FrequencyAggregator::from_source(source);
        let ranked = frequencies.ranked_numbers(top_n.clamp(1, POOL_SIZE as usize));
        self.analyze(source, &ranked)
    }
}
