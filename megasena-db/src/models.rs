use std::collections::BTreeMap;

use anyhow::{bail, Result};

pub const POOL_SIZE: u8 = 60;
pub const PICK_COUNT: usize = 6;

/// Six distinct numbers in 1..=60, always stored in ascending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Draw([u8; PICK_COUNT]);

impl Draw {
    pub fn new(numbers: &[u8]) -> Result<Draw> {
        if numbers.len() != PICK_COUNT {
            bail!(
                "Un tirage contient exactement {} numéros ({} reçus)",
                PICK_COUNT,
                numbers.len()
            );
        }
        let mut balls = [0u8; PICK_COUNT];
        balls.copy_from_slice(numbers);
        validate_numbers(&balls)?;
        balls.sort_unstable();
        Ok(Draw(balls))
    }

    /// Lenient constructor for provider data: anything that is not a valid draw is `None`.
    pub fn from_raw(raw: &[i64]) -> Option<Draw> {
        if raw.len() != PICK_COUNT {
            return None;
        }
        let numbers: Vec<u8> = raw
            .iter()
            .map(|&n| u8::try_from(n).ok())
            .collect::<Option<_>>()?;
        Draw::new(&numbers).ok()
    }

    /// For callers that already guarantee distinct numbers in range (e.g. the generator).
    pub fn from_distinct(mut balls: [u8; PICK_COUNT]) -> Draw {
        debug_assert!(validate_numbers(&balls).is_ok());
        balls.sort_unstable();
        Draw(balls)
    }

    pub fn numbers(&self) -> &[u8; PICK_COUNT] {
        &self.0
    }

    pub fn contains(&self, number: u8) -> bool {
        self.0.binary_search(&number).is_ok()
    }

    pub fn contains_all(&self, numbers: &[u8]) -> bool {
        numbers.iter().all(|&n| self.contains(n))
    }
}

impl std::fmt::Display for Draw {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&format_key(&self.0))
    }
}

/// Canonical zero-padded key, e.g. `[4, 15, 16]` -> `"04-15-16"`.
pub fn format_key(numbers: &[u8]) -> String {
    numbers
        .iter()
        .map(|n| format!("{:02}", n))
        .collect::<Vec<_>>()
        .join("-")
}

pub fn validate_numbers(numbers: &[u8]) -> Result<()> {
    for &n in numbers {
        if n < 1 || n > POOL_SIZE {
            bail!("Numéro {} hors limites (1-{})", n, POOL_SIZE);
        }
    }
    for i in 0..numbers.len() {
        for j in (i + 1)..numbers.len() {
            if numbers[i] == numbers[j] {
                bail!("Numéro en double : {}", numbers[i]);
            }
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrizeTier {
    pub tier: String,
    pub winners: Option<u32>,
    pub prize: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Contest {
    pub id: u32,
    pub date: Option<String>,
    pub draw: Draw,
    pub prizes: Vec<PrizeTier>,
}

impl Contest {
    pub fn new(id: u32, draw: Draw) -> Self {
        Self {
            id,
            date: None,
            draw,
            prizes: Vec::new(),
        }
    }
}

/// In-memory history of past contests, keyed by contest id.
///
/// Malformed draws never make it in: they are only counted in `rejected`.
#[derive(Debug, Clone, Default)]
pub struct HistoricalDataset {
    contests: BTreeMap<u32, Contest>,
    rejected: usize,
}

impl HistoricalDataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a dataset from raw `(contest, numbers)` pairs, skipping malformed draws.
    pub fn from_raw<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (u32, Vec<i64>)>,
    {
        let mut dataset = Self::new();
        for (id, raw) in entries {
            dataset.insert_raw(id, &raw);
        }
        dataset
    }

    /// Returns false (and counts a rejection) when `raw` is not a valid draw.
    pub fn insert_raw(&mut self, id: u32, raw: &[i64]) -> bool {
        match Draw::from_raw(raw) {
            Some(draw) => {
                self.insert(Contest::new(id, draw));
                true
            }
            None => {
                self.rejected += 1;
                false
            }
        }
    }

    pub fn insert(&mut self, contest: Contest) {
        self.contests.insert(contest.id, contest);
    }

    pub fn mark_rejected(&mut self) {
        self.rejected += 1;
    }

    pub fn set_date(&mut self, id: u32, date: impl Into<String>) -> bool {
        match self.contests.get_mut(&id) {
            Some(contest) => {
                contest.date = Some(date.into());
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: u32) -> Option<&Contest> {
        self.contests.get(&id)
    }

    pub fn latest(&self) -> Option<&Contest> {
        self.contests.values().next_back()
    }

    /// Contests in ascending id order.
    pub fn contests(&self) -> impl DoubleEndedIterator<Item = &Contest> {
        self.contests.values()
    }

    pub fn len(&self) -> usize {
        self.contests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contests.is_empty()
    }

    pub fn rejected(&self) -> usize {
        self.rejected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draw_sorted() {
        let draw = Draw::new(&[60, 4, 33, 1, 15, 16]).unwrap();
        assert_eq!(draw.numbers(), &[1, 4, 15, 16, 33, 60]);
    }

    #[test]
    fn test_draw_out_of_range() {
        assert!(Draw::new(&[0, 2, 3, 4, 5, 6]).is_err());
        assert!(Draw::new(&[1, 2, 3, 4, 5, 61]).is_err());
    }

    #[test]
    fn test_draw_duplicate() {
        assert!(Draw::new(&[1, 1, 3, 4, 5, 6]).is_err());
    }

    #[test]
    fn test_draw_wrong_length() {
        assert!(Draw::new(&[1, 2, 3, 4, 5]).is_err());
        assert!(Draw::new(&[1, 2, 3, 4, 5, 6, 7]).is_err());
    }

    #[test]
    fn test_draw_from_raw() {
        assert!(Draw::from_raw(&[1, 2, 3, 4, 5, 6]).is_some());
        assert!(Draw::from_raw(&[-1, 2, 3, 4, 5, 6]).is_none());
        assert!(Draw::from_raw(&[300, 2, 3, 4, 5, 6]).is_none());
        assert!(Draw::from_raw(&[1, 2, 3]).is_none());
    }

    #[test]
    fn test_draw_display() {
        let draw = Draw::new(&[55, 1, 6, 10, 12, 14]).unwrap();
        assert_eq!(draw.to_string(), "01-06-10-12-14-55");
        assert_eq!(format_key(&[4, 15]), "04-15");
    }

    #[test]
    fn test_draw_contains_all() {
        let draw = Draw::new(&[1, 6, 10, 12, 14, 55]).unwrap();
        assert!(draw.contains_all(&[1, 6, 55]));
        assert!(!draw.contains_all(&[1, 4]));
    }

    #[test]
    fn test_dataset_rejects_malformed() {
        let dataset = HistoricalDataset::from_raw(vec![
            (1, vec![1, 2, 3, 4, 5, 6]),
            (2, vec![1, 2, 3, 4, 5]),
            (3, vec![1, 1, 3, 4, 5, 6]),
            (4, vec![10, 20, 30, 40, 50, 60]),
        ]);
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.rejected(), 2);
        assert_eq!(dataset.latest().unwrap().id, 4);
    }

    #[test]
    fn test_dataset_set_date() {
        let mut dataset = HistoricalDataset::from_raw(vec![(7, vec![1, 2, 3, 4, 5, 6])]);
        assert!(dataset.set_date(7, "1996-03-11"));
        assert!(!dataset.set_date(8, "1996-03-18"));
        assert_eq!(dataset.get(7).unwrap().date.as_deref(), Some("1996-03-11"));
    }
}
