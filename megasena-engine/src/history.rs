use megasena_db::models::{Draw, HistoricalDataset};

/// Read-only view over past draws, as supplied by whatever loaded them.
pub trait DrawSource {
    /// Every valid draw with its contest id.
    fn draws(&self) -> impl Iterator<Item = (u32, &Draw)>;

    fn date_of(&self, contest: u32) -> Option<&str>;

    fn draw_count(&self) -> usize;
}

impl DrawSource for HistoricalDataset {
    fn draws(&self) -> impl Iterator<Item = (u32, &Draw)> {
        self.contests().map(|c| (c.id, &c.draw))
    }

    fn date_of(&self, contest: u32) -> Option<&str> {
        self.get(contest).and_then(|c| c.date.as_deref())
    }

    fn draw_count(&self) -> usize {
        self.len()
    }
}
