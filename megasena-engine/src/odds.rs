use megasena_db::models::{PICK_COUNT, POOL_SIZE};

pub const MIN_BET: u8 = 6;
pub const MAX_BET: u8 = 20;
pub const DEFAULT_UNIT_PRICE: f64 = 5.0;

/// Exact C(n, k). Every value used here fits comfortably in a u64.
pub fn binomial(n: u64, k: u64) -> u64 {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    (0..k).fold(1u64, |acc, i| acc * (n - i) / (i + 1))
}

#[derive(Debug, Clone, PartialEq)]
pub struct BetOdds {
    pub numbers: u8,
    /// Six-number games covered by the bet.
    pub games: u64,
    /// Jackpot odds, "1 in `one_in`".
    pub one_in: u64,
    pub price: f64,
}

pub fn bet_odds(numbers: u8, unit_price: f64) -> BetOdds {
    let total = binomial(u64::from(POOL_SIZE), PICK_COUNT as u64);
    let games = binomial(u64::from(numbers), PICK_COUNT as u64);
    let one_in = if games == 0 {
        0
    } else {
        (total as f64 / games as f64).round() as u64
    };
    BetOdds {
        numbers,
        games,
        one_in,
        price: unit_price * games as f64,
    }
}

/// Odds and price for every bet size from 6 to 20 numbers.
pub fn bet_table(unit_price: f64) -> Vec<BetOdds> {
    (MIN_BET..=MAX_BET).map(|n| bet_odds(n, unit_price)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binomial() {
        assert_eq!(binomial(60, 6), 50_063_860);
        assert_eq!(binomial(6, 6), 1);
        assert_eq!(binomial(20, 6), 38_760);
        assert_eq!(binomial(5, 6), 0);
    }

    #[test]
    fn test_bet_table() {
        let table = bet_table(DEFAULT_UNIT_PRICE);
        assert_eq!(table.len(), 15);
        assert_eq!(table[0].one_in, 50_063_860);
        assert_eq!(table[1].one_in, 7_151_980);
        assert_eq!(table[2].one_in, 1_787_995);
        assert_eq!(table[3].one_in, 595_998);
        assert_eq!(table[14].one_in, 1_292);
        assert!((table[1].price - 35.0).abs() < 1e-9);
        assert!((table[14].price - 193_800.0).abs() < 1e-9);
    }
}
