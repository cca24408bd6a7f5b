use thiserror::Error;

use megasena_db::models::{format_key, POOL_SIZE};

use crate::history::DrawSource;

pub const MIN_QUERY: usize = 2;
pub const MAX_QUERY: usize = 6;
pub const UNKNOWN_DATE: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("« {0} » n'est pas un nombre")]
    NotANumber(String),
    #[error("Indiquez entre 2 et 6 numéros distincts entre 1 et 60 ({0} retenu(s))")]
    TooFew(usize),
    #[error("Indiquez entre 2 et 6 numéros distincts entre 1 et 60 ({0} retenus)")]
    TooMany(usize),
}

/// 2 to 6 distinct numbers in 1..=60, ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateSet {
    numbers: Vec<u8>,
}

impl CandidateSet {
    /// Parses raw inputs. Blank entries are skipped, out-of-range values and duplicates dropped.
    pub fn parse<S: AsRef<str>>(inputs: &[S]) -> Result<Self, QueryError> {
        let mut values = Vec::with_capacity(inputs.len());
        for input in inputs {
            let token = input.as_ref().trim();
            if token.is_empty() {
                continue;
            }
            let value = token
                .parse::<i64>()
                .map_err(|_| QueryError::NotANumber(token.to_string()))?;
            values.push(value);
        }
        Self::from_numbers(&values)
    }

    pub fn from_numbers(values: &[i64]) -> Result<Self, QueryError> {
        let mut numbers: Vec<u8> = values
            .iter()
            .filter(|&&v| (1..=i64::from(POOL_SIZE)).contains(&v))
            .map(|&v| v as u8)
            .collect();
        numbers.sort_unstable();
        numbers.dedup();

        match numbers.len() {
            n if n < MIN_QUERY => Err(QueryError::TooFew(n)),
            n if n > MAX_QUERY => Err(QueryError::TooMany(n)),
            _ => Ok(Self { numbers }),
        }
    }

    pub fn numbers(&self) -> &[u8] {
        &self.numbers
    }

    pub fn key(&self) -> String {
        format_key(&self.numbers)
    }
}

/// Splits pasted text such as `"04, 08 15-16"` on anything that is not a digit (first 6 kept).
pub fn split_pasted(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_ascii_digit())
        .filter(|s| !s.is_empty())
        .take(MAX_QUERY)
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryHit {
    pub contest: u32,
    pub date: Option<String>,
}

impl QueryHit {
    pub fn date_label(&self) -> &str {
        self.date.as_deref().unwrap_or(UNKNOWN_DATE)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResult {
    pub key: String,
    pub hits: Vec<QueryHit>,
}

impl QueryResult {
    /// The set was looked up but never came out together.
    pub fn never_occurred(&self) -> bool {
        self.hits.is_empty()
    }
}

/// Every contest whose draw contains the whole candidate set, by ascending contest id.
pub fn query(source: &impl DrawSource, candidate: &CandidateSet) -> QueryResult {
    let mut hits: Vec<QueryHit> = source
        .draws()
        .filter(|(_, draw)| draw.contains_all(candidate.numbers()))
        .map(|(contest, _)| QueryHit {
            contest,
            date: source.date_of(contest).map(str::to_string),
        })
        .collect();
    hits.sort_by_key(|h| h.contest);

    log::debug!("Requête {} : {} occurrence(s)", candidate.key(), hits.len());
    QueryResult {
        key: candidate.key(),
        hits,
    }
}

/// Validates raw inputs, then runs the query. Nothing is scanned when validation fails.
pub fn query_inputs<S: AsRef<str>>(
    source: &impl DrawSource,
    inputs: &[S],
) -> Result<QueryResult, QueryError> {
    let candidate = CandidateSet::parse(inputs)?;
    Ok(query(source, &candidate))
}
