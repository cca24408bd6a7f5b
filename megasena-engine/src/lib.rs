pub mod cooccurrence;
pub mod frequency;
pub mod generator;
pub mod history;
pub mod odds;
pub mod query;
pub mod scheduler;

pub use cooccurrence::{CoOccurrenceAnalyzer, CoOccurrenceReport, ComboCount};
pub use frequency::{FrequencyAggregator, FrequencyTable, NumberFrequency};
pub use generator::DrawGenerator;
pub use history::DrawSource;
pub use query::{CandidateSet, QueryError, QueryHit, QueryResult};
pub use scheduler::{RunMode, Scheduler, Simulation, SimulationConfig, SimulationState};
