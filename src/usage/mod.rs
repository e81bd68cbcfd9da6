pub mod accumulator;
pub mod correlator;
pub mod dedup;
pub mod lenient;
mod types;

pub use accumulator::{AssistantTurn, DeltaAccumulator, TurnCharge, UsageReport};
pub use correlator::EventCorrelator;
pub use dedup::DedupGate;
pub use types::{AggregateStats, SessionStats, TokenCounts, ALL_SCOPE};
