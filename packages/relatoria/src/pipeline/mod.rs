//! Search pipeline - the core of the library.
//!
//! The pipeline orchestrates:
//! - Strategy attempts in fixed priority order, with fallback
//! - Request spacing toward the target site
//! - Ruling extraction from markup or structured payloads
//! - Grouping and deduplication into the final result

pub mod assemble;
pub mod extract;
pub mod markup;
pub mod orchestrator;
pub mod throttle;

pub use assemble::ResultAssembler;
pub use extract::PatternExtractor;
pub use orchestrator::{AttemptRecord, ChainRun, ChainState, StrategyChain};
pub use throttle::Throttle;
