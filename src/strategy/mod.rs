//! Screener-driven selection.
//!
//! Contains the core logic for:
//! - Parsing screener rows into typed records
//! - Bracket selection and mood-scaled allocation sizing
//! - Candidate acceptance (held, minimum, dedup)
//! - Order intent construction and submission

mod allocator;
mod brackets;
mod engine;
mod executor;
mod filter;
mod intent;
mod parser;

pub use allocator::{Allocation, AllocationCalculator, MultiplierTable, Side};
pub use brackets::{BracketSelector, BracketTable};
pub use engine::{RejectedSide, SelectionEngine, SelectionReport, SkippedRow};
pub use executor::{OrderExecutor, SubmissionResult};
pub use filter::{AccountState, Candidate, PositionFilter, RejectReason};
pub use intent::{OrderIntent, OrderIntentBuilder};
pub use parser::{parse_cell_number, RowParser, ScreenerRow, SkipReason};
