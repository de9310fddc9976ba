//! Option-chain message parsing.
//!
//! Turns one decoded market-data message into normalized option contracts
//! plus an optional underlying spot reading. Per-entry noise is dropped;
//! only a structurally unusable message is an error.

pub mod error;
pub mod fields;
pub mod parser;

pub use error::{FeedError, FeedResult};
pub use parser::{ContractParser, DropReason, EntryOutcome, ParseStats, ParsedMessage};
