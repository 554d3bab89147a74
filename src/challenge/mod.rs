//! Friend challenge ingestion
//!
//! This module turns the results page of a friend challenge into a typed
//! [`MatchReport`](crate::types::MatchReport): matchlink validation and fetching,
//! markup tokenizing, and the context state machine that extracts boards.

pub mod markup;
pub mod parser;
pub mod source;

// Re-export commonly used types
pub use markup::{MarkupEvent, MarkupTokenizer};
pub use parser::{parse_challenge, ChallengeParser, ColumnRole, BOARD_COLUMNS};
pub use source::{validate_source_url, ChallengeSource, HttpPageFetcher, PageFetcher};
