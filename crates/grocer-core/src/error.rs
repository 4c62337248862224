//! # Error Types
//!
//! Domain-specific error types for grocer-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  grocer-core errors (this file)                                        │
//! │  └── RankError    - Malformed rank strings, unordered bounds           │
//! │                                                                         │
//! │  grocer-sync errors (separate crate)                                   │
//! │  └── SyncError    - Transport, config, protocol failures               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Most store operations never fail: an unknown id is a no-op and a missing
//! rank is repaired. The errors here are for callers that parse ranks
//! themselves or ask for a rank between two bounds.

use thiserror::Error;

// =============================================================================
// Rank Error
// =============================================================================

/// Errors produced when parsing or combining ranks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RankError {
    /// Rank string is empty.
    #[error("rank must not be empty")]
    Empty,

    /// Rank contains a character outside `0-9a-z`.
    #[error("rank '{rank}' contains invalid digit '{ch}'")]
    InvalidDigit { rank: String, ch: char },

    /// Rank ends in `0`.
    ///
    /// `"a0"` and `"a"` denote the same fraction but compare differently as
    /// strings, so trailing zeros are rejected outright.
    #[error("rank '{0}' must not end in '0'")]
    TrailingZero(String),

    /// `between(lower, upper)` was called with `lower >= upper`.
    #[error("no rank exists between '{lower}' and '{upper}'")]
    NotOrdered { lower: String, upper: String },
}
