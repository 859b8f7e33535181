//! Error types for position handling and search.

use thiserror::Error;

/// Errors reported by the position model, move generator and search.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChessError {
    /// The move is not in the legal-move set of the position it was applied to.
    #[error("illegal move: {mv}")]
    IllegalMove { mv: String },

    /// A search was started on a position where the side to move has no moves.
    #[error("no legal moves in this position")]
    NoLegalMoves,

    /// Malformed depth or time budget.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid FEN: {0}")]
    InvalidFen(String),

    #[error("invalid move notation: {0}")]
    InvalidMoveNotation(String),

    /// Internal state was found inconsistent, e.g. an unbalanced make/unmake.
    #[error("internal invariant violated: {0}")]
    InvariantViolation(String),
}

pub type Result<T> = std::result::Result<T, ChessError>;
