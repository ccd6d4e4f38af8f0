//! Highlight engine error types

use thiserror::Error;

use crate::model::Side;

#[derive(Error, Debug)]
pub enum HighlightError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid FEN for move {move_number} ({side:?})")]
    InvalidFen { move_number: u32, side: Side },

    #[error("Invalid evaluation: {0}")]
    InvalidEvaluation(String),

    #[error("Invalid move notation: {0}")]
    InvalidNotation(String),

    #[error("Missing data: {0}")]
    MissingData(&'static str),
}
