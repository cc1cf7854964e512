//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::model::{DeckError, DocumentError, QuestionError};

/// Errors emitted while parsing a user-supplied import file.
///
/// All of these are reported to the user and discarded; an import can never
/// damage the live snapshot.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ImportError {
    #[error("import file does not contain a question list")]
    MissingQuestions,

    #[error("invalid import payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    #[error(transparent)]
    Question(#[from] QuestionError),

    #[error(transparent)]
    Deck(#[from] DeckError),

    #[error(transparent)]
    Document(#[from] DocumentError),
}
