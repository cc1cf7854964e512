#![forbid(unsafe_code)]

pub mod error;
pub mod import_service;
pub mod quiz_session;
pub mod sync_service;

pub use quiz_core::Clock;

pub use error::ImportError;
pub use import_service::{DeckImport, ImportPayload, deck_name_from_file, parse_import};
pub use quiz_session::{AnswerFeedback, QuizPhase, QuizSession, RecordedAnswer};
pub use sync_service::{PollOutcome, SyncService, SyncStatus};
