mod deck;
pub mod document;
mod folder;
mod question;
mod quiz;
mod snapshot;

pub use deck::{Deck, DeckError, DeckStats};
pub use document::{DocumentError, QuestionDocument, SnapshotDocument, SNAPSHOT_VERSION};
pub use folder::Folder;
pub use question::{AnswerOption, Question, QuestionError};
pub use quiz::{ParseModeError, QuizMode, SessionResult, Tier};
pub use snapshot::{OverallStats, Settings, Snapshot, SnapshotError, UNCATEGORIZED};
