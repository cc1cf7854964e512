//! Classification and validation of user-supplied import files.
//!
//! Two file shapes are accepted: a full backup (recognized by a top-level
//! `folders` object) and a single deck (`{questions: [...], folder?}`).
//! Everything is validated before anything touches the live snapshot.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use quiz_core::model::{Deck, DeckError, Question, QuestionDocument, Snapshot, SnapshotDocument, UNCATEGORIZED};

use crate::error::ImportError;

/// A validated single-deck import, not yet named or placed.
#[derive(Debug, Clone)]
pub struct DeckImport {
    questions: Vec<Question>,
    folder: Option<String>,
}

impl DeckImport {
    /// Target folder, defaulting to the protected catch-all.
    #[must_use]
    pub fn folder(&self) -> &str {
        self.folder.as_deref().unwrap_or(UNCATEGORIZED)
    }

    #[must_use]
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    /// Builds the deck under its user-facing name with zeroed counters.
    ///
    /// # Errors
    ///
    /// Returns `DeckError::EmptyName` when the name is blank.
    pub fn into_deck(self, name: &str, now: DateTime<Utc>) -> Result<Deck, DeckError> {
        Deck::new(name, self.questions, now)
    }
}

/// What an import file turned out to contain.
#[derive(Debug, Clone)]
pub enum ImportPayload {
    /// A full backup snapshot, to be merged additively.
    Backup(Box<Snapshot>),
    /// A single deck's questions.
    Deck(DeckImport),
}

#[derive(Deserialize)]
struct DeckFile {
    questions: Vec<QuestionDocument>,
    #[serde(default)]
    folder: Option<String>,
}

/// Parses and validates raw import JSON.
///
/// # Errors
///
/// Returns `ImportError` when the payload is not JSON, is neither shape, or
/// any contained question or deck fails validation.
pub fn parse_import(json: &str) -> Result<ImportPayload, ImportError> {
    let value: serde_json::Value = serde_json::from_str(json)?;

    if value.get("folders").is_some() {
        let doc: SnapshotDocument = serde_json::from_value(value)?;
        return Ok(ImportPayload::Backup(Box::new(doc.into_snapshot()?)));
    }

    if !value.get("questions").is_some_and(serde_json::Value::is_array) {
        return Err(ImportError::MissingQuestions);
    }
    let file: DeckFile = serde_json::from_value(value)?;
    let mut questions = Vec::with_capacity(file.questions.len());
    for question in file.questions {
        questions.push(question.into_question()?);
    }
    let folder = file
        .folder
        .filter(|name| !name.trim().is_empty())
        .map(|name| name.trim().to_owned());

    Ok(ImportPayload::Deck(DeckImport { questions, folder }))
}

/// Derives a deck name from an import file name: the `.json` suffix is
/// stripped and underscores become spaces.
#[must_use]
pub fn deck_name_from_file(file_name: &str) -> String {
    let stem = file_name.strip_suffix(".json").unwrap_or(file_name);
    stem.replace('_', " ")
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
