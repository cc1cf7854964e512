//! The canonical snapshot document.
//!
//! One wire shape is used everywhere: local cache, remote store, and
//! export/backup files. Documents are decoded into these permissive types
//! first, then validated into domain values in one explicit step, so missing
//! fields default deterministically and malformed payloads are rejected
//! rather than half-applied.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{
    AnswerOption, Deck, DeckError, DeckStats, Folder, Question, QuestionError, Settings, Snapshot,
};

/// Schema tag written into every produced document.
pub const SNAPSHOT_VERSION: &str = "1.0";

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DocumentError {
    #[error("unsupported document version: {0}")]
    UnsupportedVersion(String),

    #[error(transparent)]
    Question(#[from] QuestionError),

    #[error(transparent)]
    Deck(#[from] DeckError),
}

//
// ─── DOCUMENT TYPES ────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotDocument {
    #[serde(default)]
    pub folders: BTreeMap<String, FolderDocument>,
    #[serde(default)]
    pub expanded_folders: Vec<String>,
    #[serde(default)]
    pub settings: SettingsDocument,
    #[serde(default, alias = "exportDate", skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FolderDocument {
    #[serde(default)]
    pub decks: Vec<DeckDocument>,
    #[serde(default)]
    pub subfolders: BTreeMap<String, FolderDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckDocument {
    pub name: String,
    #[serde(default)]
    pub questions: Vec<QuestionDocument>,
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub correct: u32,
    #[serde(default)]
    pub incorrect: u32,
    #[serde(default)]
    pub attempted: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imported_at: Option<DateTime<Utc>>,
}

/// Wire shape of a question: `{question, options: {key: text}, correct_answer,
/// explanation?}`. Option order in the JSON object is display order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionDocument {
    pub question: String,
    #[serde(default, with = "option_map")]
    pub options: Vec<(String, String)>,
    pub correct_answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsDocument {
    #[serde(default = "default_font_scale")]
    pub font_scale: f32,
}

impl Default for SettingsDocument {
    fn default() -> Self {
        Self { font_scale: 1.0 }
    }
}

fn default_font_scale() -> f32 {
    1.0
}

/// Serde adapter keeping option order while using a JSON object on the wire.
mod option_map {
    use std::fmt;

    use serde::de::{MapAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        options: &[(String, String)],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(options.len()))?;
        for (key, text) in options {
            map.serialize_entry(key, text)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<(String, String)>, D::Error> {
        struct OptionMapVisitor;

        impl<'de> Visitor<'de> for OptionMapVisitor {
            type Value = Vec<(String, String)>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of option key to option text")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some(entry) = access.next_entry::<String, String>()? {
                    entries.push(entry);
                }
                Ok(entries)
            }
        }

        deserializer.deserialize_map(OptionMapVisitor)
    }
}

//
// ─── DOCUMENT → DOMAIN ─────────────────────────────────────────────────────────
//

impl SnapshotDocument {
    /// Validates the document into a domain snapshot.
    ///
    /// Documents carrying an unrecognized version tag are rejected; a missing
    /// tag is accepted for documents written before tagging existed.
    ///
    /// # Errors
    ///
    /// Returns `DocumentError` on an unsupported version or any question or
    /// deck failing validation.
    pub fn into_snapshot(self) -> Result<Snapshot, DocumentError> {
        match self.version.as_deref() {
            None | Some(SNAPSHOT_VERSION) => {}
            Some(other) => return Err(DocumentError::UnsupportedVersion(other.to_owned())),
        }

        let mut folders = BTreeMap::new();
        for (name, folder) in self.folders {
            folders.insert(name, folder.into_folder()?);
        }
        let expanded: BTreeSet<String> = self.expanded_folders.into_iter().collect();

        let mut settings = Settings::default();
        settings.set_font_scale(self.settings.font_scale);

        Ok(Snapshot::from_parts(
            folders,
            expanded,
            settings,
            self.last_updated,
        ))
    }
}

impl FolderDocument {
    fn into_folder(self) -> Result<Folder, DocumentError> {
        let mut decks: Vec<Deck> = Vec::with_capacity(self.decks.len());
        for deck in self.decks {
            let deck = deck.into_deck()?;
            // First occurrence wins when a document carries duplicate names.
            if decks.iter().all(|d| d.name() != deck.name()) {
                decks.push(deck);
            }
        }
        let mut subfolders = BTreeMap::new();
        for (name, folder) in self.subfolders {
            subfolders.insert(name, folder.into_folder()?);
        }
        Ok(Folder::with_contents(decks, subfolders))
    }
}

impl DeckDocument {
    fn into_deck(self) -> Result<Deck, DocumentError> {
        let mut questions = Vec::with_capacity(self.questions.len());
        for question in self.questions {
            questions.push(question.into_question()?);
        }
        let stats = DeckStats::from_persisted(self.total, self.correct, self.incorrect, self.attempted);
        let imported_at = self.imported_at.unwrap_or(DateTime::UNIX_EPOCH);
        Ok(Deck::from_persisted(self.name, questions, stats, imported_at)?)
    }
}

impl QuestionDocument {
    /// Validates the wire question into a domain question.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` for structural violations.
    pub fn into_question(self) -> Result<Question, QuestionError> {
        let options = self
            .options
            .into_iter()
            .map(|(key, text)| AnswerOption::new(key, text))
            .collect();
        Question::new(self.question, options, self.correct_answer, self.explanation)
    }
}

//
// ─── DOMAIN → DOCUMENT ─────────────────────────────────────────────────────────
//

impl Snapshot {
    /// Serializable form of this snapshot, carrying the current schema tag.
    #[must_use]
    pub fn to_document(&self) -> SnapshotDocument {
        let folders = self
            .folders()
            .iter()
            .map(|(name, folder)| (name.clone(), folder_document(name, folder)))
            .collect();

        SnapshotDocument {
            folders,
            expanded_folders: self.expanded_folders().iter().cloned().collect(),
            settings: SettingsDocument {
                font_scale: self.settings().font_scale(),
            },
            last_updated: self.last_updated(),
            version: Some(SNAPSHOT_VERSION.to_owned()),
        }
    }
}

fn folder_document(name: &str, folder: &Folder) -> FolderDocument {
    FolderDocument {
        decks: folder
            .decks()
            .iter()
            .map(|deck| deck_document(name, deck))
            .collect(),
        subfolders: folder
            .subfolders()
            .iter()
            .map(|(sub_name, sub)| (sub_name.clone(), folder_document(sub_name, sub)))
            .collect(),
    }
}

fn deck_document(folder: &str, deck: &Deck) -> DeckDocument {
    DeckDocument {
        name: deck.name().to_owned(),
        questions: deck.questions().iter().map(question_document).collect(),
        total: deck.stats().total(),
        correct: deck.stats().correct(),
        incorrect: deck.stats().incorrect(),
        attempted: deck.stats().attempted(),
        folder: Some(folder.to_owned()),
        imported_at: Some(deck.imported_at()),
    }
}

fn question_document(question: &Question) -> QuestionDocument {
    QuestionDocument {
        question: question.prompt().to_owned(),
        options: question
            .options()
            .iter()
            .map(|o| (o.key().to_owned(), o.text().to_owned()))
            .collect(),
        correct_answer: question.correct_key().to_owned(),
        explanation: question.explanation().map(str::to_owned),
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::UNCATEGORIZED;
    use crate::time::fixed_now;

    const LEGACY_DOC: &str = r#"{
        "folders": {
            "Surgery": {
                "decks": [{
                    "name": "Trauma",
                    "questions": [{
                        "question": "First step in ATLS?",
                        "options": {"d": "Disability", "a": "Airway", "b": "Breathing"},
                        "correct_answer": "a",
                        "explanation": "Airway first."
                    }],
                    "total": 1,
                    "correct": 1,
                    "incorrect": 0,
                    "attempted": 1,
                    "folder": "Surgery",
                    "importedAt": "2023-11-14T22:13:20Z"
                }],
                "subfolders": {}
            }
        },
        "expandedFolders": ["Surgery"],
        "settings": {"fontScale": 1.25},
        "lastUpdated": "2023-11-14T22:13:20Z"
    }"#;

    #[test]
    fn decodes_legacy_document_without_version_tag() {
        let doc: SnapshotDocument = serde_json::from_str(LEGACY_DOC).unwrap();
        let snapshot = doc.into_snapshot().unwrap();

        assert!(snapshot.is_expanded("Surgery"));
        assert_eq!(snapshot.last_updated(), Some(fixed_now()));
        assert!((snapshot.settings().font_scale() - 1.25).abs() < f32::EPSILON);

        let deck = snapshot.deck("Surgery", "Trauma").unwrap();
        assert_eq!(deck.stats().correct(), 1);
        assert_eq!(deck.imported_at(), fixed_now());
    }

    #[test]
    fn option_order_follows_the_document() {
        let doc: SnapshotDocument = serde_json::from_str(LEGACY_DOC).unwrap();
        let snapshot = doc.into_snapshot().unwrap();
        let question = &snapshot.deck("Surgery", "Trauma").unwrap().questions()[0];

        let keys: Vec<_> = question.options().iter().map(|o| o.key()).collect();
        assert_eq!(keys, vec!["d", "a", "b"]);
    }

    #[test]
    fn missing_fields_default_deterministically() {
        let doc: SnapshotDocument = serde_json::from_str("{}").unwrap();
        let snapshot = doc.into_snapshot().unwrap();

        // The protected folder is restored even when the document lost it.
        assert!(snapshot.folder(UNCATEGORIZED).is_some());
        assert!(snapshot.expanded_folders().is_empty());
        assert!((snapshot.settings().font_scale() - 1.0).abs() < f32::EPSILON);
        assert_eq!(snapshot.last_updated(), None);
    }

    #[test]
    fn unknown_version_is_rejected() {
        let doc: SnapshotDocument =
            serde_json::from_str(r#"{"version": "7.0"}"#).unwrap();
        let err = doc.into_snapshot().unwrap_err();
        assert!(matches!(err, DocumentError::UnsupportedVersion(v) if v == "7.0"));
    }

    #[test]
    fn export_date_is_accepted_as_timestamp_alias() {
        let doc: SnapshotDocument =
            serde_json::from_str(r#"{"exportDate": "2023-11-14T22:13:20Z"}"#).unwrap();
        assert_eq!(doc.last_updated, Some(fixed_now()));
    }

    #[test]
    fn document_round_trips_through_domain() {
        let doc: SnapshotDocument = serde_json::from_str(LEGACY_DOC).unwrap();
        let snapshot = doc.into_snapshot().unwrap();

        let produced = snapshot.to_document();
        assert_eq!(produced.version.as_deref(), Some(SNAPSHOT_VERSION));

        let reparsed = produced.into_snapshot().unwrap();
        assert_eq!(reparsed, snapshot);
    }

    #[test]
    fn duplicate_deck_names_keep_first_occurrence() {
        let raw = r#"{
            "folders": {"X": {"decks": [
                {"name": "Dup", "questions": [], "total": 0},
                {"name": "Dup", "questions": [], "total": 0}
            ], "subfolders": {}}}
        }"#;
        let doc: SnapshotDocument = serde_json::from_str(raw).unwrap();
        let snapshot = doc.into_snapshot().unwrap();
        assert_eq!(snapshot.folder("X").unwrap().decks().len(), 1);
    }

    #[test]
    fn malformed_question_fails_validation() {
        let raw = r#"{
            "folders": {"X": {"decks": [{
                "name": "Bad",
                "questions": [{
                    "question": "Q",
                    "options": {"a": "Yes"},
                    "correct_answer": "z"
                }]
            }], "subfolders": {}}}
        }"#;
        let doc: SnapshotDocument = serde_json::from_str(raw).unwrap();
        assert!(matches!(
            doc.into_snapshot().unwrap_err(),
            DocumentError::Question(QuestionError::UnknownCorrectKey(_))
        ));
    }
}
