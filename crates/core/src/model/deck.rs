use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::Question;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DeckError {
    #[error("deck name cannot be empty")]
    EmptyName,
}

//
// ─── STATS ─────────────────────────────────────────────────────────────────────
//

/// Aggregate performance counters for a deck.
///
/// Counters only ever increase across sessions: a run that performs worse than
/// a prior best does not erase the prior best. Because only these aggregates
/// persist deck-to-deck (never per-question outcomes), repeated partial
/// attempts can leave `correct + incorrect` above the `attempted` of any
/// single run, and the counters cannot shrink even if deck content changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeckStats {
    total: u32,
    correct: u32,
    incorrect: u32,
    attempted: u32,
}

impl DeckStats {
    /// Fresh counters for a deck with `total` questions.
    #[must_use]
    pub fn new(total: u32) -> Self {
        Self {
            total,
            correct: 0,
            incorrect: 0,
            attempted: 0,
        }
    }

    /// Rehydrate counters from a persisted document.
    ///
    /// `total` is authoritative from the question list, not the document.
    #[must_use]
    pub fn from_persisted(total: u32, correct: u32, incorrect: u32, attempted: u32) -> Self {
        Self {
            total,
            correct,
            incorrect,
            attempted,
        }
    }

    /// Fold a finished session into the counters, component-wise:
    /// each counter takes the max of its stored and session value.
    pub fn record_session(&mut self, correct: u32, incorrect: u32) {
        self.correct = self.correct.max(correct);
        self.incorrect = self.incorrect.max(incorrect);
        self.attempted = self.attempted.max(correct.saturating_add(incorrect));
    }

    #[must_use]
    pub fn total(&self) -> u32 {
        self.total
    }

    #[must_use]
    pub fn correct(&self) -> u32 {
        self.correct
    }

    #[must_use]
    pub fn incorrect(&self) -> u32 {
        self.incorrect
    }

    #[must_use]
    pub fn attempted(&self) -> u32 {
        self.attempted
    }
}

//
// ─── DECK ──────────────────────────────────────────────────────────────────────
//

/// An ordered set of questions with aggregate performance counters.
#[derive(Debug, Clone, PartialEq)]
pub struct Deck {
    name: String,
    questions: Vec<Question>,
    stats: DeckStats,
    imported_at: DateTime<Utc>,
}

impl Deck {
    /// Creates a freshly imported deck with zeroed counters.
    ///
    /// # Errors
    ///
    /// Returns `DeckError::EmptyName` if the name is empty or whitespace-only.
    pub fn new(
        name: impl Into<String>,
        questions: Vec<Question>,
        imported_at: DateTime<Utc>,
    ) -> Result<Self, DeckError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DeckError::EmptyName);
        }
        let total = u32::try_from(questions.len()).unwrap_or(u32::MAX);

        Ok(Self {
            name: name.trim().to_owned(),
            questions,
            stats: DeckStats::new(total),
            imported_at,
        })
    }

    /// Rehydrate a deck from persisted storage, keeping its counters.
    ///
    /// The `total` counter is recomputed from the question list.
    ///
    /// # Errors
    ///
    /// Returns `DeckError::EmptyName` if the name is empty or whitespace-only.
    pub fn from_persisted(
        name: impl Into<String>,
        questions: Vec<Question>,
        stats: DeckStats,
        imported_at: DateTime<Utc>,
    ) -> Result<Self, DeckError> {
        let mut deck = Self::new(name, questions, imported_at)?;
        deck.stats = DeckStats::from_persisted(
            deck.stats.total,
            stats.correct,
            stats.incorrect,
            stats.attempted,
        );
        Ok(deck)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn stats(&self) -> &DeckStats {
        &self.stats
    }

    #[must_use]
    pub fn imported_at(&self) -> DateTime<Utc> {
        self.imported_at
    }

    /// Commit a finished session's counts under the monotonic-max policy.
    pub fn record_session(&mut self, correct: u32, incorrect: u32) {
        self.stats.record_session(correct, incorrect);
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
