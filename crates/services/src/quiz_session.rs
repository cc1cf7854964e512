use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::seq::SliceRandom;

use quiz_core::model::{Deck, Question, QuizMode, SessionResult};

//
// ─── SESSION STATE ─────────────────────────────────────────────────────────────
//

/// Lifecycle of a single quiz run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuizPhase {
    #[default]
    NotStarted,
    Active,
    Finished,
}

/// What the UI shows immediately after a selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerFeedback {
    pub selected: String,
    pub correct_key: String,
    pub is_correct: bool,
}

/// One recorded answer, keyed by question index in the session order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedAnswer {
    pub selected: String,
    pub is_correct: bool,
}

/// A single in-flight quiz run over a copy of a deck's questions.
///
/// The session is entirely transient: nothing here is persisted, and on
/// finish only the aggregate counts are handed back for the caller to fold
/// into the deck. Answers may be revised freely until `finish` is called.
#[derive(Debug, Clone, Default)]
pub struct QuizSession {
    phase: QuizPhase,
    mode: QuizMode,
    questions: Vec<Question>,
    answers: BTreeMap<usize, RecordedAnswer>,
    bookmarks: BTreeSet<usize>,
    current: usize,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl QuizSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ── Accessors ──────────────────────────────────────────────────────────

    #[must_use]
    pub fn phase(&self) -> QuizPhase {
        self.phase
    }

    #[must_use]
    pub fn mode(&self) -> QuizMode {
        self.mode
    }

    #[must_use]
    pub fn total_questions(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.answers.len()
    }

    #[must_use]
    pub fn bookmarked_count(&self) -> usize {
        self.bookmarks.len()
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current)
    }

    #[must_use]
    pub fn answer_for(&self, index: usize) -> Option<&RecordedAnswer> {
        self.answers.get(&index)
    }

    #[must_use]
    pub fn is_bookmarked(&self, index: usize) -> bool {
        self.bookmarks.contains(&index)
    }

    // ── Operations ─────────────────────────────────────────────────────────

    /// Starts a run over the deck, discarding any previous session state.
    ///
    /// Review modes take the leading `ceil(fraction * len)` questions before
    /// shuffling; the other modes take the whole deck. Returns `false` and
    /// stays out of the `Active` phase when the deck has no questions.
    pub fn start<R: Rng + ?Sized>(
        &mut self,
        deck: &Deck,
        mode: QuizMode,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> bool {
        let mut questions = match mode.selection_fraction() {
            Some(fraction) => {
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let take = (deck.questions().len() as f64 * fraction).ceil() as usize;
                deck.questions()[..take.min(deck.questions().len())].to_vec()
            }
            None => deck.questions().to_vec(),
        };
        if questions.is_empty() {
            return false;
        }
        questions.shuffle(rng);

        self.phase = QuizPhase::Active;
        self.mode = mode;
        self.questions = questions;
        self.answers.clear();
        self.bookmarks.clear();
        self.current = 0;
        self.started_at = Some(now);
        self.finished_at = None;
        true
    }

    /// Records (or revises) the answer for a question and returns the
    /// feedback to display. `None` when the session is not active, the index
    /// is out of range, or the key names no option of that question.
    pub fn select_answer(&mut self, index: usize, key: &str) -> Option<AnswerFeedback> {
        if self.phase != QuizPhase::Active {
            return None;
        }
        let question = self.questions.get(index)?;
        question.option(key)?;

        let is_correct = question.is_correct(key);
        self.answers.insert(
            index,
            RecordedAnswer {
                selected: key.to_owned(),
                is_correct,
            },
        );
        Some(AnswerFeedback {
            selected: key.to_owned(),
            correct_key: question.correct_key().to_owned(),
            is_correct,
        })
    }

    /// Flips the bookmark on a question. Silent no-op outside the active
    /// phase or out of range.
    pub fn toggle_bookmark(&mut self, index: usize) {
        if self.phase != QuizPhase::Active || index >= self.questions.len() {
            return;
        }
        if !self.bookmarks.remove(&index) {
            self.bookmarks.insert(index);
        }
    }

    /// Moves the cursor to a question. Silent no-op outside the active phase
    /// or out of range.
    pub fn navigate(&mut self, index: usize) {
        if self.phase != QuizPhase::Active || index >= self.questions.len() {
            return;
        }
        self.current = index;
    }

    /// Ends the run and computes its result. Unanswered questions count
    /// toward the total but not toward correct or incorrect. `None` when the
    /// session is not active.
    pub fn finish(&mut self, now: DateTime<Utc>) -> Option<SessionResult> {
        if self.phase != QuizPhase::Active {
            return None;
        }
        self.phase = QuizPhase::Finished;
        self.finished_at = Some(now);
        self.result()
    }

    /// The result of a finished run, `None` in any other phase.
    #[must_use]
    pub fn result(&self) -> Option<SessionResult> {
        if self.phase != QuizPhase::Finished {
            return None;
        }
        let correct = self.answers.values().filter(|a| a.is_correct).count();
        let incorrect = self.answers.len() - correct;
        let unanswered = self.questions.len() - self.answers.len();
        let elapsed = match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => (end - start).num_seconds().max(0),
            _ => 0,
        };

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Some(SessionResult::new(
            correct as u32,
            incorrect as u32,
            unanswered as u32,
            self.bookmarks.len() as u32,
            elapsed as u64,
        ))
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
