use thiserror::Error;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question prompt cannot be empty")]
    EmptyPrompt,

    #[error("question must offer at least one option")]
    NoOptions,

    #[error("option key {0:?} appears more than once")]
    DuplicateOptionKey(String),

    #[error("correct answer {0:?} is not among the options")]
    UnknownCorrectKey(String),
}

//
// ─── OPTION ────────────────────────────────────────────────────────────────────
//

/// A single answer choice. The position within the question's option list is
/// the display order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerOption {
    key: String,
    text: String,
}

impl AnswerOption {
    #[must_use]
    pub fn new(key: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            text: text.into(),
        }
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// A multiple-choice question. Immutable once imported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    prompt: String,
    options: Vec<AnswerOption>,
    correct_key: String,
    explanation: Option<String>,
}

impl Question {
    /// Creates a validated question.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the prompt is empty, no options are given,
    /// an option key repeats, or the correct key names no option.
    pub fn new(
        prompt: impl Into<String>,
        options: Vec<AnswerOption>,
        correct_key: impl Into<String>,
        explanation: Option<String>,
    ) -> Result<Self, QuestionError> {
        let prompt = prompt.into();
        if prompt.trim().is_empty() {
            return Err(QuestionError::EmptyPrompt);
        }
        if options.is_empty() {
            return Err(QuestionError::NoOptions);
        }
        for (i, option) in options.iter().enumerate() {
            if options[..i].iter().any(|o| o.key == option.key) {
                return Err(QuestionError::DuplicateOptionKey(option.key.clone()));
            }
        }
        let correct_key = correct_key.into();
        if !options.iter().any(|o| o.key == correct_key) {
            return Err(QuestionError::UnknownCorrectKey(correct_key));
        }

        let explanation = explanation
            .map(|e| e.trim().to_owned())
            .filter(|e| !e.is_empty());

        Ok(Self {
            prompt,
            options,
            correct_key,
            explanation,
        })
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Options in display order.
    #[must_use]
    pub fn options(&self) -> &[AnswerOption] {
        &self.options
    }

    #[must_use]
    pub fn option(&self, key: &str) -> Option<&AnswerOption> {
        self.options.iter().find(|o| o.key == key)
    }

    #[must_use]
    pub fn correct_key(&self) -> &str {
        &self.correct_key
    }

    #[must_use]
    pub fn explanation(&self) -> Option<&str> {
        self.explanation.as_deref()
    }

    /// Whether the given option key is the correct answer.
    #[must_use]
    pub fn is_correct(&self, key: &str) -> bool {
        self.correct_key == key
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
