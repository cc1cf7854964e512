use std::fmt;
use std::str::FromStr;

//
// ─── MODE ──────────────────────────────────────────────────────────────────────
//

/// How a quiz run selects its questions.
///
/// Review modes take a fixed fraction of the deck rather than querying past
/// answers: only aggregate counts survive a session, so there is no record of
/// *which* questions went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuizMode {
    Fresh,
    #[default]
    Normal,
    IncorrectReview,
    BookmarkedReview,
}

impl QuizMode {
    /// Fraction of the deck selected for this mode, `None` for the full deck.
    #[must_use]
    pub fn selection_fraction(self) -> Option<f64> {
        match self {
            QuizMode::Fresh | QuizMode::Normal => None,
            QuizMode::IncorrectReview => Some(0.2),
            QuizMode::BookmarkedReview => Some(0.1),
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            QuizMode::Fresh => "fresh",
            QuizMode::Normal => "normal",
            QuizMode::IncorrectReview => "incorrect",
            QuizMode::BookmarkedReview => "bookmarked",
        }
    }
}

impl fmt::Display for QuizMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error type for parsing a quiz mode from a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseModeError(String);

impl fmt::Display for ParseModeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown quiz mode: {}", self.0)
    }
}

impl std::error::Error for ParseModeError {}

impl FromStr for QuizMode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fresh" => Ok(QuizMode::Fresh),
            "normal" => Ok(QuizMode::Normal),
            "incorrect" => Ok(QuizMode::IncorrectReview),
            "bookmarked" => Ok(QuizMode::BookmarkedReview),
            other => Err(ParseModeError(other.to_owned())),
        }
    }
}

//
// ─── TIER ──────────────────────────────────────────────────────────────────────
//

/// Qualitative rating derived from a session's percentage score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Outstanding,
    Excellent,
    Good,
    NeedsPractice,
    NeedsStudy,
}

impl Tier {
    /// Maps a percentage to a tier. Thresholds are inclusive lower bounds,
    /// checked from highest to lowest.
    #[must_use]
    pub fn from_percentage(percentage: u32) -> Self {
        match percentage {
            90.. => Tier::Outstanding,
            80.. => Tier::Excellent,
            70.. => Tier::Good,
            60.. => Tier::NeedsPractice,
            _ => Tier::NeedsStudy,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Tier::Outstanding => "Outstanding",
            Tier::Excellent => "Excellent",
            Tier::Good => "Good",
            Tier::NeedsPractice => "Needs practice",
            Tier::NeedsStudy => "Needs study",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

//
// ─── RESULT ────────────────────────────────────────────────────────────────────
//

/// Summary of a finished quiz session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionResult {
    correct: u32,
    incorrect: u32,
    unanswered: u32,
    bookmarked: u32,
    elapsed_seconds: u64,
    percentage: u32,
    tier: Tier,
}

impl SessionResult {
    /// Builds a result, deriving percentage and tier from the counts.
    ///
    /// The percentage is `round(100 * correct / total)` where `total` covers
    /// answered and unanswered questions alike; an empty session scores 0.
    #[must_use]
    pub fn new(
        correct: u32,
        incorrect: u32,
        unanswered: u32,
        bookmarked: u32,
        elapsed_seconds: u64,
    ) -> Self {
        let total = correct + incorrect + unanswered;
        let percentage = if total == 0 {
            0
        } else {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            {
                (f64::from(correct) * 100.0 / f64::from(total)).round() as u32
            }
        };

        Self {
            correct,
            incorrect,
            unanswered,
            bookmarked,
            elapsed_seconds,
            percentage,
            tier: Tier::from_percentage(percentage),
        }
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
    pub fn unanswered(&self) -> u32 {
        self.unanswered
    }

    #[must_use]
    pub fn bookmarked(&self) -> u32 {
        self.bookmarked
    }

    #[must_use]
    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed_seconds
    }

    #[must_use]
    pub fn percentage(&self) -> u32 {
        self.percentage
    }

    #[must_use]
    pub fn tier(&self) -> Tier {
        self.tier
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_thresholds_are_inclusive() {
        assert_eq!(Tier::from_percentage(100), Tier::Outstanding);
        assert_eq!(Tier::from_percentage(90), Tier::Outstanding);
        assert_eq!(Tier::from_percentage(89), Tier::Excellent);
        assert_eq!(Tier::from_percentage(80), Tier::Excellent);
        assert_eq!(Tier::from_percentage(70), Tier::Good);
        assert_eq!(Tier::from_percentage(60), Tier::NeedsPractice);
        assert_eq!(Tier::from_percentage(59), Tier::NeedsStudy);
        assert_eq!(Tier::from_percentage(0), Tier::NeedsStudy);
    }

    #[test]
    fn result_percentage_basic() {
        let result = SessionResult::new(8, 2, 0, 0, 120);
        assert_eq!(result.percentage(), 80);
        assert_eq!(result.tier(), Tier::Excellent);
    }

    #[test]
    fn result_percentage_counts_unanswered_in_total() {
        let result = SessionResult::new(3, 1, 1, 1, 30);
        assert_eq!(result.percentage(), 60);
        assert_eq!(result.tier(), Tier::NeedsPractice);
    }

    #[test]
    fn result_empty_session_scores_zero() {
        let result = SessionResult::new(0, 0, 0, 0, 0);
        assert_eq!(result.percentage(), 0);
        assert_eq!(result.tier(), Tier::NeedsStudy);
    }

    #[test]
    fn mode_fractions() {
        assert_eq!(QuizMode::Fresh.selection_fraction(), None);
        assert_eq!(QuizMode::Normal.selection_fraction(), None);
        assert_eq!(QuizMode::IncorrectReview.selection_fraction(), Some(0.2));
        assert_eq!(QuizMode::BookmarkedReview.selection_fraction(), Some(0.1));
    }

    #[test]
    fn mode_parses_from_str() {
        assert_eq!("fresh".parse::<QuizMode>().unwrap(), QuizMode::Fresh);
        assert_eq!(
            "bookmarked".parse::<QuizMode>().unwrap(),
            QuizMode::BookmarkedReview
        );
        assert!("speedrun".parse::<QuizMode>().is_err());
    }
}
