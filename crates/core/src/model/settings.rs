use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SettingsError {
    #[error("session size must be > 0")]
    InvalidSessionSize,

    #[error("session time limit must be > 0 seconds")]
    InvalidSessionBudget,

    #[error("per-question time budget must be > 0 seconds")]
    InvalidQuestionBudget,
}

/// Tunables for a quiz session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuizSettings {
    session_size: usize,
    session_budget_secs: u32,
    question_budget_secs: u32,
}

impl QuizSettings {
    pub const DEFAULT_SESSION_SIZE: usize = 10;
    pub const DEFAULT_SESSION_BUDGET_SECS: u32 = 900;
    pub const DEFAULT_QUESTION_BUDGET_SECS: u32 = 60;

    /// Creates custom settings.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` if any value is zero.
    pub fn new(
        session_size: usize,
        session_budget_secs: u32,
        question_budget_secs: u32,
    ) -> Result<Self, SettingsError> {
        if session_size == 0 {
            return Err(SettingsError::InvalidSessionSize);
        }
        if session_budget_secs == 0 {
            return Err(SettingsError::InvalidSessionBudget);
        }
        if question_budget_secs == 0 {
            return Err(SettingsError::InvalidQuestionBudget);
        }
        Ok(Self {
            session_size,
            session_budget_secs,
            question_budget_secs,
        })
    }

    /// Number of questions drawn per session.
    #[must_use]
    pub fn session_size(&self) -> usize {
        self.session_size
    }

    /// Whole-session countdown in seconds.
    #[must_use]
    pub fn session_budget_secs(&self) -> u32 {
        self.session_budget_secs
    }

    /// Expected time per question, used only for UI feedback.
    #[must_use]
    pub fn question_budget_secs(&self) -> u32 {
        self.question_budget_secs
    }
}

impl Default for QuizSettings {
    fn default() -> Self {
        Self {
            session_size: Self::DEFAULT_SESSION_SIZE,
            session_budget_secs: Self::DEFAULT_SESSION_BUDGET_SECS,
            question_budget_secs: Self::DEFAULT_QUESTION_BUDGET_SECS,
        }
    }
}
