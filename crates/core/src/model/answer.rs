use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::ids::QuestionId;

/// Reserved answer text marking a question as skipped.
pub const SKIPPED_ANSWER: &str = "SKIPPED";

/// The user's recorded response for one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub answer: String,
    pub time_spent: u32,
    pub skipped: bool,
}

impl AnswerRecord {
    #[must_use]
    pub fn answered(answer: impl Into<String>, time_spent: u32) -> Self {
        Self {
            answer: answer.into(),
            time_spent,
            skipped: false,
        }
    }

    #[must_use]
    pub fn skipped(time_spent: u32) -> Self {
        Self {
            answer: SKIPPED_ANSWER.to_owned(),
            time_spent,
            skipped: true,
        }
    }
}

/// Question id → recorded response for the active session.
///
/// At most one record per question; writing again replaces the previous one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerLedger {
    records: HashMap<QuestionId, AnswerRecord>,
}

impl AnswerLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the record for `question_id`. Last write wins.
    pub fn record(
        &mut self,
        question_id: QuestionId,
        answer: impl Into<String>,
        time_spent: u32,
        skipped: bool,
    ) {
        let record = AnswerRecord {
            answer: answer.into(),
            time_spent,
            skipped,
        };
        self.records.insert(question_id, record);
    }

    #[must_use]
    pub fn get(&self, question_id: QuestionId) -> Option<&AnswerRecord> {
        self.records.get(&question_id)
    }

    /// Number of questions with a record, answered or skipped.
    #[must_use]
    pub fn count_answered(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}
