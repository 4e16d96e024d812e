use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{QuestionId, ResultId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ResultError {
    #[error("topic cannot be empty")]
    EmptyTopic,

    #[error("score ({score}) does not match correct answers ({counted})")]
    ScoreMismatch { score: u32, counted: u32 },

    #[error("total questions ({total}) does not match result count ({len})")]
    TotalMismatch { total: u32, len: usize },

    #[error("too many question results for a single session: {len}")]
    TooManyQuestions { len: usize },

    #[error("question {0} is marked both correct and skipped")]
    CorrectWhileSkipped(QuestionId),

    #[error("question {0} appears more than once")]
    DuplicateQuestion(QuestionId),

    #[error("malformed result payload: {0}")]
    Malformed(String),
}

/// Outcome of a single question within a scored session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuestionResult {
    pub question_id: QuestionId,
    pub question_text: String,
    /// Empty when the question was never answered.
    pub user_answer: String,
    pub correct_answer: String,
    pub is_correct: bool,
    pub time_spent: u32,
    pub skipped: bool,
    pub category: String,
}

/// Final, immutable result of a quiz session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredResult {
    id: Option<ResultId>,
    topic: String,
    score: u32,
    total_questions: u32,
    time_spent: u32,
    completed_at: DateTime<Utc>,
    question_results: Vec<QuestionResult>,
}

impl ScoredResult {
    /// Assemble a result from per-question outcomes, deriving score and total.
    ///
    /// # Errors
    ///
    /// Returns `ResultError` if the topic is blank, a question repeats, a
    /// skipped question is marked correct, or the count overflows `u32`.
    pub fn from_question_results(
        topic: impl Into<String>,
        time_spent: u32,
        completed_at: DateTime<Utc>,
        question_results: Vec<QuestionResult>,
    ) -> Result<Self, ResultError> {
        let len = question_results.len();
        let total_questions =
            u32::try_from(len).map_err(|_| ResultError::TooManyQuestions { len })?;
        let score = count_correct(&question_results)?;
        Self::from_persisted(
            None,
            topic.into(),
            score,
            total_questions,
            time_spent,
            completed_at,
            question_results,
        )
    }

    /// Rehydrate a result from persisted or external data.
    ///
    /// # Errors
    ///
    /// Returns `ResultError` when the stored totals do not agree with the
    /// per-question outcomes.
    pub fn from_persisted(
        id: Option<ResultId>,
        topic: String,
        score: u32,
        total_questions: u32,
        time_spent: u32,
        completed_at: DateTime<Utc>,
        question_results: Vec<QuestionResult>,
    ) -> Result<Self, ResultError> {
        if topic.trim().is_empty() {
            return Err(ResultError::EmptyTopic);
        }
        if usize::try_from(total_questions).ok() != Some(question_results.len()) {
            return Err(ResultError::TotalMismatch {
                total: total_questions,
                len: question_results.len(),
            });
        }

        let mut seen = HashSet::with_capacity(question_results.len());
        for qr in &question_results {
            if !seen.insert(qr.question_id) {
                return Err(ResultError::DuplicateQuestion(qr.question_id));
            }
            if qr.is_correct && qr.skipped {
                return Err(ResultError::CorrectWhileSkipped(qr.question_id));
            }
        }

        let counted = count_correct(&question_results)?;
        if counted != score {
            return Err(ResultError::ScoreMismatch { score, counted });
        }

        Ok(Self {
            id,
            topic,
            score,
            total_questions,
            time_spent,
            completed_at,
            question_results,
        })
    }

    /// Parse a result from its JSON boundary shape, rejecting malformed input.
    ///
    /// # Errors
    ///
    /// Returns `ResultError::Malformed` for JSON that does not match the
    /// payload schema, or any validation error from `from_persisted`.
    pub fn from_json(raw: &str) -> Result<Self, ResultError> {
        let payload: ScoredResultPayload =
            serde_json::from_str(raw).map_err(|e| ResultError::Malformed(e.to_string()))?;
        Self::try_from(payload)
    }

    /// Serialize to the JSON boundary shape.
    ///
    /// # Errors
    ///
    /// Returns `ResultError::Malformed` if serialization fails.
    pub fn to_json(&self) -> Result<String, ResultError> {
        serde_json::to_string(&ScoredResultPayload::from(self))
            .map_err(|e| ResultError::Malformed(e.to_string()))
    }

    /// Returns a copy of this result carrying the identity assigned by a sink.
    #[must_use]
    pub fn with_id(mut self, id: ResultId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn id(&self) -> Option<ResultId> {
        self.id
    }

    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn total_questions(&self) -> u32 {
        self.total_questions
    }

    /// Wall-clock seconds from session start to submit.
    #[must_use]
    pub fn time_spent(&self) -> u32 {
        self.time_spent
    }

    #[must_use]
    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }

    #[must_use]
    pub fn question_results(&self) -> &[QuestionResult] {
        &self.question_results
    }
}

fn count_correct(results: &[QuestionResult]) -> Result<u32, ResultError> {
    let counted = results.iter().filter(|qr| qr.is_correct).count();
    u32::try_from(counted).map_err(|_| ResultError::TooManyQuestions { len: counted })
}

//
// ─── BOUNDARY PAYLOAD ──────────────────────────────────────────────────────────
//

/// Strict wire shape of a scored result.
///
/// Unknown fields are rejected; conversion into `ScoredResult` re-validates
/// all derived totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScoredResultPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ResultId>,
    pub topic: String,
    pub score: u32,
    pub total_questions: u32,
    pub time_spent: u32,
    pub completed_at: DateTime<Utc>,
    pub question_results: Vec<QuestionResult>,
}

impl TryFrom<ScoredResultPayload> for ScoredResult {
    type Error = ResultError;

    fn try_from(payload: ScoredResultPayload) -> Result<Self, Self::Error> {
        ScoredResult::from_persisted(
            payload.id,
            payload.topic,
            payload.score,
            payload.total_questions,
            payload.time_spent,
            payload.completed_at,
            payload.question_results,
        )
    }
}

impl From<&ScoredResult> for ScoredResultPayload {
    fn from(result: &ScoredResult) -> Self {
        Self {
            id: result.id,
            topic: result.topic.clone(),
            score: result.score,
            total_questions: result.total_questions,
            time_spent: result.time_spent,
            completed_at: result.completed_at,
            question_results: result.question_results.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn qr(id: u64, is_correct: bool, skipped: bool) -> QuestionResult {
        QuestionResult {
            question_id: QuestionId::new(id),
            question_text: format!("Q{id}"),
            user_answer: if skipped { "SKIPPED".into() } else { "A".into() },
            correct_answer: "A".into(),
            is_correct,
            time_spent: 3,
            skipped,
            category: "general".into(),
        }
    }

    #[test]
    fn derives_score_and_total() {
        let result = ScoredResult::from_question_results(
            "all",
            42,
            fixed_now(),
            vec![qr(1, true, false), qr(2, false, true), qr(3, false, false)],
        )
        .unwrap();

        assert_eq!(result.score(), 1);
        assert_eq!(result.total_questions(), 3);
        assert!(result.id().is_none());
    }

    #[test]
    fn rejects_correct_and_skipped() {
        let err = ScoredResult::from_question_results("all", 1, fixed_now(), vec![qr(1, true, true)])
            .unwrap_err();
        assert_eq!(err, ResultError::CorrectWhileSkipped(QuestionId::new(1)));
    }

    #[test]
    fn rejects_inconsistent_score() {
        let err = ScoredResult::from_persisted(
            None,
            "all".into(),
            2,
            1,
            5,
            fixed_now(),
            vec![qr(1, true, false)],
        )
        .unwrap_err();
        assert_eq!(err, ResultError::ScoreMismatch { score: 2, counted: 1 });
    }

    #[test]
    fn json_boundary_rejects_unknown_fields() {
        let result =
            ScoredResult::from_question_results("math", 9, fixed_now(), vec![qr(1, true, false)])
                .unwrap()
                .with_id(ResultId::new(5));
        let json = result.to_json().unwrap();
        assert_eq!(ScoredResult::from_json(&json).unwrap(), result);

        let tampered = json.replacen("{", "{\"extra\":1,", 1);
        assert!(matches!(
            ScoredResult::from_json(&tampered),
            Err(ResultError::Malformed(_))
        ));
    }

    #[test]
    fn json_boundary_rejects_negative_time() {
        let raw = r#"{"topic":"all","score":0,"total_questions":0,"time_spent":-4,
            "completed_at":"2023-11-14T22:13:20Z","question_results":[]}"#;
        assert!(matches!(
            ScoredResult::from_json(raw),
            Err(ResultError::Malformed(_))
        ));
    }
}
