use chrono::{DateTime, Utc};

use crate::model::{AnswerLedger, Question, QuestionResult, ResultError, ScoredResult};
use crate::time::whole_seconds_between;

/// Turn a session's questions and ledger into a `ScoredResult`.
///
/// Questions without a record count as unanswered: empty answer, not
/// skipped, zero time. A skipped record is never correct, even when its
/// stored text equals the correct answer.
///
/// # Errors
///
/// Returns `ResultError` if the assembled result fails validation.
pub fn score_session(
    questions: &[Question],
    ledger: &AnswerLedger,
    topic: &str,
    started_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
) -> Result<ScoredResult, ResultError> {
    let question_results = questions
        .iter()
        .map(|question| {
            let (user_answer, time_spent, skipped) = match ledger.get(question.id()) {
                Some(record) => (record.answer.clone(), record.time_spent, record.skipped),
                None => (String::new(), 0, false),
            };
            QuestionResult {
                question_id: question.id(),
                question_text: question.text().to_owned(),
                is_correct: !skipped && question.is_correct_answer(&user_answer),
                user_answer,
                correct_answer: question.correct_answer().to_owned(),
                time_spent,
                skipped,
                category: question.category().to_owned(),
            }
        })
        .collect();

    ScoredResult::from_question_results(
        topic,
        whole_seconds_between(started_at, completed_at),
        completed_at,
        question_results,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Difficulty, QuestionId, SKIPPED_ANSWER};
    use crate::time::fixed_now;
    use chrono::Duration;

    fn question(id: u64, correct: &str) -> Question {
        Question::new(
            QuestionId::new(id),
            format!("Question {id}"),
            vec![correct.to_owned(), "other".to_owned()],
            correct,
            "general",
            Difficulty::Medium,
        )
        .unwrap()
    }

    #[test]
    fn skipped_sentinel_never_scores() {
        let questions = vec![question(1, SKIPPED_ANSWER)];
        let mut ledger = AnswerLedger::new();
        ledger.record(QuestionId::new(1), SKIPPED_ANSWER, 4, true);

        let result =
            score_session(&questions, &ledger, "all", fixed_now(), fixed_now()).unwrap();
        assert_eq!(result.score(), 0);
        assert!(result.question_results()[0].skipped);
        assert!(!result.question_results()[0].is_correct);
    }

    #[test]
    fn unanswered_questions_are_blank() {
        let questions = vec![question(1, "a"), question(2, "b")];
        let mut ledger = AnswerLedger::new();
        ledger.record(QuestionId::new(1), "a", 2, false);

        let started = fixed_now();
        let result = score_session(
            &questions,
            &ledger,
            "general",
            started,
            started + Duration::seconds(75),
        )
        .unwrap();

        assert_eq!(result.score(), 1);
        assert_eq!(result.total_questions(), 2);
        assert_eq!(result.time_spent(), 75);
        let blank = &result.question_results()[1];
        assert_eq!(blank.user_answer, "");
        assert_eq!(blank.time_spent, 0);
        assert!(!blank.skipped);
        assert!(!blank.is_correct);
    }

    #[test]
    fn results_follow_question_order() {
        let questions = vec![question(3, "x"), question(1, "y"), question(2, "z")];
        let result = score_session(
            &questions,
            &AnswerLedger::new(),
            "all",
            fixed_now(),
            fixed_now(),
        )
        .unwrap();
        let ids: Vec<_> = result
            .question_results()
            .iter()
            .map(|qr| qr.question_id.value())
            .collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }
}
