//! Category and timing breakdowns of a finished quiz.

use crate::model::{QuestionId, QuestionResult, ScoredResult};

/// Correct/total counts for one category.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryStat {
    pub category: String,
    pub correct: u32,
    pub total: u32,
}

impl CategoryStat {
    #[must_use]
    pub fn accuracy_pct(&self) -> f64 {
        percent(self.correct, self.total)
    }
}

/// Time spent on a single question, for fastest/slowest reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuestionTiming {
    pub question_id: QuestionId,
    pub position: usize,
    pub time_spent: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimeBreakdown {
    /// Sum of per-question time as recorded in the ledger.
    pub total_question_secs: u64,
    pub average_secs: f64,
    pub fastest: Option<QuestionTiming>,
    pub slowest: Option<QuestionTiming>,
}

/// Derived statistics for a `ScoredResult`.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultAnalytics {
    pub accuracy_pct: f64,
    pub skipped: u32,
    pub unanswered: u32,
    /// In order of first appearance within the session.
    pub categories: Vec<CategoryStat>,
    pub timing: TimeBreakdown,
}

impl ResultAnalytics {
    /// Build analytics from the question results' own `category` labels.
    #[must_use]
    pub fn from_result(result: &ScoredResult) -> Self {
        let questions = result.question_results();

        let mut categories: Vec<CategoryStat> = Vec::new();
        for qr in questions {
            let index = match categories.iter().position(|c| c.category == qr.category) {
                Some(index) => index,
                None => {
                    categories.push(CategoryStat {
                        category: qr.category.clone(),
                        correct: 0,
                        total: 0,
                    });
                    categories.len() - 1
                }
            };
            let stat = &mut categories[index];
            stat.total += 1;
            if qr.is_correct {
                stat.correct += 1;
            }
        }

        let skipped = count(questions, |qr| qr.skipped);
        let unanswered = count(questions, |qr| !qr.skipped && qr.user_answer.is_empty());

        Self {
            accuracy_pct: percent(result.score(), result.total_questions()),
            skipped,
            unanswered,
            categories,
            timing: time_breakdown(questions),
        }
    }
}

fn count(questions: &[QuestionResult], pred: impl Fn(&QuestionResult) -> bool) -> u32 {
    let n = questions.iter().filter(|qr| pred(qr)).count();
    u32::try_from(n).unwrap_or(u32::MAX)
}

fn time_breakdown(questions: &[QuestionResult]) -> TimeBreakdown {
    let timings: Vec<QuestionTiming> = questions
        .iter()
        .enumerate()
        .map(|(position, qr)| QuestionTiming {
            question_id: qr.question_id,
            position,
            time_spent: qr.time_spent,
        })
        .collect();

    let total_question_secs: u64 = timings.iter().map(|t| u64::from(t.time_spent)).sum();
    #[allow(clippy::cast_precision_loss)]
    let average_secs = if timings.is_empty() {
        0.0
    } else {
        total_question_secs as f64 / timings.len() as f64
    };

    // Ties go to the earliest position.
    let fastest = timings
        .iter()
        .copied()
        .min_by_key(|t| (t.time_spent, t.position));
    let slowest = timings
        .iter()
        .copied()
        .max_by_key(|t| (t.time_spent, std::cmp::Reverse(t.position)));

    TimeBreakdown {
        total_question_secs,
        average_secs,
        fastest,
        slowest,
    }
}

fn percent(part: u32, whole: u32) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    f64::from(part) / f64::from(whole) * 100.0
}
