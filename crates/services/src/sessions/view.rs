use chrono::{DateTime, Utc};
use std::sync::Arc;

use quiz_core::ResultAnalytics;
use quiz_core::model::{ResultId, ScoredResult};
use storage::repository::ResultHistory;

use crate::error::QuizError;

/// List entry for a past attempt.
///
/// No pre-formatted strings; the host decides how to render times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultListItem {
    pub id: ResultId,
    pub topic: String,
    pub score: u32,
    pub total_questions: u32,
    pub time_spent: u32,
    pub completed_at: DateTime<Utc>,
}

impl ResultListItem {
    /// Build an item from a stored result. Unsaved results have no id and are skipped.
    #[must_use]
    pub fn from_result(result: &ScoredResult) -> Option<Self> {
        Some(Self {
            id: result.id()?,
            topic: result.topic().to_owned(),
            score: result.score(),
            total_questions: result.total_questions(),
            time_spent: result.time_spent(),
            completed_at: result.completed_at(),
        })
    }
}

/// A stored result together with its derived breakdown.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultDetail {
    pub result: ScoredResult,
    pub analytics: ResultAnalytics,
}

/// Read-only access to past attempts.
#[derive(Clone)]
pub struct ResultService {
    history: Arc<dyn ResultHistory>,
}

impl ResultService {
    #[must_use]
    pub fn new(history: Arc<dyn ResultHistory>) -> Self {
        Self { history }
    }

    /// Most recent attempts first.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Storage` if the history cannot be read.
    pub async fn list_recent(&self, limit: u32) -> Result<Vec<ResultListItem>, QuizError> {
        let results = self.history.list_results(limit).await?;
        Ok(results.iter().filter_map(ResultListItem::from_result).collect())
    }

    /// # Errors
    ///
    /// Returns `QuizError::Storage` if the result is missing or unreadable.
    pub async fn detail(&self, id: ResultId) -> Result<ResultDetail, QuizError> {
        let result = self.history.get_result(id).await?;
        let analytics = ResultAnalytics::from_result(&result);
        Ok(ResultDetail { result, analytics })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{QuestionId, QuestionResult};
    use quiz_core::time::fixed_now;
    use storage::repository::{InMemoryRepository, ResultSink, StorageError};

    fn build_result(correct: bool, minutes: i64) -> ScoredResult {
        let results = vec![QuestionResult {
            question_id: QuestionId::new(1),
            question_text: "Q1".into(),
            user_answer: if correct { "a".into() } else { "b".into() },
            correct_answer: "a".into(),
            is_correct: correct,
            time_spent: 4,
            skipped: false,
            category: "Science".into(),
        }];
        ScoredResult::from_question_results(
            "Science",
            4,
            fixed_now() + chrono::Duration::minutes(minutes),
            results,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn lists_newest_first() {
        let repo = InMemoryRepository::new();
        repo.persist(&build_result(true, 0)).await.unwrap();
        repo.persist(&build_result(false, 5)).await.unwrap();
        let service = ResultService::new(Arc::new(repo));

        let items = service.list_recent(10).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].score, 0);
        assert_eq!(items[1].score, 1);
        assert_eq!(items[0].topic, "Science");
    }

    #[tokio::test]
    async fn detail_includes_analytics() {
        let repo = InMemoryRepository::new();
        let stored = repo.persist(&build_result(true, 0)).await.unwrap();
        let service = ResultService::new(Arc::new(repo));

        let detail = service.detail(stored.id().unwrap()).await.unwrap();
        assert_eq!(detail.result, stored);
        assert_eq!(detail.analytics.categories.len(), 1);
        assert_eq!(detail.analytics.categories[0].correct, 1);
    }

    #[tokio::test]
    async fn missing_detail_is_storage_error() {
        let service = ResultService::new(Arc::new(InMemoryRepository::new()));
        let err = service.detail(ResultId::new(7)).await.unwrap_err();
        assert!(matches!(err, QuizError::Storage(StorageError::NotFound)));
    }
}
