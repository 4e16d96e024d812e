use async_trait::async_trait;
use quiz_core::model::{Question, ResultId, ScoredResult};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// A category available in the question bank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorySummary {
    /// URL-safe slug derived from the label.
    pub id: String,
    pub display_name: String,
    pub count: u32,
}

impl CategorySummary {
    #[must_use]
    pub fn from_label(label: &str, count: u32) -> Self {
        Self {
            id: slugify(label),
            display_name: label.to_owned(),
            count,
        }
    }
}

fn slugify(label: &str) -> String {
    let mut slug = String::with_capacity(label.len());
    for ch in label.trim().chars() {
        if ch.is_alphanumeric() {
            slug.extend(ch.to_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_owned()
}

/// Read-only supplier of questions.
#[async_trait]
pub trait QuestionSource: Send + Sync {
    /// Every question, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn fetch_all(&self) -> Result<Vec<Question>, StorageError>;

    /// Questions whose category matches `label` (case-insensitive), ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn fetch_by_category(&self, label: &str) -> Result<Vec<Question>, StorageError>;

    /// Categories with question counts, ordered by display name.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn list_categories(&self) -> Result<Vec<CategorySummary>, StorageError>;
}

/// Write-once destination for finished results.
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Persist the whole result and return it with its assigned identity.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if nothing could be written.
    async fn persist(&self, result: &ScoredResult) -> Result<ScoredResult, StorageError>;
}

/// Lookup of previously persisted results.
#[async_trait]
pub trait ResultHistory: Send + Sync {
    /// Fetch a result by identity.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_result(&self, id: ResultId) -> Result<ScoredResult, StorageError>;

    /// Most recent results first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn list_results(&self, limit: u32) -> Result<Vec<ScoredResult>, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
///
/// Results are kept as their JSON boundary form and re-validated on every
/// read, the same as the `SQLite` adapter.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    questions: Arc<Mutex<Vec<Question>>>,
    results: Arc<Mutex<Vec<String>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a repository pre-loaded with `questions`.
    #[must_use]
    pub fn with_questions(questions: impl IntoIterator<Item = Question>) -> Self {
        let mut sorted: Vec<Question> = questions.into_iter().collect();
        sorted.sort_by_key(Question::id);
        sorted.dedup_by_key(|q| q.id());
        Self {
            questions: Arc::new(Mutex::new(sorted)),
            results: Arc::default(),
        }
    }

    /// Insert or replace a question by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn upsert_question(&self, question: Question) -> Result<(), StorageError> {
        let mut guard = self
            .questions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        match guard.binary_search_by_key(&question.id(), Question::id) {
            Ok(pos) => guard[pos] = question,
            Err(pos) => guard.insert(pos, question),
        }
        Ok(())
    }

    fn stored_results(&self) -> Result<Vec<ScoredResult>, StorageError> {
        let guard = self
            .results
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard
            .iter()
            .map(|raw| {
                ScoredResult::from_json(raw)
                    .map_err(|e| StorageError::Serialization(e.to_string()))
            })
            .collect()
    }

    fn questions_where(
        &self,
        pred: impl Fn(&Question) -> bool,
    ) -> Result<Vec<Question>, StorageError> {
        let guard = self
            .questions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.iter().filter(|q| pred(q)).cloned().collect())
    }
}

#[async_trait]
impl QuestionSource for InMemoryRepository {
    async fn fetch_all(&self) -> Result<Vec<Question>, StorageError> {
        self.questions_where(|_| true)
    }

    async fn fetch_by_category(&self, label: &str) -> Result<Vec<Question>, StorageError> {
        self.questions_where(|q| q.category().eq_ignore_ascii_case(label))
    }

    async fn list_categories(&self) -> Result<Vec<CategorySummary>, StorageError> {
        let guard = self
            .questions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut counts: Vec<(String, u32)> = Vec::new();
        for q in guard.iter() {
            match counts.iter_mut().find(|(label, _)| label == q.category()) {
                Some((_, count)) => *count += 1,
                None => counts.push((q.category().to_owned(), 1)),
            }
        }
        counts.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(counts
            .iter()
            .map(|(label, count)| CategorySummary::from_label(label, *count))
            .collect())
    }
}

#[async_trait]
impl ResultSink for InMemoryRepository {
    async fn persist(&self, result: &ScoredResult) -> Result<ScoredResult, StorageError> {
        let mut guard = self
            .results
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let next = u64::try_from(guard.len())
            .map_err(|_| StorageError::Serialization("result id overflow".into()))?
            + 1;
        let stored = result.clone().with_id(ResultId::new(next));
        let raw = stored
            .to_json()
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        guard.push(raw);
        Ok(stored)
    }
}

#[async_trait]
impl ResultHistory for InMemoryRepository {
    async fn get_result(&self, id: ResultId) -> Result<ScoredResult, StorageError> {
        self.stored_results()?
            .into_iter()
            .find(|r| r.id() == Some(id))
            .ok_or(StorageError::NotFound)
    }

    async fn list_results(&self, limit: u32) -> Result<Vec<ScoredResult>, StorageError> {
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        let mut out = self.stored_results()?;
        out.sort_by(|a, b| {
            b.completed_at()
                .cmp(&a.completed_at())
                .then(b.id().cmp(&a.id()))
        });
        out.truncate(limit);
        Ok(out)
    }
}

/// Aggregates the question source and result stores behind trait objects.
///
/// Constructed once and handed to services; there is no global instance.
#[derive(Clone)]
pub struct Storage {
    pub questions: Arc<dyn QuestionSource>,
    pub results: Arc<dyn ResultSink>,
    pub history: Arc<dyn ResultHistory>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_in_memory(InMemoryRepository::new())
    }

    #[must_use]
    pub fn from_in_memory(repo: InMemoryRepository) -> Self {
        let questions: Arc<dyn QuestionSource> = Arc::new(repo.clone());
        let results: Arc<dyn ResultSink> = Arc::new(repo.clone());
        let history: Arc<dyn ResultHistory> = Arc::new(repo);
        Self {
            questions,
            results,
            history,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{Difficulty, QuestionId, QuestionResult};
    use quiz_core::time::fixed_now;

    fn build_question(id: u64, category: &str) -> Question {
        Question::new(
            QuestionId::new(id),
            format!("Question {id}"),
            vec!["A".into(), "B".into()],
            "A",
            category,
            Difficulty::Easy,
        )
        .unwrap()
    }

    fn build_result(score_first: bool) -> ScoredResult {
        ScoredResult::from_question_results(
            "all",
            30,
            fixed_now(),
            vec![QuestionResult {
                question_id: QuestionId::new(1),
                question_text: "Question 1".into(),
                user_answer: "A".into(),
                correct_answer: "A".into(),
                is_correct: score_first,
                time_spent: 3,
                skipped: false,
                category: "math".into(),
            }],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn filters_by_category_case_insensitively() {
        let repo = InMemoryRepository::with_questions(vec![
            build_question(2, "Science"),
            build_question(1, "History"),
            build_question(3, "science"),
        ]);

        let science = repo.fetch_by_category("SCIENCE").await.unwrap();
        let ids: Vec<_> = science.iter().map(|q| q.id().value()).collect();
        assert_eq!(ids, vec![2, 3]);

        let all = repo.fetch_all().await.unwrap();
        assert_eq!(all[0].id(), QuestionId::new(1));
    }

    #[tokio::test]
    async fn lists_categories_with_counts() {
        let repo = InMemoryRepository::with_questions(vec![
            build_question(1, "World History"),
            build_question(2, "Math"),
            build_question(3, "Math"),
        ]);

        let categories = repo.list_categories().await.unwrap();
        assert_eq!(
            categories,
            vec![
                CategorySummary::from_label("Math", 2),
                CategorySummary::from_label("World History", 1),
            ]
        );
        assert_eq!(categories[1].id, "world-history");
    }

    #[tokio::test]
    async fn persist_assigns_sequential_ids() {
        let repo = InMemoryRepository::new();
        let first = repo.persist(&build_result(true)).await.unwrap();
        let second = repo.persist(&build_result(false)).await.unwrap();

        assert_eq!(first.id(), Some(ResultId::new(1)));
        assert_eq!(second.id(), Some(ResultId::new(2)));
        assert_eq!(repo.get_result(ResultId::new(1)).await.unwrap(), first);

        let recent = repo.list_results(1).await.unwrap();
        assert_eq!(recent, vec![second]);
    }

    #[tokio::test]
    async fn missing_result_is_not_found() {
        let repo = InMemoryRepository::new();
        let err = repo.get_result(ResultId::new(9)).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound));
    }

    #[tokio::test]
    async fn tampered_stored_result_is_rejected_on_read() {
        let repo = InMemoryRepository::new();
        repo.persist(&build_result(true)).await.unwrap();
        {
            let mut guard = repo.results.lock().unwrap();
            guard[0] = guard[0].replace("\"score\":1", "\"score\":2");
        }

        let err = repo.get_result(ResultId::new(1)).await.unwrap_err();
        assert!(matches!(err, StorageError::Serialization(_)));
        assert!(repo.list_results(5).await.is_err());
    }

    #[test]
    fn upsert_replaces_by_id() {
        let repo = InMemoryRepository::new();
        repo.upsert_question(build_question(1, "a")).unwrap();
        repo.upsert_question(build_question(1, "b")).unwrap();
        let guard = repo.questions.lock().unwrap();
        assert_eq!(guard.len(), 1);
        assert_eq!(guard[0].category(), "b");
    }

    #[test]
    fn slug_collapses_separators() {
        assert_eq!(slugify("  Art & Design "), "art-design");
    }
}
