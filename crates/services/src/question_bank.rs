use std::sync::Arc;

use quiz_core::model::Question;
use storage::repository::{CategorySummary, QuestionSource};

/// Read side of the question store as seen by sessions.
///
/// Source faults are logged and collapse to an empty collection; an empty
/// pool then fails session start with `QuizError::EmptyPool`.
#[derive(Clone)]
pub struct QuestionBank {
    source: Arc<dyn QuestionSource>,
}

impl QuestionBank {
    #[must_use]
    pub fn new(source: Arc<dyn QuestionSource>) -> Self {
        Self { source }
    }

    /// Questions for `category`, or the whole bank when `None`.
    pub async fn pool(&self, category: Option<&str>) -> Vec<Question> {
        let fetched = match category {
            Some(label) => self.source.fetch_by_category(label).await,
            None => self.source.fetch_all().await,
        };
        match fetched {
            Ok(questions) => {
                tracing::debug!(?category, count = questions.len(), "question pool loaded");
                questions
            }
            Err(err) => {
                tracing::warn!(?category, error = %err, "question source failed");
                Vec::new()
            }
        }
    }

    pub async fn categories(&self) -> Vec<CategorySummary> {
        match self.source.list_categories().await {
            Ok(categories) => categories,
            Err(err) => {
                tracing::warn!(error = %err, "listing categories failed");
                Vec::new()
            }
        }
    }
}
