use std::sync::Arc;

use quiz_core::Clock;
use quiz_core::model::{QuizSettings, ScoredResult};
use storage::repository::ResultSink;

use super::engine::{QuizSession, SessionPhase, SubmitAttempt};
use crate::error::QuizError;
use crate::question_bank::QuestionBank;

/// Result of asking a session to submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The result was scored (or retried) and acknowledged by the sink.
    Persisted(ScoredResult),
    /// Nothing happened; the session was in this phase.
    Ignored(SessionPhase),
}

/// Orchestrates session start, persisted submit, and retake.
#[derive(Clone)]
pub struct QuizLoopService {
    clock: Clock,
    bank: QuestionBank,
    sink: Arc<dyn ResultSink>,
    settings: QuizSettings,
}

impl QuizLoopService {
    #[must_use]
    pub fn new(clock: Clock, bank: QuestionBank, sink: Arc<dyn ResultSink>) -> Self {
        Self {
            clock,
            bank,
            sink,
            settings: QuizSettings::default(),
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: QuizSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn settings(&self) -> &QuizSettings {
        &self.settings
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }

    #[must_use]
    pub fn bank(&self) -> &QuestionBank {
        &self.bank
    }

    /// Load the pool for `category` and start a new session.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::EmptyPool` when the category has no questions or
    /// the question source is unavailable.
    pub async fn start_session(&self, category: Option<String>) -> Result<QuizSession, QuizError> {
        let mut session = QuizSession::new(self.settings, category);
        self.load(&mut session).await?;
        Ok(session)
    }

    /// Fill a `Loading` session from the bank and activate it.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::EmptyPool` when no questions are available.
    pub async fn load(&self, session: &mut QuizSession) -> Result<bool, QuizError> {
        let pool = self.bank.pool(session.category()).await;
        session.start(pool, self.settings.session_size(), self.clock.now())
    }

    /// Score the session (once) and persist the result.
    ///
    /// On sink failure the session stays in `Submitting` with its result
    /// kept, and calling `submit` again retries the same result.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::PersistFailed` when the sink rejects the write.
    pub async fn submit(&self, session: &mut QuizSession) -> Result<SubmitOutcome, QuizError> {
        let result = match session.begin_submit(self.clock.now())? {
            SubmitAttempt::Persist(result) => result,
            SubmitAttempt::Ignored(phase) => {
                tracing::debug!(session_id = %session.id(), ?phase, "submit ignored");
                return Ok(SubmitOutcome::Ignored(phase));
            }
        };

        match self.sink.persist(&result).await {
            Ok(persisted) => {
                tracing::info!(
                    session_id = %session.id(),
                    result_id = ?persisted.id(),
                    "quiz result persisted"
                );
                session.complete_submit(persisted.clone());
                Ok(SubmitOutcome::Persisted(persisted))
            }
            Err(err) => {
                tracing::warn!(session_id = %session.id(), error = %err, "persisting quiz result failed");
                session.fail_submit();
                Err(QuizError::PersistFailed(err))
            }
        }
    }

    /// Start over on a submitted session with a fresh draw.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::EmptyPool` if the retained pool is empty.
    pub fn retake(&self, session: &mut QuizSession) -> Result<bool, QuizError> {
        session.retake(self.clock.now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{Difficulty, Question, QuestionId};
    use quiz_core::time::fixed_now;
    use storage::repository::{InMemoryRepository, ResultHistory};

    fn build_question(id: u64) -> Question {
        Question::new(
            QuestionId::new(id),
            format!("Q{id}"),
            vec!["yes".into(), "no".into()],
            "yes",
            "General",
            Difficulty::Easy,
        )
        .unwrap()
    }

    fn service_with(repo: &InMemoryRepository) -> QuizLoopService {
        QuizLoopService::new(
            Clock::fixed(fixed_now()),
            QuestionBank::new(Arc::new(repo.clone())),
            Arc::new(repo.clone()),
        )
    }

    #[tokio::test]
    async fn scenario_a_small_pool_gives_all_questions() {
        let repo = InMemoryRepository::with_questions((1..=3).map(build_question));
        let service = service_with(&repo);

        let session = service.start_session(None).await.unwrap();
        assert_eq!(session.questions().len(), 3);
        let mut ids: Vec<_> = session.questions().iter().map(Question::id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 3);
    }

    #[tokio::test]
    async fn empty_category_cannot_start() {
        let repo = InMemoryRepository::with_questions((1..=3).map(build_question));
        let service = service_with(&repo);
        let err = service
            .start_session(Some("Astronomy".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, QuizError::EmptyPool));
    }

    #[tokio::test]
    async fn submit_persists_once() {
        let repo = InMemoryRepository::with_questions((1..=2).map(build_question));
        let service = service_with(&repo);
        let mut session = service.start_session(None).await.unwrap();
        session.answer_current("yes");

        let SubmitOutcome::Persisted(result) = service.submit(&mut session).await.unwrap() else {
            panic!("expected a persisted result");
        };
        assert!(result.id().is_some());
        assert_eq!(result.score(), 1);
        assert_eq!(session.phase(), SessionPhase::Submitted);

        let again = service.submit(&mut session).await.unwrap();
        assert_eq!(again, SubmitOutcome::Ignored(SessionPhase::Submitted));
        assert_eq!(repo.list_results(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn retake_after_submit_restarts() {
        let repo = InMemoryRepository::with_questions((1..=4).map(build_question));
        let service = service_with(&repo);
        let mut session = service.start_session(None).await.unwrap();
        service.submit(&mut session).await.unwrap();

        assert!(service.retake(&mut session).unwrap());
        assert_eq!(session.phase(), SessionPhase::Active);
        assert_eq!(session.count_answered(), 0);
        assert_eq!(session.questions().len(), 4);
    }

    #[tokio::test]
    async fn change_category_then_load() {
        let repo = InMemoryRepository::with_questions((1..=4).map(build_question));
        let service = service_with(&repo);
        let mut session = service.start_session(None).await.unwrap();

        session.change_category(Some("general".into()));
        assert_eq!(session.phase(), SessionPhase::Loading);
        assert!(service.load(&mut session).await.unwrap());
        assert_eq!(session.phase(), SessionPhase::Active);
        assert_eq!(session.topic(), "general");
    }
}
