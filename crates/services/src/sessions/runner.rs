use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::Instrument;
use uuid::Uuid;

use quiz_core::ClockEvent;
use quiz_core::model::{AnswerRecord, Question, QuestionId, ScoredResult};

use super::engine::{QuizSession, SessionPhase};
use super::progress::SessionProgress;
use super::workflow::{QuizLoopService, SubmitOutcome};
use crate::error::QuizError;

const TICK_PERIOD: Duration = Duration::from_secs(1);
const COMMAND_BUFFER: usize = 32;

/// Notifications pushed by a running session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// One second elapsed on an active session.
    Tick(SessionProgress),
    /// The current question ran past its expected time.
    QuestionOverBudget { index: usize },
    /// The session clock reached zero; a forced submit follows.
    Expired,
    /// A result was persisted, either by request or on expiry.
    Submitted(ScoredResult),
    /// The sink rejected the result; submitting again retries it.
    PersistFailed { reason: String },
}

/// Point-in-time view of the session for display.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    /// Stable for the runner's lifetime; matches the `quiz_session` span.
    pub session_id: Uuid,
    pub progress: SessionProgress,
    pub topic: String,
    pub current: Option<Question>,
    pub current_record: Option<AnswerRecord>,
    pub result: Option<ScoredResult>,
}

#[derive(Debug, Clone, Copy)]
enum Navigation {
    Next,
    Previous,
    To(usize),
}

enum Command {
    Answer {
        question_id: QuestionId,
        answer: String,
        time_spent: u32,
        reply: oneshot::Sender<bool>,
    },
    Skip {
        question_id: QuestionId,
        time_spent: u32,
        reply: oneshot::Sender<bool>,
    },
    AnswerCurrent {
        answer: String,
        reply: oneshot::Sender<bool>,
    },
    SkipCurrent {
        reply: oneshot::Sender<bool>,
    },
    Navigate {
        to: Navigation,
        reply: oneshot::Sender<bool>,
    },
    Submit {
        reply: oneshot::Sender<Result<SubmitOutcome, QuizError>>,
    },
    Retake {
        reply: oneshot::Sender<Result<bool, QuizError>>,
    },
    ChangeCategory {
        category: Option<String>,
        reply: oneshot::Sender<Result<bool, QuizError>>,
    },
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    Close,
}

/// Cloneable handle for sending commands to a running session.
///
/// Every call fails with `QuizError::SessionClosed` once the runner task
/// has stopped.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
}

impl SessionHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, QuizError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| QuizError::SessionClosed)?;
        rx.await.map_err(|_| QuizError::SessionClosed)
    }

    /// # Errors
    ///
    /// Returns `QuizError::SessionClosed` if the runner has stopped.
    pub async fn answer(
        &self,
        question_id: QuestionId,
        answer: impl Into<String>,
        time_spent: u32,
    ) -> Result<bool, QuizError> {
        let answer = answer.into();
        self.request(|reply| Command::Answer {
            question_id,
            answer,
            time_spent,
            reply,
        })
        .await
    }

    /// # Errors
    ///
    /// Returns `QuizError::SessionClosed` if the runner has stopped.
    pub async fn skip(&self, question_id: QuestionId, time_spent: u32) -> Result<bool, QuizError> {
        self.request(|reply| Command::Skip {
            question_id,
            time_spent,
            reply,
        })
        .await
    }

    /// Answer the displayed question, timed by its question clock.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::SessionClosed` if the runner has stopped.
    pub async fn answer_current(&self, answer: impl Into<String>) -> Result<bool, QuizError> {
        let answer = answer.into();
        self.request(|reply| Command::AnswerCurrent { answer, reply })
            .await
    }

    /// # Errors
    ///
    /// Returns `QuizError::SessionClosed` if the runner has stopped.
    pub async fn skip_current(&self) -> Result<bool, QuizError> {
        self.request(|reply| Command::SkipCurrent { reply }).await
    }

    /// # Errors
    ///
    /// Returns `QuizError::SessionClosed` if the runner has stopped.
    pub async fn next(&self) -> Result<bool, QuizError> {
        self.navigate(Navigation::Next).await
    }

    /// # Errors
    ///
    /// Returns `QuizError::SessionClosed` if the runner has stopped.
    pub async fn previous(&self) -> Result<bool, QuizError> {
        self.navigate(Navigation::Previous).await
    }

    /// # Errors
    ///
    /// Returns `QuizError::SessionClosed` if the runner has stopped.
    pub async fn go_to(&self, index: usize) -> Result<bool, QuizError> {
        self.navigate(Navigation::To(index)).await
    }

    async fn navigate(&self, to: Navigation) -> Result<bool, QuizError> {
        self.request(|reply| Command::Navigate { to, reply }).await
    }

    /// Submit, or retry a failed persist.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::PersistFailed` if the sink rejects the result, or
    /// `QuizError::SessionClosed` if the runner has stopped.
    pub async fn submit(&self) -> Result<SubmitOutcome, QuizError> {
        self.request(|reply| Command::Submit { reply }).await?
    }

    /// # Errors
    ///
    /// Returns `QuizError::EmptyPool` or `QuizError::SessionClosed`.
    pub async fn retake(&self) -> Result<bool, QuizError> {
        self.request(|reply| Command::Retake { reply }).await?
    }

    /// Reload the session from another category.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::EmptyPool` when the category has no questions; the
    /// session is then left in `Loading`.
    pub async fn change_category(&self, category: Option<String>) -> Result<bool, QuizError> {
        self.request(|reply| Command::ChangeCategory { category, reply })
            .await?
    }

    /// # Errors
    ///
    /// Returns `QuizError::SessionClosed` if the runner has stopped.
    pub async fn snapshot(&self) -> Result<SessionSnapshot, QuizError> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// Stop the runner task. Pending commands queued before this are served.
    pub async fn close(&self) {
        let _ = self.commands.send(Command::Close).await;
    }
}

/// A spawned session: its command handle, event stream, and task.
pub struct RunningSession {
    pub handle: SessionHandle,
    pub events: mpsc::UnboundedReceiver<SessionEvent>,
    pub task: JoinHandle<()>,
}

/// Owns a `QuizSession` on a tokio task and drives its clocks.
///
/// Commands and the one-second tick are merged into a single queue, so a
/// forced submit on expiry and a user submit are serialized and only one of
/// them scores the session.
pub struct SessionRunner {
    service: QuizLoopService,
    session: QuizSession,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl SessionRunner {
    /// Spawn a runner for an already started session.
    #[must_use]
    pub fn spawn(service: QuizLoopService, session: QuizSession) -> RunningSession {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let span = tracing::info_span!("quiz_session", session_id = %session.id());
        let runner = Self {
            service,
            session,
            events: events_tx,
        };
        let task = tokio::spawn(runner.run(commands_rx).instrument(span));
        RunningSession {
            handle: SessionHandle {
                commands: commands_tx,
            },
            events: events_rx,
            task,
        }
    }

    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        let mut ticker = time::interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!("session runner started");

        loop {
            let active = self.session.phase() == SessionPhase::Active;
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Close) | None => break,
                    Some(command) => {
                        if self.handle(command).await {
                            ticker.reset();
                        }
                    }
                },
                _ = ticker.tick(), if active => self.on_tick().await,
            }
        }

        tracing::info!(phase = ?self.session.phase(), "session runner stopped");
    }

    /// Returns true when the session was (re)activated and the tick
    /// schedule should restart.
    async fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::Answer {
                question_id,
                answer,
                time_spent,
                reply,
            } => {
                let _ = reply.send(self.session.answer(question_id, answer, time_spent));
            }
            Command::Skip {
                question_id,
                time_spent,
                reply,
            } => {
                let _ = reply.send(self.session.skip(question_id, time_spent));
            }
            Command::AnswerCurrent { answer, reply } => {
                let _ = reply.send(self.session.answer_current(answer));
            }
            Command::SkipCurrent { reply } => {
                let _ = reply.send(self.session.skip_current());
            }
            Command::Navigate { to, reply } => {
                let moved = match to {
                    Navigation::Next => self.session.go_to_next(),
                    Navigation::Previous => self.session.go_to_previous(),
                    Navigation::To(index) => self.session.go_to(index),
                };
                let _ = reply.send(moved);
            }
            Command::Submit { reply } => {
                let outcome = self.submit().await;
                let _ = reply.send(outcome);
            }
            Command::Retake { reply } => {
                let restarted = self.service.retake(&mut self.session);
                let activated = matches!(restarted, Ok(true));
                let _ = reply.send(restarted);
                return activated;
            }
            Command::ChangeCategory { category, reply } => {
                self.session.change_category(category);
                let loaded = self.service.load(&mut self.session).await;
                let activated = matches!(loaded, Ok(true));
                let _ = reply.send(loaded);
                return activated;
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            Command::Close => {}
        }
        false
    }

    async fn on_tick(&mut self) {
        let clock_events = self.session.tick();
        self.emit(SessionEvent::Tick(self.session.progress()));

        for event in clock_events {
            match event {
                ClockEvent::QuestionOverBudget => {
                    let index = self.session.current_index();
                    tracing::debug!(index, "question over budget");
                    self.emit(SessionEvent::QuestionOverBudget { index });
                }
                ClockEvent::SessionExpired => {
                    tracing::info!(
                        unanswered = self.session.unanswered_count(),
                        "session time expired; forcing submit"
                    );
                    self.emit(SessionEvent::Expired);
                    // Failures are already reported through the event stream.
                    let _ = self.submit().await;
                }
            }
        }
    }

    async fn submit(&mut self) -> Result<SubmitOutcome, QuizError> {
        let outcome = self.service.submit(&mut self.session).await;
        match &outcome {
            Ok(SubmitOutcome::Persisted(result)) => {
                self.emit(SessionEvent::Submitted(result.clone()));
            }
            Ok(SubmitOutcome::Ignored(_)) => {}
            Err(err) => self.emit(SessionEvent::PersistFailed {
                reason: err.to_string(),
            }),
        }
        outcome
    }

    fn snapshot(&self) -> SessionSnapshot {
        let current = self.session.current_question().cloned();
        let current_record = current
            .as_ref()
            .and_then(|q| self.session.record_for(q.id()).cloned());
        SessionSnapshot {
            session_id: self.session.id(),
            progress: self.session.progress(),
            topic: self.session.topic(),
            current,
            current_record,
            result: self.session.result().cloned(),
        }
    }

    fn emit(&self, event: SessionEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!("event receiver dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use quiz_core::Clock;
    use quiz_core::model::{Difficulty, QuizSettings};
    use quiz_core::time::fixed_now;
    use storage::repository::{InMemoryRepository, ResultHistory};

    use crate::question_bank::QuestionBank;

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

    async fn spawn_with(
        repo: &InMemoryRepository,
        settings: QuizSettings,
    ) -> RunningSession {
        let service = QuizLoopService::new(
            Clock::fixed(fixed_now()),
            QuestionBank::new(Arc::new(repo.clone())),
            Arc::new(repo.clone()),
        )
        .with_settings(settings);
        let session = service.start_session(None).await.unwrap();
        SessionRunner::spawn(service, session)
    }

    async fn next_submitted(events: &mut mpsc::UnboundedReceiver<SessionEvent>) -> ScoredResult {
        loop {
            match events.recv().await {
                Some(SessionEvent::Submitted(result)) => return result,
                Some(_) => {}
                None => panic!("event stream closed"),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn scenario_c_expiry_forces_submit() {
        let repo = InMemoryRepository::with_questions((1..=3).map(build_question));
        let settings = QuizSettings::new(10, 3, 60).unwrap();
        let RunningSession {
            handle, mut events, ..
        } = spawn_with(&repo, settings).await;

        assert!(handle.answer_current("yes").await.unwrap());

        let mut ticks = 0;
        let mut expired = false;
        let result = loop {
            match events.recv().await.unwrap() {
                SessionEvent::Tick(_) => ticks += 1,
                SessionEvent::Expired => expired = true,
                SessionEvent::Submitted(result) => break result,
                other => panic!("unexpected event {other:?}"),
            }
        };

        assert_eq!(ticks, 3);
        assert!(expired);
        assert_eq!(result.score(), 1);
        assert_eq!(result.total_questions(), 3);
        let unanswered: Vec<_> = result
            .question_results()
            .iter()
            .filter(|r| r.user_answer.is_empty())
            .collect();
        assert_eq!(unanswered.len(), 2);
        assert!(unanswered.iter().all(|r| !r.is_correct && !r.skipped));

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.progress.phase, SessionPhase::Submitted);
        assert_eq!(snapshot.result, Some(result));
    }

    #[tokio::test(start_paused = true)]
    async fn submit_after_expiry_is_ignored() {
        let repo = InMemoryRepository::with_questions((1..=2).map(build_question));
        let settings = QuizSettings::new(10, 2, 60).unwrap();
        let RunningSession {
            handle, mut events, ..
        } = spawn_with(&repo, settings).await;

        next_submitted(&mut events).await;
        let outcome = handle.submit().await.unwrap();
        assert_eq!(outcome, SubmitOutcome::Ignored(SessionPhase::Submitted));
        assert_eq!(repo.list_results(10).await.unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn user_submit_stops_ticks() {
        let repo = InMemoryRepository::with_questions((1..=2).map(build_question));
        let RunningSession {
            handle, mut events, ..
        } = spawn_with(&repo, QuizSettings::default()).await;

        let outcome = handle.submit().await.unwrap();
        assert!(matches!(outcome, SubmitOutcome::Persisted(_)));
        next_submitted(&mut events).await;

        time::sleep(Duration::from_secs(5)).await;
        assert!(events.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn question_over_budget_is_reported() {
        let repo = InMemoryRepository::with_questions((1..=2).map(build_question));
        let settings = QuizSettings::new(10, 100, 2).unwrap();
        let RunningSession {
            handle: _handle,
            mut events,
            ..
        } = spawn_with(&repo, settings).await;

        let index = loop {
            if let SessionEvent::QuestionOverBudget { index } = events.recv().await.unwrap() {
                break index;
            }
        };
        assert_eq!(index, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn navigation_through_handle() {
        let repo = InMemoryRepository::with_questions((1..=3).map(build_question));
        let RunningSession { handle, .. } = spawn_with(&repo, QuizSettings::default()).await;

        assert!(!handle.previous().await.unwrap());
        assert!(handle.next().await.unwrap());
        assert!(handle.go_to(2).await.unwrap());
        assert!(!handle.go_to(3).await.unwrap());
        assert!(handle.skip_current().await.unwrap());

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.progress.current_index, 2);
        assert_eq!(snapshot.progress.answered, 1);
        assert!(snapshot.current_record.unwrap().skipped);
    }

    #[tokio::test(start_paused = true)]
    async fn retake_restarts_the_clock() {
        let repo = InMemoryRepository::with_questions((1..=2).map(build_question));
        let RunningSession {
            handle, mut events, ..
        } = spawn_with(&repo, QuizSettings::default()).await;

        let before = handle.snapshot().await.unwrap().session_id;
        handle.submit().await.unwrap();
        next_submitted(&mut events).await;
        assert!(handle.retake().await.unwrap());
        assert_eq!(handle.snapshot().await.unwrap().session_id, before);

        match events.recv().await.unwrap() {
            SessionEvent::Tick(progress) => {
                assert_eq!(progress.phase, SessionPhase::Active);
                assert_eq!(progress.remaining_secs, 899);
                assert_eq!(progress.answered, 0);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn closed_runner_rejects_commands() {
        let repo = InMemoryRepository::with_questions((1..=2).map(build_question));
        let RunningSession { handle, task, .. } =
            spawn_with(&repo, QuizSettings::default()).await;

        handle.close().await;
        task.await.unwrap();
        let err = handle.snapshot().await.unwrap_err();
        assert!(matches!(err, QuizError::SessionClosed));
    }
}
