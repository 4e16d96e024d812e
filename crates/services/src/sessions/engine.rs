use chrono::{DateTime, Utc};
use rand::Rng;
use std::fmt;
use uuid::Uuid;

use quiz_core::model::{
    AnswerLedger, AnswerRecord, Question, QuestionId, QuizSettings, ScoredResult, topic_label,
};
use quiz_core::timing::{ClockEvent, QuestionClock, SessionClock};

use super::progress::SessionProgress;
use super::selector::{SessionQuestionSet, select_with_rng};
use crate::error::QuizError;

//
// ─── PHASE ─────────────────────────────────────────────────────────────────────
//

/// Externally visible lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Loading,
    Active,
    Submitting,
    Submitted,
}

#[derive(Debug, Clone)]
enum Phase {
    Loading,
    Active,
    /// The scored result is kept so a retry persists it unchanged.
    Submitting {
        result: ScoredResult,
        in_flight: bool,
    },
    Submitted {
        result: ScoredResult,
    },
}

/// What the caller should do after `begin_submit`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitAttempt {
    /// Hand this result to the sink, then call `complete_submit` or `fail_submit`.
    Persist(ScoredResult),
    /// The call was a no-op in the current phase.
    Ignored(SessionPhase),
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// In-memory quiz session: question set, ledger, clocks and submit state.
///
/// Every mutation goes through `&mut self`, so a session has a single owner.
/// Calls made in the wrong phase, and navigation outside the set, are
/// absorbed as no-ops and reported through their `bool` return.
///
/// The session id is fixed at construction and survives retakes, so every
/// attempt of one session logs under the same id.
pub struct QuizSession {
    id: Uuid,
    settings: QuizSettings,
    category: Option<String>,
    pool: Vec<Question>,
    /// Requested set size from the last `start`; retakes draw the same size.
    size: usize,
    questions: SessionQuestionSet,
    current: usize,
    ledger: AnswerLedger,
    started_at: Option<DateTime<Utc>>,
    session_clock: SessionClock,
    question_clock: QuestionClock,
    phase: Phase,
}

impl QuizSession {
    /// Create a session in `Loading`, waiting for a pool.
    #[must_use]
    pub fn new(settings: QuizSettings, category: Option<String>) -> Self {
        let mut session_clock = SessionClock::new(settings.session_budget_secs());
        let mut question_clock = QuestionClock::new(settings.question_budget_secs());
        session_clock.stop();
        question_clock.stop();
        Self {
            id: Uuid::new_v4(),
            settings,
            category,
            pool: Vec::new(),
            size: settings.session_size(),
            questions: SessionQuestionSet::default(),
            current: 0,
            ledger: AnswerLedger::new(),
            started_at: None,
            session_clock,
            question_clock,
            phase: Phase::Loading,
        }
    }

    /// Loading → Active using the thread RNG.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::EmptyPool` if `pool` is empty; the session stays in `Loading`.
    pub fn start(
        &mut self,
        pool: Vec<Question>,
        size: usize,
        started_at: DateTime<Utc>,
    ) -> Result<bool, QuizError> {
        self.start_with_rng(pool, size, started_at, &mut rand::rng())
    }

    /// Loading → Active, drawing the question set with `rng`.
    ///
    /// Returns `Ok(false)` when the session is not in `Loading`.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::EmptyPool` if `pool` is empty; the session stays in `Loading`.
    pub fn start_with_rng<R: Rng + ?Sized>(
        &mut self,
        pool: Vec<Question>,
        size: usize,
        started_at: DateTime<Utc>,
        rng: &mut R,
    ) -> Result<bool, QuizError> {
        if !matches!(self.phase, Phase::Loading) {
            tracing::debug!(session_id = %self.id, phase = ?self.phase(), "start ignored");
            return Ok(false);
        }
        let questions = select_with_rng(&pool, size, rng)?;
        self.pool = pool;
        self.size = size;
        self.activate(questions, started_at);
        tracing::info!(
            session_id = %self.id,
            topic = %self.topic(),
            questions = self.questions.len(),
            "quiz session started"
        );
        Ok(true)
    }

    /// Submitted → Active with a fresh draw from the same pool.
    ///
    /// Returns `Ok(false)` when the session has not been submitted.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::EmptyPool` if the retained pool is empty.
    pub fn retake_with_rng<R: Rng + ?Sized>(
        &mut self,
        started_at: DateTime<Utc>,
        rng: &mut R,
    ) -> Result<bool, QuizError> {
        if !matches!(self.phase, Phase::Submitted { .. }) {
            tracing::debug!(session_id = %self.id, phase = ?self.phase(), "retake ignored");
            return Ok(false);
        }
        let questions = select_with_rng(&self.pool, self.size, rng)?;
        self.activate(questions, started_at);
        tracing::info!(session_id = %self.id, topic = %self.topic(), "quiz retake started");
        Ok(true)
    }

    /// Submitted → Active using the thread RNG.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::EmptyPool` if the retained pool is empty.
    pub fn retake(&mut self, started_at: DateTime<Utc>) -> Result<bool, QuizError> {
        self.retake_with_rng(started_at, &mut rand::rng())
    }

    /// Switch the category filter and drop back to `Loading`.
    ///
    /// The question set, ledger and any pending result are discarded.
    pub fn change_category(&mut self, category: Option<String>) {
        tracing::debug!(session_id = %self.id, ?category, "category changed");
        self.category = category;
        self.pool.clear();
        self.questions = SessionQuestionSet::default();
        self.current = 0;
        self.ledger.clear();
        self.started_at = None;
        self.session_clock.stop();
        self.question_clock.stop();
        self.phase = Phase::Loading;
    }

    fn activate(&mut self, questions: SessionQuestionSet, started_at: DateTime<Utc>) {
        self.questions = questions;
        self.current = 0;
        self.ledger.clear();
        self.started_at = Some(started_at);
        self.session_clock = SessionClock::new(self.settings.session_budget_secs());
        self.question_clock = QuestionClock::new(self.settings.question_budget_secs());
        self.phase = Phase::Active;
    }

    // ── Answers ──────────────────────────────────────────────────────

    /// Record an answer for any question in the set.
    pub fn answer(
        &mut self,
        question_id: QuestionId,
        answer: impl Into<String>,
        time_spent: u32,
    ) -> bool {
        self.write_record(question_id, AnswerRecord::answered(answer, time_spent))
    }

    /// Mark a question skipped, overwriting any earlier answer.
    pub fn skip(&mut self, question_id: QuestionId, time_spent: u32) -> bool {
        self.write_record(question_id, AnswerRecord::skipped(time_spent))
    }

    /// Answer the current question, timed by the question clock.
    pub fn answer_current(&mut self, answer: impl Into<String>) -> bool {
        match self.current_question().map(Question::id) {
            Some(id) => self.answer(id, answer, self.question_clock.elapsed_secs()),
            None => false,
        }
    }

    /// Skip the current question, timed by the question clock.
    pub fn skip_current(&mut self) -> bool {
        match self.current_question().map(Question::id) {
            Some(id) => self.skip(id, self.question_clock.elapsed_secs()),
            None => false,
        }
    }

    fn write_record(&mut self, question_id: QuestionId, record: AnswerRecord) -> bool {
        if !matches!(self.phase, Phase::Active) || !self.questions.contains(question_id) {
            tracing::debug!(session_id = %self.id, %question_id, "answer ignored");
            return false;
        }
        self.ledger
            .record(question_id, record.answer, record.time_spent, record.skipped);
        true
    }

    // ── Navigation ───────────────────────────────────────────────────

    pub fn go_to_next(&mut self) -> bool {
        self.go_to(self.current.saturating_add(1))
    }

    pub fn go_to_previous(&mut self) -> bool {
        match self.current.checked_sub(1) {
            Some(index) => self.go_to(index),
            None => false,
        }
    }

    /// Move to `index`. Out-of-range targets and the current index are no-ops.
    pub fn go_to(&mut self, index: usize) -> bool {
        if !matches!(self.phase, Phase::Active)
            || index >= self.questions.len()
            || index == self.current
        {
            return false;
        }
        self.current = index;
        self.question_clock.reset();
        tracing::debug!(session_id = %self.id, index, "navigated");
        true
    }

    // ── Timing ───────────────────────────────────────────────────────

    /// Advance both clocks by one second.
    ///
    /// A `ClockEvent::SessionExpired` in the result means the caller must
    /// submit now.
    pub fn tick(&mut self) -> Vec<ClockEvent> {
        if !matches!(self.phase, Phase::Active) {
            return Vec::new();
        }
        let mut events = Vec::new();
        events.extend(self.question_clock.tick());
        events.extend(self.session_clock.tick());
        events
    }

    // ── Submit ───────────────────────────────────────────────────────

    /// First half of submit: score (once) and hand out the result to persist.
    ///
    /// Scoring happens only on the Active → Submitting transition. A later
    /// call after a failed persist returns the same result for a retry. Calls
    /// while a persist is in flight, after `Submitted`, or in `Loading` are
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Result` if the scored result fails validation.
    pub fn begin_submit(&mut self, now: DateTime<Utc>) -> Result<SubmitAttempt, QuizError> {
        if matches!(self.phase, Phase::Active) {
            let started_at = self.started_at.unwrap_or(now);
            let result = quiz_core::score_session(
                self.questions.as_slice(),
                &self.ledger,
                &self.topic(),
                started_at,
                now,
            )?;
            self.session_clock.stop();
            self.question_clock.stop();
            tracing::info!(
                session_id = %self.id,
                score = result.score(),
                total = result.total_questions(),
                unanswered = self.unanswered_count(),
                "quiz scored"
            );
            self.phase = Phase::Submitting {
                result: result.clone(),
                in_flight: true,
            };
            return Ok(SubmitAttempt::Persist(result));
        }

        if let Phase::Submitting {
            result,
            in_flight: in_flight @ false,
        } = &mut self.phase
        {
            *in_flight = true;
            tracing::info!(session_id = %self.id, "retrying result persist");
            return Ok(SubmitAttempt::Persist(result.clone()));
        }

        Ok(SubmitAttempt::Ignored(self.phase()))
    }

    /// Second half of submit after the sink acknowledged the result.
    pub fn complete_submit(&mut self, persisted: ScoredResult) -> bool {
        if !matches!(self.phase, Phase::Submitting { .. }) {
            return false;
        }
        tracing::info!(session_id = %self.id, result_id = ?persisted.id(), "quiz submitted");
        self.phase = Phase::Submitted { result: persisted };
        true
    }

    /// Record a sink failure; the computed result stays available for retry.
    pub fn fail_submit(&mut self) -> bool {
        match &mut self.phase {
            Phase::Submitting { in_flight, .. } => {
                *in_flight = false;
                true
            }
            _ => false,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        match self.phase {
            Phase::Loading => SessionPhase::Loading,
            Phase::Active => SessionPhase::Active,
            Phase::Submitting { .. } => SessionPhase::Submitting,
            Phase::Submitted { .. } => SessionPhase::Submitted,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &QuizSettings {
        &self.settings
    }

    #[must_use]
    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    /// Category label, or the all-categories sentinel.
    #[must_use]
    pub fn topic(&self) -> String {
        topic_label(self.category.as_deref())
    }

    #[must_use]
    pub fn questions(&self) -> &SessionQuestionSet {
        &self.questions
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current)
    }

    #[must_use]
    pub fn record_for(&self, question_id: QuestionId) -> Option<&AnswerRecord> {
        self.ledger.get(question_id)
    }

    #[must_use]
    pub fn count_answered(&self) -> usize {
        self.ledger.count_answered()
    }

    /// Questions with neither an answer nor a skip.
    #[must_use]
    pub fn unanswered_count(&self) -> usize {
        self.questions.len().saturating_sub(self.ledger.count_answered())
    }

    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    #[must_use]
    pub fn remaining_secs(&self) -> u32 {
        self.session_clock.remaining_secs()
    }

    #[must_use]
    pub fn question_elapsed_secs(&self) -> u32 {
        self.question_clock.elapsed_secs()
    }

    /// Scored result: pending while `Submitting`, with identity once `Submitted`.
    #[must_use]
    pub fn result(&self) -> Option<&ScoredResult> {
        match &self.phase {
            Phase::Submitting { result, .. } | Phase::Submitted { result } => Some(result),
            Phase::Loading | Phase::Active => None,
        }
    }

    #[must_use]
    pub fn is_persist_pending(&self) -> bool {
        matches!(self.phase, Phase::Submitting { in_flight: false, .. })
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        SessionProgress {
            phase: self.phase(),
            total: self.questions.len(),
            answered: self.count_answered(),
            unanswered: self.unanswered_count(),
            current_index: self.current,
            remaining_secs: self.remaining_secs(),
            question_elapsed_secs: self.question_elapsed_secs(),
            question_percent_remaining: self.question_clock.percent_remaining(),
        }
    }
}

impl fmt::Debug for QuizSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuizSession")
            .field("id", &self.id)
            .field("phase", &self.phase())
            .field("category", &self.category)
            .field("questions_len", &self.questions.len())
            .field("current", &self.current)
            .field("answered", &self.ledger.count_answered())
            .field("remaining_secs", &self.session_clock.remaining_secs())
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{Difficulty, SKIPPED_ANSWER};
    use quiz_core::time::fixed_now;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn build_question(id: u64, correct: &str) -> Question {
        Question::new(
            QuestionId::new(id),
            format!("Q{id}"),
            vec![correct.to_owned(), "wrong".to_owned()],
            correct,
            "general",
            Difficulty::Easy,
        )
        .unwrap()
    }

    fn active_session(n: u64) -> QuizSession {
        let pool: Vec<_> = (1..=n).map(|id| build_question(id, "right")).collect();
        let mut session = QuizSession::new(QuizSettings::default(), None);
        session
            .start_with_rng(pool, 10, fixed_now(), &mut StdRng::seed_from_u64(3))
            .unwrap();
        session
    }

    fn id_at(session: &QuizSession, index: usize) -> QuestionId {
        session.questions().get(index).unwrap().id()
    }

    #[test]
    fn new_session_is_loading() {
        let session = QuizSession::new(QuizSettings::default(), Some("science".into()));
        assert_eq!(session.phase(), SessionPhase::Loading);
        assert_eq!(session.topic(), "science");
        assert!(session.current_question().is_none());
    }

    #[test]
    fn start_with_empty_pool_stays_loading() {
        let mut session = QuizSession::new(QuizSettings::default(), None);
        let err = session.start(Vec::new(), 10, fixed_now()).unwrap_err();
        assert!(matches!(err, QuizError::EmptyPool));
        assert_eq!(session.phase(), SessionPhase::Loading);
    }

    #[test]
    fn start_resets_state_and_clock() {
        let session = active_session(3);
        assert_eq!(session.phase(), SessionPhase::Active);
        assert_eq!(session.questions().len(), 3);
        assert_eq!(session.current_index(), 0);
        assert_eq!(session.count_answered(), 0);
        assert_eq!(session.remaining_secs(), 900);
        assert_eq!(session.started_at(), Some(fixed_now()));
        assert_eq!(session.topic(), "all");
    }

    #[test]
    fn revisit_keeps_record_untouched() {
        let mut session = active_session(3);
        let q = id_at(&session, 0);
        assert!(session.answer(q, "X", 5));

        assert!(session.go_to(2));
        assert!(session.go_to(0));

        assert_eq!(session.record_for(q), Some(&AnswerRecord::answered("X", 5)));
    }

    #[test]
    fn skip_after_answer_overwrites() {
        let mut session = active_session(2);
        let q = id_at(&session, 0);
        session.answer(q, "X", 5);
        session.skip(q, 7);

        let record = session.record_for(q).unwrap();
        assert_eq!(record.answer, SKIPPED_ANSWER);
        assert_eq!(record.time_spent, 7);
        assert!(record.skipped);
    }

    #[test]
    fn answers_for_other_questions_in_set_are_accepted() {
        let mut session = active_session(3);
        let last = id_at(&session, 2);
        assert!(session.answer(last, "right", 1));
        assert_eq!(session.current_index(), 0);
        assert_eq!(session.count_answered(), 1);
    }

    #[test]
    fn foreign_question_ids_are_ignored() {
        let mut session = active_session(2);
        assert!(!session.answer(QuestionId::new(999), "X", 1));
        assert!(!session.skip(QuestionId::new(999), 1));
        assert_eq!(session.count_answered(), 0);
    }

    #[test]
    fn navigation_clamps_at_boundaries() {
        let mut session = active_session(3);
        assert!(!session.go_to_previous());
        assert!(session.go_to_next());
        assert!(session.go_to_next());
        assert!(!session.go_to_next());
        assert_eq!(session.current_index(), 2);
        assert!(!session.go_to(3));
        assert!(!session.go_to(usize::MAX));
        assert_eq!(session.current_index(), 2);
    }

    #[test]
    fn navigation_resets_question_clock_only() {
        let mut session = active_session(3);
        for _ in 0..4 {
            session.tick();
        }
        assert_eq!(session.question_elapsed_secs(), 4);
        session.go_to_next();
        assert_eq!(session.question_elapsed_secs(), 0);
        assert_eq!(session.remaining_secs(), 896);

        // Returning to a visited question starts a fresh count.
        session.tick();
        session.go_to_previous();
        assert_eq!(session.question_elapsed_secs(), 0);
    }

    #[test]
    fn current_helpers_use_question_clock() {
        let mut session = active_session(2);
        for _ in 0..3 {
            session.tick();
        }
        assert!(session.answer_current("right"));
        let q = id_at(&session, 0);
        assert_eq!(session.record_for(q).unwrap().time_spent, 3);

        session.go_to_next();
        session.tick();
        assert!(session.skip_current());
        let q2 = id_at(&session, 1);
        assert_eq!(session.record_for(q2), Some(&AnswerRecord::skipped(1)));
    }

    #[test]
    fn scenario_b_scores_answered_and_skipped() {
        let mut session = active_session(2);
        let q1 = id_at(&session, 0);
        let q2 = id_at(&session, 1);
        session.answer(q1, "right", 2);
        session.skip(q2, 1);

        let SubmitAttempt::Persist(result) = session.begin_submit(fixed_now()).unwrap() else {
            panic!("expected a result to persist");
        };
        assert_eq!(result.score(), 1);
        assert_eq!(result.total_questions(), 2);
        assert!(result.question_results()[0].is_correct);
        assert!(result.question_results()[1].skipped);
        assert!(!result.question_results()[1].is_correct);
        assert_eq!(session.phase(), SessionPhase::Submitting);
    }

    #[test]
    fn duplicate_submit_while_in_flight_is_ignored() {
        let mut session = active_session(2);
        assert!(matches!(
            session.begin_submit(fixed_now()).unwrap(),
            SubmitAttempt::Persist(_)
        ));
        assert_eq!(
            session.begin_submit(fixed_now()).unwrap(),
            SubmitAttempt::Ignored(SessionPhase::Submitting)
        );
    }

    #[test]
    fn failed_persist_retries_same_result() {
        let mut session = active_session(2);
        let q1 = id_at(&session, 0);
        session.answer(q1, "right", 2);
        let SubmitAttempt::Persist(first) = session.begin_submit(fixed_now()).unwrap() else {
            panic!("expected a result to persist");
        };
        assert!(session.fail_submit());
        assert!(session.is_persist_pending());

        // Answers after scoring do not leak into the preserved result.
        assert!(!session.answer(q1, "wrong", 9));

        let later = fixed_now() + chrono::Duration::seconds(30);
        let SubmitAttempt::Persist(retry) = session.begin_submit(later).unwrap() else {
            panic!("expected a retry");
        };
        assert_eq!(retry, first);
    }

    #[test]
    fn submit_after_submitted_is_ignored() {
        let mut session = active_session(1);
        let SubmitAttempt::Persist(result) = session.begin_submit(fixed_now()).unwrap() else {
            panic!("expected a result to persist");
        };
        let stored = result.with_id(quiz_core::model::ResultId::new(1));
        assert!(session.complete_submit(stored.clone()));

        assert_eq!(
            session.begin_submit(fixed_now()).unwrap(),
            SubmitAttempt::Ignored(SessionPhase::Submitted)
        );
        assert_eq!(session.result(), Some(&stored));
        assert!(!session.fail_submit());
    }

    #[test]
    fn clocks_stop_after_submit() {
        let mut session = active_session(1);
        session.tick();
        let _ = session.begin_submit(fixed_now()).unwrap();
        assert!(session.tick().is_empty());
        assert_eq!(session.remaining_secs(), 899);
    }

    #[test]
    fn session_clock_expiry_is_reported_once() {
        let settings = QuizSettings::new(10, 2, 60).unwrap();
        let mut session = QuizSession::new(settings, None);
        session
            .start(vec![build_question(1, "a")], 10, fixed_now())
            .unwrap();
        assert!(session.tick().is_empty());
        assert_eq!(session.tick(), vec![ClockEvent::SessionExpired]);
        assert!(session.tick().is_empty());
    }

    #[test]
    fn scenario_d_retake_resets_ledger() {
        let mut session = active_session(3);
        let q = id_at(&session, 0);
        session.answer(q, "right", 1);
        session.go_to(2);
        let SubmitAttempt::Persist(result) = session.begin_submit(fixed_now()).unwrap() else {
            panic!("expected a result to persist");
        };
        session.complete_submit(result);

        let later = fixed_now() + chrono::Duration::minutes(5);
        assert!(
            session
                .retake_with_rng(later, &mut StdRng::seed_from_u64(11))
                .unwrap()
        );
        assert_eq!(session.phase(), SessionPhase::Active);
        assert_eq!(session.count_answered(), 0);
        assert_eq!(session.current_index(), 0);
        assert_eq!(session.questions().len(), 3);
        assert_eq!(session.remaining_secs(), 900);
        assert_eq!(session.started_at(), Some(later));
        assert!(session.result().is_none());
    }

    #[test]
    fn retake_keeps_requested_size_and_id() {
        let pool: Vec<_> = (1..=5).map(|id| build_question(id, "right")).collect();
        let mut session = QuizSession::new(QuizSettings::default(), None);
        session
            .start_with_rng(pool, 2, fixed_now(), &mut StdRng::seed_from_u64(5))
            .unwrap();
        let id = session.id();
        assert_eq!(session.questions().len(), 2);

        let SubmitAttempt::Persist(result) = session.begin_submit(fixed_now()).unwrap() else {
            panic!("expected a result to persist");
        };
        session.complete_submit(result);
        assert!(
            session
                .retake_with_rng(fixed_now(), &mut StdRng::seed_from_u64(6))
                .unwrap()
        );

        assert_eq!(session.questions().len(), 2);
        assert_eq!(session.id(), id);
    }

    #[test]
    fn retake_before_submit_is_ignored() {
        let mut session = active_session(2);
        assert!(!session.retake(fixed_now()).unwrap());
        assert_eq!(session.phase(), SessionPhase::Active);
    }

    #[test]
    fn change_category_returns_to_loading() {
        let mut session = active_session(2);
        session.answer(id_at(&session, 0), "right", 1);
        session.change_category(Some("history".into()));
        assert_eq!(session.phase(), SessionPhase::Loading);
        assert_eq!(session.count_answered(), 0);
        assert!(session.questions().is_empty());
        assert_eq!(session.topic(), "history");
    }
}
