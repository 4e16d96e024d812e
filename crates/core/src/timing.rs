//! Session and per-question clocks.
//!
//! Neither clock owns a thread or timer handle. The host advances them by
//! calling `tick()` once per second; a clock that has been stopped ignores
//! further ticks for good.

/// Discrete notifications produced while ticking the clocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockEvent {
    /// The current question just exceeded its expected time budget.
    QuestionOverBudget,
    /// The session countdown reached zero. Emitted once per session.
    SessionExpired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Running,
    Stopped,
}

/// Counts up from zero while a question is active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionClock {
    budget_secs: u32,
    elapsed_secs: u32,
    state: RunState,
}

impl QuestionClock {
    #[must_use]
    pub fn new(budget_secs: u32) -> Self {
        Self {
            budget_secs,
            elapsed_secs: 0,
            state: RunState::Running,
        }
    }

    /// Advance by one second.
    pub fn tick(&mut self) -> Option<ClockEvent> {
        if self.state == RunState::Stopped {
            return None;
        }
        self.elapsed_secs = self.elapsed_secs.saturating_add(1);
        (self.elapsed_secs == self.budget_secs.saturating_add(1))
            .then_some(ClockEvent::QuestionOverBudget)
    }

    /// Restart from zero for a newly activated question.
    pub fn reset(&mut self) {
        if self.state == RunState::Running {
            self.elapsed_secs = 0;
        }
    }

    pub fn stop(&mut self) {
        self.state = RunState::Stopped;
    }

    #[must_use]
    pub fn elapsed_secs(&self) -> u32 {
        self.elapsed_secs
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state == RunState::Running
    }

    /// `max(0, 100 - elapsed / budget * 100)`; feedback only.
    #[must_use]
    pub fn percent_remaining(&self) -> f64 {
        if self.budget_secs == 0 {
            return 0.0;
        }
        let used = f64::from(self.elapsed_secs) / f64::from(self.budget_secs) * 100.0;
        (100.0 - used).max(0.0)
    }
}

/// Counts down from the session budget; never reset by navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionClock {
    budget_secs: u32,
    remaining_secs: u32,
    state: RunState,
}

impl SessionClock {
    #[must_use]
    pub fn new(budget_secs: u32) -> Self {
        Self {
            budget_secs,
            remaining_secs: budget_secs,
            state: RunState::Running,
        }
    }

    /// Advance by one second, reporting expiry exactly once.
    pub fn tick(&mut self) -> Option<ClockEvent> {
        if self.state == RunState::Stopped || self.remaining_secs == 0 {
            return None;
        }
        self.remaining_secs -= 1;
        if self.remaining_secs == 0 {
            self.state = RunState::Stopped;
            return Some(ClockEvent::SessionExpired);
        }
        None
    }

    pub fn stop(&mut self) {
        self.state = RunState::Stopped;
    }

    #[must_use]
    pub fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    #[must_use]
    pub fn budget_secs(&self) -> u32 {
        self.budget_secs
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state == RunState::Running
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.remaining_secs == 0
    }
}
