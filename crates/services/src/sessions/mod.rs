mod engine;
mod progress;
mod runner;
mod selector;
mod view;
mod workflow;

// Public API of the session subsystem.
pub use crate::error::QuizError;
pub use engine::{QuizSession, SessionPhase, SubmitAttempt};
pub use progress::SessionProgress;
pub use runner::{RunningSession, SessionEvent, SessionHandle, SessionRunner, SessionSnapshot};
pub use selector::{SessionQuestionSet, select, select_with_rng};
pub use view::{ResultDetail, ResultListItem, ResultService};
pub use workflow::{QuizLoopService, SubmitOutcome};
