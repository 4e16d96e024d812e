#![forbid(unsafe_code)]

pub mod error;
pub mod question_bank;
pub mod sessions;

pub use quiz_core::Clock;
pub use sessions as session;

pub use error::QuizError;
pub use question_bank::QuestionBank;

pub use sessions::{
    QuizLoopService, QuizSession, ResultDetail, ResultListItem, ResultService, RunningSession,
    SessionEvent, SessionHandle, SessionPhase, SessionProgress, SessionRunner, SessionSnapshot,
    SubmitAttempt, SubmitOutcome,
};
