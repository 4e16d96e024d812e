mod answer;
mod ids;
mod question;
mod result;
mod settings;

pub use answer::{AnswerLedger, AnswerRecord, SKIPPED_ANSWER};
pub use ids::{ParseIdError, QuestionId, ResultId};
pub use question::{ALL_CATEGORIES, Difficulty, Question, QuestionError, topic_label};
pub use result::{QuestionResult, ResultError, ScoredResult, ScoredResultPayload};
pub use settings::{QuizSettings, SettingsError};
