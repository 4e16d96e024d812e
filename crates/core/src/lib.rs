#![forbid(unsafe_code)]

pub mod analytics;
pub mod error;
pub mod model;
pub mod scoring;
pub mod time;
pub mod timing;

pub use analytics::{CategoryStat, QuestionTiming, ResultAnalytics, TimeBreakdown};
pub use error::Error;
pub use scoring::score_session;
pub use time::Clock;
pub use timing::{ClockEvent, QuestionClock, SessionClock};
