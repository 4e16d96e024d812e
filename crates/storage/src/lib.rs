#![forbid(unsafe_code)]

pub mod repository;
pub mod sample;
pub mod sqlite;

pub use repository::{
    CategorySummary, InMemoryRepository, QuestionSource, ResultHistory, ResultSink, Storage,
    StorageError,
};
