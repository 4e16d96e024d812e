use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::HashSet;

use quiz_core::model::{Question, QuestionId};

use crate::error::QuizError;

/// Ordered questions chosen for one session. No id appears twice.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionQuestionSet {
    questions: Vec<Question>,
}

impl SessionQuestionSet {
    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    #[must_use]
    pub fn contains(&self, id: QuestionId) -> bool {
        self.questions.iter().any(|q| q.id() == id)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Question] {
        &self.questions
    }

    pub fn iter(&self) -> impl Iterator<Item = &Question> {
        self.questions.iter()
    }
}

/// Draw a random session of up to `size` questions using the thread RNG.
///
/// # Errors
///
/// Returns `QuizError::EmptyPool` if `pool` is empty.
pub fn select(pool: &[Question], size: usize) -> Result<SessionQuestionSet, QuizError> {
    select_with_rng(pool, size, &mut rand::rng())
}

/// Draw a uniform random permutation of `pool`, truncated to `min(size, len)`.
///
/// Repeated ids in `pool` are collapsed before shuffling (first occurrence
/// kept). `pool` itself is left untouched.
///
/// # Errors
///
/// Returns `QuizError::EmptyPool` if `pool` is empty.
pub fn select_with_rng<R: Rng + ?Sized>(
    pool: &[Question],
    size: usize,
    rng: &mut R,
) -> Result<SessionQuestionSet, QuizError> {
    if pool.is_empty() {
        return Err(QuizError::EmptyPool);
    }

    let mut seen = HashSet::with_capacity(pool.len());
    let mut candidates: Vec<Question> = pool
        .iter()
        .filter(|q| seen.insert(q.id()))
        .cloned()
        .collect();

    candidates.as_mut_slice().shuffle(rng);
    candidates.truncate(size.min(candidates.len()));

    Ok(SessionQuestionSet {
        questions: candidates,
    })
}
