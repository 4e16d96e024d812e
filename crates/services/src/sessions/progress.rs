use super::engine::SessionPhase;

/// Point-in-time view of a quiz session, useful for UI.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionProgress {
    pub phase: SessionPhase,
    pub total: usize,
    pub answered: usize,
    pub unanswered: usize,
    pub current_index: usize,
    pub remaining_secs: u32,
    pub question_elapsed_secs: u32,
    pub question_percent_remaining: f64,
}
