use chrono::{DateTime, Utc};
use std::time::Duration;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EndReason {
    Completed,
    TimeExpired,
    Aborted,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct QuizSummary {
    pub user_name: String,
    pub final_score: u32,
    pub answered: usize,
    pub total_questions: usize,
    pub elapsed: Duration,
    pub reason: EndReason,
}

#[derive(Clone, Debug, PartialEq)]
pub enum EventKind {
    Tick { remaining: Duration, expired: bool },
    Expired,
    ScoreChanged { score: u32, delta: u32 },
    QuestionAdvanced { index: usize, total: usize },
    QuizCompleted(QuizSummary),
}

/// Payload broadcast from a subject to its observers. Never stored by the
/// subject itself.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    pub at: DateTime<Utc>,
    pub kind: EventKind,
}

impl Event {
    pub fn new(kind: EventKind) -> Self {
        Event {
            at: Utc::now(),
            kind,
        }
    }
}
