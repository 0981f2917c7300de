use anyhow::Result;
use itertools::Itertools;
use log::info;
use parking_lot::RwLock;
use std::cmp::Reverse;
use std::collections::HashMap;

use crate::game::event::{Event, EventKind, QuizSummary};
use crate::observer::{Observer, Source};


#[derive(Debug, Default)]
struct Standings {
    scores: HashMap<String, u32>,
    history: HashMap<String, Vec<QuizSummary>>,
}

/// Running totals and quiz history for every player seen in this process.
/// Attach it to a `QuizManager` to have completed quizzes recorded.
#[derive(Debug, Default)]
pub struct Scoreboard {
    standings: RwLock<Standings>,
}

impl Scoreboard {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn add_score(&self, user_name: &str, score: u32) {
        *self
            .standings
            .write()
            .scores
            .entry(user_name.to_owned())
            .or_insert(0) += score;
    }

    pub fn record(&self, summary: &QuizSummary) {
        self.add_score(&summary.user_name, summary.final_score);
        self.standings
            .write()
            .history
            .entry(summary.user_name.clone())
            .or_insert_with(Vec::new)
            .push(summary.clone());
        info!(
            "Recorded {} points for {}",
            summary.final_score, summary.user_name
        );
    }

    #[cfg(test)]
    pub fn user_score(&self, user_name: &str) -> u32 {
        self.standings
            .read()
            .scores
            .get(user_name)
            .copied()
            .unwrap_or(0)
    }

    /// Highest scores first, ties broken by name.
    pub fn top_scores(&self, limit: usize) -> Vec<(String, u32)> {
        self.standings
            .read()
            .scores
            .iter()
            .sorted_by_key(|&(name, score)| (Reverse(*score), name))
            .take(limit)
            .map(|(name, score)| (name.clone(), *score))
            .collect()
    }

    pub fn history(&self, user_name: &str) -> Vec<QuizSummary> {
        self.standings
            .read()
            .history
            .get(user_name)
            .cloned()
            .unwrap_or_default()
    }

    pub fn total_users(&self) -> usize {
        self.standings.read().scores.len()
    }

    pub fn average_score(&self) -> f64 {
        let standings = self.standings.read();
        if standings.scores.is_empty() {
            return 0.0;
        }
        let total: u64 = standings.scores.values().map(|s| u64::from(*s)).sum();
        total as f64 / standings.scores.len() as f64
    }

    #[cfg(test)]
    pub fn reset(&self) {
        let mut standings = self.standings.write();
        standings.scores.clear();
        standings.history.clear();
    }
}

impl Observer for Scoreboard {
    fn receive(&self, _source: Source, event: &Event) -> Result<()> {
        if let EventKind::QuizCompleted(summary) = &event.kind {
            self.record(summary);
        }
        Ok(())
    }
}
