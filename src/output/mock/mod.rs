use anyhow::{anyhow, Result};
use parking_lot::RwLock;
use std::sync::Arc;

use crate::game::event::{Event, EventKind, QuizSummary};
use crate::observer::{Observer, Source};

#[derive(Clone, Default)]
pub struct MockObserver {
    received: Arc<RwLock<Vec<(Source, EventKind)>>>,
    fail_with: Option<String>,
}

impl MockObserver {
    pub fn new() -> Self {
        Default::default()
    }

    /// An observer that records events and then reports a failure for each.
    pub fn failing(reason: &str) -> Self {
        MockObserver {
            received: Default::default(),
            fail_with: Some(reason.to_owned()),
        }
    }

    pub fn flush(&self) -> Vec<EventKind> {
        std::mem::replace(&mut *self.received.write(), Vec::new())
            .into_iter()
            .map(|(_source, kind)| kind)
            .collect()
    }

    pub fn events(&self) -> Vec<EventKind> {
        self.received
            .read()
            .iter()
            .map(|(_source, kind)| kind.clone())
            .collect()
    }

    pub fn sources(&self) -> Vec<Source> {
        self.received.read().iter().map(|(source, _)| *source).collect()
    }

    pub fn count<F: Fn(&EventKind) -> bool>(&self, predicate: F) -> usize {
        self.received
            .read()
            .iter()
            .filter(|(_source, kind)| predicate(kind))
            .count()
    }

    pub fn completions(&self) -> Vec<QuizSummary> {
        self.received
            .read()
            .iter()
            .filter_map(|(_source, kind)| match kind {
                EventKind::QuizCompleted(summary) => Some(summary.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn saw_expiry(&self) -> bool {
        self.count(|k| *k == EventKind::Expired) > 0
    }
}

impl Observer for MockObserver {
    fn receive(&self, source: Source, event: &Event) -> Result<()> {
        self.received.write().push((source, event.kind.clone()));
        match &self.fail_with {
            Some(reason) => Err(anyhow!("{}", reason)),
            None => Ok(()),
        }
    }
}
