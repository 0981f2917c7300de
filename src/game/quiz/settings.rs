use std::time::Duration;

use crate::game::timer::{DEFAULT_STOP_GRACE, DEFAULT_TICK_INTERVAL};

#[derive(Clone, Debug)]
pub struct Settings {
    pub quiz_duration: Duration,
    pub tick_interval: Duration,
    pub stop_grace: Duration,
    pub shuffle_questions: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            quiz_duration: Duration::from_secs(300),
            tick_interval: DEFAULT_TICK_INTERVAL,
            stop_grace: DEFAULT_STOP_GRACE,
            shuffle_questions: false,
        }
    }
}
