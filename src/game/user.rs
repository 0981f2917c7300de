use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

#[derive(Clone, Debug, Default)]
pub struct User {
    name: String,
    current_score: u32,
    total_score: u32,
    quizzes_taken: u32,
}

impl User {
    pub fn new(name: &str) -> Self {
        User {
            name: name.trim().to_owned(),
            ..Default::default()
        }
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }

    pub fn current_score(&self) -> u32 {
        self.current_score
    }

    pub fn total_score(&self) -> u32 {
        self.total_score
    }

    pub fn quizzes_taken(&self) -> u32 {
        self.quizzes_taken
    }

    pub fn start_new_quiz(&mut self) {
        self.current_score = 0;
    }

    pub fn add_points(&mut self, points: u32) {
        self.current_score += points;
    }

    /// Folds the current score into the running totals.
    pub fn complete_quiz(&mut self) {
        self.total_score += self.current_score;
        self.quizzes_taken += 1;
    }

    pub fn average_score(&self) -> f64 {
        if self.quizzes_taken == 0 {
            return 0.0;
        }
        f64::from(self.total_score) / f64::from(self.quizzes_taken)
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} points over {} quizzes)",
            self.name, self.total_score, self.quizzes_taken
        )
    }
}

pub type UserHandle = Arc<RwLock<User>>;

pub fn new_user_handle(name: &str) -> UserHandle {
    Arc::new(RwLock::new(User::new(name)))
}
