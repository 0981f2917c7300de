use anyhow::Result;
use itertools::Itertools;
use parking_lot::Mutex;
use std::io::Write;
use std::time::Duration;

use crate::game::event::{EndReason, Event, EventKind, QuizSummary};
use crate::game::quiz::definition::{AnswerShape, Question};
use crate::game::quiz::{AnswerOutcome, Progress};
use crate::game::scoreboard::Scoreboard;
use crate::game::user::User;
use crate::observer::{Observer, Source};

#[cfg(test)]
pub mod mock;


const TIME_WARNINGS: [u64; 2] = [10, 30];

fn format_duration(duration: Duration) -> String {
    let seconds = duration.as_secs();
    if seconds >= 60 {
        format!("{}m{:02}s", seconds / 60, seconds % 60)
    } else {
        format!("{}s", seconds)
    }
}

pub fn render_welcome() -> String {
    [
        "=".repeat(50),
        "🎯 WELCOME TO THE PATTERN QUIZ! 🎯".to_owned(),
        "=".repeat(50),
        "Answer each question before the clock runs out.".to_owned(),
        "Type :pause, :resume, :help or :quit at any prompt.".to_owned(),
        "=".repeat(50),
    ]
    .join("\n")
}

pub fn render_help() -> String {
    [
        "Commands:",
        "  :pause   stop the clock",
        "  :resume  restart the clock",
        "  :quit    end the quiz now",
        "  :help    show this message",
    ]
    .join("\n")
}

pub fn render_question(question: &Question, progress: &Progress) -> String {
    let mut display = format!(
        "\n--- Question {}/{} ({} left, score {}) ---\n{}",
        progress.answered + 1,
        progress.total_questions,
        format_duration(progress.remaining),
        progress.score,
        question.text()
    );
    match question.shape() {
        AnswerShape::Choice => {
            let options = question
                .options()
                .iter()
                .enumerate()
                .map(|(i, option)| format!("  {}. {}", i + 1, option))
                .join("\n");
            display += &format!("\nOptions:\n{}", options);
        }
        AnswerShape::Boolean => display += "\nOptions:\n  1. True\n  2. False",
        AnswerShape::Text => (),
    }
    display += &format!("\nPoints: {}", question.points());
    display
}

pub fn render_outcome(outcome: &AnswerOutcome) -> String {
    let mut display = if outcome.correct {
        format!("✅ Correct! +{} points", outcome.points_earned)
    } else {
        format!("❌ Incorrect. The answer was: {}", outcome.correct_answer)
    };
    if let Some(explanation) = &outcome.explanation {
        display += &format!("\n💡 {}", explanation);
    }
    display
}

pub fn render_summary(summary: &QuizSummary) -> String {
    let ending = match summary.reason {
        EndReason::Completed => "🎉 QUIZ COMPLETED!",
        EndReason::TimeExpired => "⏰ TIME IS UP!",
        EndReason::Aborted => "🛑 QUIZ ENDED",
    };
    [
        "=".repeat(50),
        ending.to_owned(),
        format!("Player: {}", summary.user_name),
        format!("Final Score: {}", summary.final_score),
        format!(
            "Questions Answered: {}/{}",
            summary.answered, summary.total_questions
        ),
        format!("Time Taken: {}", format_duration(summary.elapsed)),
        "=".repeat(50),
    ]
    .join("\n")
}

pub fn render_user(user: &User) -> String {
    format!(
        "📈 {}: {} points this quiz, {} quizzes taken, {} total points, {:.1} average",
        user.get_name(),
        user.current_score(),
        user.quizzes_taken(),
        user.total_score(),
        user.average_score()
    )
}

pub fn render_scoreboard(scoreboard: &Scoreboard, limit: usize) -> String {
    let top_scores = scoreboard.top_scores(limit);
    if top_scores.is_empty() {
        return "No scores yet.".to_owned();
    }
    let mut recap = "🏆 Top scores:".to_owned();
    for (index, (name, score)) in top_scores.iter().enumerate() {
        let rank = match index {
            0 => "🥇".to_owned(),
            1 => "🥈".to_owned(),
            2 => "🥉".to_owned(),
            _ => format!("#{}", index + 1),
        };
        let played = scoreboard.history(name).len();
        recap += &format!("\n{} {} with {} points over {} quizzes", rank, name, score, played);
    }
    recap += &format!(
        "\nAverage across {} players: {:.1}",
        scoreboard.total_users(),
        scoreboard.average_score()
    );
    recap
}

/// Prints quiz notifications to stdout as they happen.
#[derive(Default)]
pub struct ConsoleOutput {
    last_remaining: Mutex<Option<Duration>>,
}

impl ConsoleOutput {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn interpret_event(&self, event: &EventKind) -> Option<String> {
        use EventKind::*;
        match event {
            ScoreChanged { score, delta } if *delta > 0 => Some(format!(
                "[📢] +{} points, score is now {}",
                delta, score
            )),
            ScoreChanged { score, .. } => Some(format!("[📢] No points, score stays at {}", score)),
            QuestionAdvanced { index, total } if index < total => None,
            QuestionAdvanced { .. } => Some("[📢] That was the last question.".to_owned()),
            Tick { remaining, .. } => {
                let before = self.last_remaining.lock().replace(*remaining);
                self.time_warning(before, *remaining)
            }
            Expired => Some("[📢] ⏰ Time is up!".to_owned()),
            QuizCompleted(summary) => {
                *self.last_remaining.lock() = None;
                Some(render_summary(summary))
            }
        }
    }

    fn time_warning(&self, before: Option<Duration>, after: Duration) -> Option<String> {
        let before = before?;
        TIME_WARNINGS
            .iter()
            .map(|seconds| Duration::from_secs(*seconds))
            .find(|threshold| before > *threshold && after <= *threshold)
            .map(|threshold| format!("\n[📢] ⏳ {} remaining!", format_duration(threshold)))
    }
}

impl Observer for ConsoleOutput {
    fn receive(&self, _source: Source, event: &Event) -> Result<()> {
        if let Some(message) = self.interpret_event(&event.kind) {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            writeln!(handle, "{}", message)?;
            handle.flush()?;
        }
        Ok(())
    }
}
