use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;


/// Timed console quiz.
#[derive(Debug, Parser)]
#[command(name = "pattern-quiz", version, about = "Timed console quiz", long_about = None)]
pub struct Options {
    /// CSV quiz file. Falls back to <config dir>/pattern-quiz/quiz.csv, then to the built-in quiz.
    #[arg(value_name = "QUIZ_FILE")]
    pub quiz_file: Option<PathBuf>,

    /// Time allowed for the whole quiz, in seconds.
    #[arg(long, value_name = "SECONDS", value_parser = clap::value_parser!(u64).range(1..))]
    duration: Option<u64>,

    /// Player name. Asked for at the prompt when missing.
    #[arg(long)]
    pub name: Option<String>,

    /// Ask the questions in random order.
    #[arg(long)]
    pub shuffle: bool,
}

impl Options {
    pub fn duration(&self) -> Option<Duration> {
        self.duration.map(Duration::from_secs)
    }
}
