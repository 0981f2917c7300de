use anyhow::Result;
use clap::Parser;
use env_logger::Env;
use log::{error, info};
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;

mod commands;
mod error;
mod game;
mod observer;
mod options;
mod output;

use crate::commands::Command;
use crate::error::QuizError;
use crate::game::quiz::definition::{default_quiz_path, QuizDefinition};
use crate::game::quiz::settings::Settings;
use crate::game::quiz::{Phase, QuizManager};
use crate::game::scoreboard::Scoreboard;
use crate::game::user::new_user_handle;
use crate::observer::ObserverHandle;
use crate::options::Options;
use crate::output::ConsoleOutput;

const LEADERBOARD_SIZE: usize = 10;

fn load_definition(quiz_file: Option<&Path>) -> Result<QuizDefinition> {
    if let Some(path) = quiz_file {
        return QuizDefinition::open(path);
    }
    match default_quiz_path() {
        Ok(path) if path.exists() => QuizDefinition::open(&path),
        _ => {
            info!("No quiz file found, using the built-in questions");
            QuizDefinition::sample()
        }
    }
}

fn prompt(stdin: &mut impl BufRead, message: &str) -> Result<Option<String>> {
    print!("{}", message);
    io::stdout().flush()?;
    let mut line = String::new();
    if stdin.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_owned()))
}

fn ask_name(stdin: &mut impl BufRead) -> Result<Option<String>> {
    loop {
        match prompt(stdin, "Enter your name: ")? {
            Some(name) if name.is_empty() => println!("Please enter a valid name."),
            name => return Ok(name),
        }
    }
}

fn run_quiz(manager: &Arc<QuizManager>, stdin: &mut impl BufRead) -> Result<()> {
    loop {
        let progress = manager.progress();
        if progress.phase != Phase::Running {
            break;
        }
        let question = match manager.current_question() {
            Some(question) => question,
            None => break,
        };
        println!("{}", output::render_question(&question, &progress));

        let line = match prompt(stdin, "Your answer: ")? {
            Some(line) => line,
            None => {
                manager.end_quiz();
                break;
            }
        };
        if !manager.is_active() {
            break;
        }

        let command = match commands::parse(&line, &question) {
            Ok(command) => command,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };
        match command {
            Command::Answer(answer) => match manager.submit_answer(&answer) {
                Ok(outcome) => {
                    println!("{}", output::render_outcome(&outcome));
                    if outcome.finished {
                        break;
                    }
                }
                Err(QuizError::TimeUp) | Err(QuizError::InvalidState(_)) => break,
                Err(e) => println!("{}", e),
            },
            Command::Pause => match manager.pause() {
                Ok(()) => println!("⏸️  Paused. Type :resume to continue."),
                Err(e) => println!("{}", e),
            },
            Command::Resume => match manager.resume() {
                Ok(()) => println!("▶️  Resumed."),
                Err(e) => println!("{}", e),
            },
            Command::Quit => {
                manager.end_quiz();
            }
            Command::Help => println!("{}", output::render_help()),
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();

    let options = Options::parse();
    let definition = load_definition(options.quiz_file.as_deref())?;

    let mut settings = Settings::default();
    settings.shuffle_questions = options.shuffle;
    if let Some(duration) = options.duration() {
        settings.quiz_duration = duration;
    }
    let manager = QuizManager::with_questions(settings, definition.into_questions())?;
    let console: ObserverHandle = Arc::new(ConsoleOutput::new());
    let scoreboard = Arc::new(Scoreboard::new());
    manager.attach(console.clone());
    manager.attach(scoreboard.clone());

    println!("{}", output::render_welcome());
    let stdin = io::stdin();
    let mut stdin = stdin.lock();

    loop {
        let name = match options.name.clone() {
            Some(name) => name,
            None => match ask_name(&mut stdin)? {
                Some(name) => name,
                None => break,
            },
        };
        let user = new_user_handle(&name);

        manager.start_quiz(user.clone(), options.duration())?;
        if let Err(e) = run_quiz(&manager, &mut stdin) {
            error!("{:#}", e);
            manager.end_quiz();
        }
        println!("{}", output::render_user(&user.read()));

        match prompt(&mut stdin, "\nPlay again? [y/N] ")? {
            Some(answer) if answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes") => (),
            _ => break,
        }
    }

    // Nothing left to narrate once the last quiz is over.
    manager.detach(&console);
    println!("\n{}", output::render_scoreboard(&scoreboard, LEADERBOARD_SIZE));
    Ok(())
}
