use anyhow::{anyhow, Result};

use crate::game::quiz::definition::{Answer, AnswerShape, Question};


#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Command {
    Answer(Answer),
    Pause,
    Resume,
    Quit,
    Help,
}

const TRUE_WORDS: [&str; 4] = ["1", "true", "t", "yes"];
const FALSE_WORDS: [&str; 4] = ["2", "false", "f", "no"];

/// Interprets one line typed while `question` is on screen.
pub fn parse(line: &str, question: &Question) -> Result<Command> {
    let input = line.trim();
    match input.to_lowercase().as_str() {
        ":pause" => return Ok(Command::Pause),
        ":resume" => return Ok(Command::Resume),
        ":quit" | ":q" => return Ok(Command::Quit),
        ":help" | ":h" | "?" => return Ok(Command::Help),
        _ => (),
    }
    if input.is_empty() {
        return Err(anyhow!("Please type an answer"));
    }

    let answer = match question.shape() {
        AnswerShape::Choice => parse_choice(input, question.options())?,
        AnswerShape::Boolean => parse_boolean(input)?,
        AnswerShape::Text => Answer::Text(input.to_owned()),
    };
    Ok(Command::Answer(answer))
}

/// Numbers pick an option by position. A number that is not a valid position
/// can still be an option's text.
fn parse_choice(input: &str, options: &[String]) -> Result<Answer> {
    if let Ok(number) = input.parse::<usize>() {
        return options
            .get(number.wrapping_sub(1))
            .or_else(|| options.iter().find(|option| option.trim() == input))
            .map(|option| Answer::Choice(option.clone()))
            .ok_or_else(|| anyhow!("Please pick a number between 1 and {}", options.len()));
    }
    Ok(Answer::Choice(input.to_owned()))
}

fn parse_boolean(input: &str) -> Result<Answer> {
    let word = input.to_lowercase();
    if TRUE_WORDS.contains(&word.as_str()) {
        Ok(Answer::Boolean(true))
    } else if FALSE_WORDS.contains(&word.as_str()) {
        Ok(Answer::Boolean(false))
    } else {
        Err(anyhow!("Please answer 1 (True) or 2 (False)"))
    }
}
