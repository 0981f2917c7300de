use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use std::convert::TryFrom;
use std::fmt;
use unidecode::unidecode;

use crate::error::{QuizError, QuizResult};

lazy_static! {
    static ref FORBIDDEN_ANSWER_CHARACTERS_REGEX: Regex = Regex::new("[^a-z0-9]").unwrap();
}

fn sanitize(answer: &str) -> String {
    let answer = unidecode(answer);
    FORBIDDEN_ANSWER_CHARACTERS_REGEX
        .replace_all(&answer.to_lowercase(), "")
        .into()
}

fn same_choice(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_ref() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

fn split_list(list: Option<String>) -> Vec<String> {
    list.map(|l| {
        l.split('|')
            .map(|item| item.trim().to_owned())
            .filter(|item| !item.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AnswerShape {
    Choice,
    Boolean,
    Text,
}

impl fmt::Display for AnswerShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AnswerShape::Choice => "multiple choice",
            AnswerShape::Boolean => "true/false",
            AnswerShape::Text => "short answer",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Answer {
    Choice(String),
    Boolean(bool),
    Text(String),
}

impl Answer {
    pub fn shape(&self) -> AnswerShape {
        match self {
            Answer::Choice(_) => AnswerShape::Choice,
            Answer::Boolean(_) => AnswerShape::Boolean,
            Answer::Text(_) => AnswerShape::Text,
        }
    }
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Answer::Choice(choice) => f.write_str(choice),
            Answer::Boolean(true) => f.write_str("True"),
            Answer::Boolean(false) => f.write_str("False"),
            Answer::Text(text) => f.write_str(text),
        }
    }
}

/// One row of a quiz file.
#[derive(Debug, Deserialize)]
pub struct RawQuestion {
    pub kind: String,
    pub text: String,
    pub answer: String,
    pub options: Option<String>,
    pub acceptable_answers: Option<String>,
    pub points: Option<u32>,
    pub explanation: Option<String>,
}

#[derive(Clone, Debug)]
enum Expected {
    Choice { options: Vec<String>, answer: String },
    Boolean(bool),
    Text { answer: String, accepted: Regex },
}

#[derive(Clone, Debug)]
pub struct Question {
    text: String,
    expected: Expected,
    points: u32,
    explanation: Option<String>,
}

impl Question {
    pub fn multiple_choice(
        text: &str,
        options: Vec<String>,
        answer: &str,
        points: u32,
    ) -> QuizResult<Question> {
        check_text(text)?;
        if options.len() < 2 {
            return Err(QuizError::configuration(
                "Multiple choice questions need at least 2 options",
            ));
        }
        let answer = options
            .iter()
            .find(|option| same_choice(option, answer))
            .cloned()
            .ok_or_else(|| {
                QuizError::configuration(format!("Answer '{}' is not one of the options", answer))
            })?;
        Ok(Question {
            text: text.trim().to_owned(),
            expected: Expected::Choice { options, answer },
            points,
            explanation: None,
        })
    }

    pub fn true_false(text: &str, answer: bool, points: u32) -> QuizResult<Question> {
        check_text(text)?;
        Ok(Question {
            text: text.trim().to_owned(),
            expected: Expected::Boolean(answer),
            points,
            explanation: None,
        })
    }

    pub fn short_answer(
        text: &str,
        answer: &str,
        alternates: &[String],
        points: u32,
    ) -> QuizResult<Question> {
        check_text(text)?;

        // Gather all answers
        let accepted: Vec<String> = std::iter::once(answer)
            .chain(alternates.iter().map(|a| a.as_str()))
            .map(sanitize)
            .filter(|sanitized| !sanitized.is_empty())
            .map(|sanitized| regex::escape(&sanitized))
            .collect();
        if accepted.is_empty() {
            return Err(QuizError::configuration(format!(
                "Answer '{}' has no letters or digits to match against",
                answer
            )));
        }

        let pattern = format!("^(?:{})$", accepted.join("|"));
        let accepted = Regex::new(&pattern)
            .map_err(|e| QuizError::configuration(format!("Invalid answer pattern: {}", e)))?;
        Ok(Question {
            text: text.trim().to_owned(),
            expected: Expected::Text {
                answer: answer.trim().to_owned(),
                accepted,
            },
            points,
            explanation: None,
        })
    }

    pub fn with_explanation(mut self, explanation: &str) -> Self {
        let explanation = explanation.trim();
        self.explanation = if explanation.is_empty() {
            None
        } else {
            Some(explanation.to_owned())
        };
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn points(&self) -> u32 {
        self.points
    }

    pub fn explanation(&self) -> Option<&str> {
        self.explanation.as_deref()
    }

    pub fn shape(&self) -> AnswerShape {
        match self.expected {
            Expected::Choice { .. } => AnswerShape::Choice,
            Expected::Boolean(_) => AnswerShape::Boolean,
            Expected::Text { .. } => AnswerShape::Text,
        }
    }

    pub fn options(&self) -> &[String] {
        match &self.expected {
            Expected::Choice { options, .. } => options,
            _ => &[],
        }
    }

    pub fn accepts(&self, answer: &Answer) -> bool {
        answer.shape() == self.shape()
    }

    pub fn correct_answer(&self) -> Answer {
        match &self.expected {
            Expected::Choice { answer, .. } => Answer::Choice(answer.clone()),
            Expected::Boolean(answer) => Answer::Boolean(*answer),
            Expected::Text { answer, .. } => Answer::Text(answer.clone()),
        }
    }

    pub fn is_answer_correct(&self, answer: &Answer) -> bool {
        match (&self.expected, answer) {
            (Expected::Choice { answer: correct, .. }, Answer::Choice(choice)) => {
                same_choice(correct, choice)
            }
            (Expected::Boolean(correct), Answer::Boolean(guess)) => correct == guess,
            (Expected::Text { accepted, .. }, Answer::Text(guess)) => {
                accepted.is_match(&sanitize(guess))
            }
            _ => false,
        }
    }
}

fn check_text(text: &str) -> QuizResult<()> {
    if text.trim().is_empty() {
        return Err(QuizError::configuration("Question text cannot be empty"));
    }
    Ok(())
}

impl TryFrom<RawQuestion> for Question {
    type Error = QuizError;

    fn try_from(raw_question: RawQuestion) -> QuizResult<Question> {
        let RawQuestion {
            kind,
            text,
            answer,
            options,
            acceptable_answers,
            points,
            explanation,
        } = raw_question;
        let points = points.unwrap_or(1);
        let options = split_list(options);
        let question = match kind.trim().to_lowercase().as_ref() {
            "mcq" => Question::multiple_choice(&text, options, &answer, points)?,
            "true_false" => {
                if !options.is_empty() {
                    return Err(QuizError::configuration(
                        "True/false questions cannot have options",
                    ));
                }
                let value = parse_bool(&answer).ok_or_else(|| {
                    QuizError::configuration(format!(
                        "True/false answer must be true or false, got '{}'",
                        answer
                    ))
                })?;
                Question::true_false(&text, value, points)?
            }
            "short_answer" => {
                if !options.is_empty() {
                    return Err(QuizError::configuration(
                        "Short answer questions cannot have options",
                    ));
                }
                let alternates = split_list(acceptable_answers);
                Question::short_answer(&text, &answer, &alternates, points)?
            }
            other => {
                return Err(QuizError::configuration(format!(
                    "Unsupported question kind '{}'",
                    other
                )))
            }
        };
        Ok(match explanation {
            Some(explanation) => question.with_explanation(&explanation),
            None => question,
        })
    }
}
