use thiserror::Error;

use crate::game::quiz::definition::AnswerShape;

#[derive(Error, Debug)]
pub enum QuizError {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("{0}")]
    InvalidState(String),

    #[error("Expected a {expected} answer, got a {given} answer")]
    AnswerShape {
        expected: AnswerShape,
        given: AnswerShape,
    },

    #[error("Time is up, the quiz has ended")]
    TimeUp,

    #[error("Could not spawn countdown thread: {0}")]
    Spawn(#[from] std::io::Error),
}

impl QuizError {
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        QuizError::Configuration(message.into())
    }

    pub fn invalid_state<S: Into<String>>(message: S) -> Self {
        QuizError::InvalidState(message.into())
    }
}

pub type QuizResult<T> = Result<T, QuizError>;
