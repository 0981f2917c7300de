use anyhow::{Context, Result};
use directories_next::BaseDirs;
use log::info;
use std::convert::TryFrom;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::error::QuizError;

pub mod question;

pub use question::{Answer, AnswerShape, Question, RawQuestion};


const SAMPLE_QUIZ: &str = include_str!("../../../../data/sample_quiz.csv");

/// Where a user-provided quiz is picked up when none is given explicitly.
pub fn default_quiz_path() -> Result<PathBuf> {
    let mut path = BaseDirs::new()
        .context("could not locate system directories")?
        .config_dir()
        .to_path_buf();
    path.push("pattern-quiz");
    path.push("quiz.csv");
    Ok(path)
}

#[derive(Debug)]
pub struct QuizDefinition {
    questions: Vec<Question>,
}

impl QuizDefinition {
    pub fn open(source: &Path) -> Result<QuizDefinition> {
        let file = File::open(source)
            .with_context(|| format!("Could not open quiz file {:?}", source))?;
        let definition = QuizDefinition::from_reader(file)
            .with_context(|| format!("Could not load quiz file {:?}", source))?;
        info!(
            "Loaded {} questions from {:?}",
            definition.questions.len(),
            source
        );
        Ok(definition)
    }

    pub fn sample() -> Result<QuizDefinition> {
        QuizDefinition::from_reader(SAMPLE_QUIZ.as_bytes())
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<QuizDefinition> {
        let mut questions = Vec::new();

        let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        for (index, question) in csv_reader.deserialize().enumerate() {
            let raw_question: RawQuestion = question?;
            let question = Question::try_from(raw_question)
                .with_context(|| format!("Invalid question #{}", index + 1))?;
            questions.push(question);
        }

        if questions.is_empty() {
            return Err(QuizError::configuration("Quiz contains no questions").into());
        }
        Ok(QuizDefinition { questions })
    }

    pub fn into_questions(self) -> Vec<Question> {
        self.questions
    }
}
