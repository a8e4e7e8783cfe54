use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use utoipa::ToSchema;

use crate::error::{Error, Result};

pub const SINGLE_SELECT_MCQ: &str = "single_select_mcq";
pub const MULTIPLE_SELECT_MCQ: &str = "multiple_select_mcq";

pub const MAX_QUESTION_POINTS: i32 = 10_000;

/// A question as stored in the question bank.
///
/// `question_type` and `difficulty` are kept as the raw column text so rows
/// written by other services with unknown values still load; use
/// [`Question::kind`] to get the typed variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Question {
    pub id: i64,
    pub topic_id: i64,
    pub question_text: String,
    pub points: i32,
    pub difficulty: String,
    pub question_type: String,
    pub is_verified: bool,
    #[sqlx(skip)]
    #[serde(default)]
    pub options: Vec<QuestionOption>,
    pub created_at: Option<DateTime<Utc>>,
}

impl Question {
    pub fn kind(&self) -> Result<QuestionKind> {
        self.question_type.parse()
    }

    pub fn correct_option_ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.options.iter().filter(|o| o.is_correct).map(|o| o.id)
    }

    pub fn has_option(&self, option_id: i64) -> bool {
        self.options.iter().any(|o| o.id == option_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct QuestionOption {
    pub id: i64,
    pub question_id: i64,
    pub option_text: String,
    pub is_correct: bool,
}

/// Closed set of gradable question variants, keyed by the stored
/// `question_type` string. Grading capabilities live in
/// `services::grading_service`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum QuestionKind {
    #[serde(rename = "single_select_mcq")]
    SingleSelect,
    #[serde(rename = "multiple_select_mcq")]
    MultipleSelect,
}

impl QuestionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionKind::SingleSelect => SINGLE_SELECT_MCQ,
            QuestionKind::MultipleSelect => MULTIPLE_SELECT_MCQ,
        }
    }
}

impl FromStr for QuestionKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            SINGLE_SELECT_MCQ => Ok(QuestionKind::SingleSelect),
            MULTIPLE_SELECT_MCQ => Ok(QuestionKind::MultipleSelect),
            other => Err(Error::UnsupportedQuestionType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl Default for Difficulty {
    fn default() -> Self {
        Difficulty::Easy
    }
}

#[derive(Debug, Clone)]
pub struct NewQuestion {
    pub topic_id: i64,
    pub question_text: String,
    pub points: i32,
    pub difficulty: Difficulty,
    pub kind: QuestionKind,
    pub is_verified: bool,
    pub options: Vec<NewOption>,
}

#[derive(Debug, Clone)]
pub struct NewOption {
    pub option_text: String,
    pub is_correct: bool,
}
