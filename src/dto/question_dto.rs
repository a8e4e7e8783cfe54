use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::models::question::{Difficulty, NewOption, NewQuestion, Question, QuestionKind};

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateQuestionPayload {
    pub topic_id: i64,
    #[validate(length(min = 1, message = "Question text cannot be empty"))]
    pub question_text: String,
    #[validate(range(min = 0, max = 10000, message = "Points must be between 0 and 10000"))]
    pub points: i32,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    pub question_type: QuestionKind,
    #[serde(default)]
    pub is_verified: bool,
    #[validate(length(min = 2, message = "At least two options are required"), nested)]
    pub options: Vec<OptionPayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct OptionPayload {
    #[validate(length(min = 1, message = "Option text cannot be empty"))]
    pub option_text: String,
    #[serde(default)]
    pub is_correct: bool,
}

impl From<CreateQuestionPayload> for NewQuestion {
    fn from(payload: CreateQuestionPayload) -> Self {
        NewQuestion {
            topic_id: payload.topic_id,
            question_text: payload.question_text,
            points: payload.points,
            difficulty: payload.difficulty.unwrap_or_default(),
            kind: payload.question_type,
            is_verified: payload.is_verified,
            options: payload
                .options
                .into_iter()
                .map(|o| NewOption {
                    option_text: o.option_text,
                    is_correct: o.is_correct,
                })
                .collect(),
        }
    }
}

/// Staff view of a question. Carries the correctness flags.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QuestionResponse {
    pub id: i64,
    pub topic_id: i64,
    pub question_text: String,
    pub points: i32,
    pub difficulty: String,
    pub question_type: String,
    pub is_verified: bool,
    pub options: Vec<OptionResponse>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OptionResponse {
    pub id: i64,
    pub option_text: String,
    pub is_correct: bool,
}

impl From<Question> for QuestionResponse {
    fn from(q: Question) -> Self {
        QuestionResponse {
            id: q.id,
            topic_id: q.topic_id,
            question_text: q.question_text,
            points: q.points,
            difficulty: q.difficulty,
            question_type: q.question_type,
            is_verified: q.is_verified,
            options: q
                .options
                .into_iter()
                .map(|o| OptionResponse {
                    id: o.id,
                    option_text: o.option_text,
                    is_correct: o.is_correct,
                })
                .collect(),
            created_at: q.created_at,
        }
    }
}
