use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::dto::question_dto::QuestionResponse;
use crate::models::question::Difficulty;
use crate::models::quiz::{Quiz, QuizSetting};

/// Distinguishes an explicit `null` (clear) from an absent field (keep).
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ComposeQuizPayload {
    pub course_id: i64,
    #[validate(length(min = 1, max = 255, message = "Quiz title must be 1-255 characters"))]
    pub quiz_title: String,
    #[serde(default)]
    pub difficulty_level: Option<Difficulty>,
    #[serde(default)]
    pub random_flag: bool,
    #[validate(length(min = 1, message = "At least one topic is required"))]
    pub topic_ids: Vec<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateQuizTopicsPayload {
    #[serde(default)]
    pub add_topic_ids: Vec<i64>,
    #[serde(default)]
    pub remove_topic_ids: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct QuizListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl QuizListQuery {
    /// `(offset, limit)` with the page clamped to at least 1 and the page
    /// size to 1..=100.
    pub fn window(&self) -> (i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self.per_page.unwrap_or(10).clamp(1, 100);
        ((page - 1).saturating_mul(per_page), per_page)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QuizResponse {
    pub id: i64,
    pub course_id: i64,
    pub quiz_title: String,
    pub difficulty_level: String,
    pub random_flag: bool,
    pub total_points: i32,
    pub topic_ids: Vec<i64>,
    pub question_ids: Vec<i64>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<Quiz> for QuizResponse {
    fn from(quiz: Quiz) -> Self {
        QuizResponse {
            id: quiz.id,
            course_id: quiz.course_id,
            quiz_title: quiz.quiz_title,
            difficulty_level: quiz.difficulty_level,
            random_flag: quiz.random_flag,
            total_points: quiz.total_points,
            topic_ids: quiz.topic_ids,
            question_ids: quiz.question_ids,
            created_at: quiz.created_at,
            updated_at: quiz.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateQuizSettingPayload {
    #[serde(default)]
    pub instructions: String,
    #[validate(range(min = 1, max = 604800, message = "Time limit must be between one second and one week"))]
    pub time_limit_secs: i64,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// Generated when omitted.
    #[validate(length(min = 4, max = 64, message = "Quiz key must be 4-64 characters"))]
    pub quiz_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QuizSettingResponse {
    pub id: i64,
    pub quiz_id: i64,
    pub instructions: String,
    pub time_limit_secs: i64,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub quiz_key: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<QuizSetting> for QuizSettingResponse {
    fn from(s: QuizSetting) -> Self {
        QuizSettingResponse {
            id: s.id,
            quiz_id: s.quiz_id,
            instructions: s.instructions,
            time_limit_secs: s.time_limit_secs,
            start_time: s.start_time,
            end_time: s.end_time,
            quiz_key: s.quiz_key,
            created_at: s.created_at,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateQuizSettingPayload {
    pub instructions: Option<String>,
    #[validate(range(min = 1, max = 604800, message = "Time limit must be between one second and one week"))]
    pub time_limit_secs: Option<i64>,
    /// `null` opens this side of the window.
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>, format = DateTime)]
    pub start_time: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>, format = DateTime)]
    pub end_time: Option<Option<DateTime<Utc>>>,
    #[validate(length(min = 4, max = 64, message = "Quiz key must be 4-64 characters"))]
    pub quiz_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct QuizKeyPayload {
    pub quiz_id: i64,
    #[validate(length(min = 1, message = "Quiz key cannot be empty"))]
    pub quiz_key: String,
}

/// The setting a key unlocks, without echoing the key.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QuizKeyStatusResponse {
    pub quiz_id: i64,
    pub quiz_setting_id: i64,
    pub instructions: String,
    pub time_limit_secs: i64,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl From<QuizSetting> for QuizKeyStatusResponse {
    fn from(s: QuizSetting) -> Self {
        QuizKeyStatusResponse {
            quiz_id: s.quiz_id,
            quiz_setting_id: s.id,
            instructions: s.instructions,
            time_limit_secs: s.time_limit_secs,
            start_time: s.start_time,
            end_time: s.end_time,
        }
    }
}

/// A question added straight to a quiz, and the quiz after the addition.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QuizQuestionResponse {
    pub question: QuestionResponse,
    pub quiz: QuizResponse,
}
