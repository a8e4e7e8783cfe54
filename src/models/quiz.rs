use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::question::Difficulty;

/// Upper bound for a setting's time limit: one week.
pub const MAX_TIME_LIMIT_SECS: i64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Quiz {
    pub id: i64,
    pub course_id: i64,
    pub quiz_title: String,
    pub difficulty_level: String,
    pub random_flag: bool,
    pub total_points: i32,
    #[sqlx(skip)]
    #[serde(default)]
    pub topic_ids: Vec<i64>,
    #[sqlx(skip)]
    #[serde(default)]
    pub question_ids: Vec<i64>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewQuiz {
    pub course_id: i64,
    pub quiz_title: String,
    pub difficulty_level: Difficulty,
    pub random_flag: bool,
    pub total_points: i32,
}

/// A time-windowed access grant for a quiz. A quiz may carry several.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QuizSetting {
    pub id: i64,
    pub quiz_id: i64,
    pub instructions: String,
    pub time_limit_secs: i64,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub quiz_key: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl QuizSetting {
    /// Missing bounds leave that side of the window open.
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        let after_start = self.start_time.map_or(true, |start| start <= now);
        let before_end = self.end_time.map_or(true, |end| now <= end);
        after_start && before_end
    }
}

#[derive(Debug, Clone)]
pub struct NewQuizSetting {
    pub quiz_id: i64,
    pub instructions: String,
    pub time_limit_secs: i64,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub quiz_key: String,
}
