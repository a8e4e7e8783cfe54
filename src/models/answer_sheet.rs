use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::question::Question;

/// Lifecycle of an attempt. Transitions only move forward:
/// `to_attempt -> in_progress -> completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    ToAttempt,
    InProgress,
    Completed,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::ToAttempt => "to_attempt",
            AttemptStatus::InProgress => "in_progress",
            AttemptStatus::Completed => "completed",
        }
    }
}

impl FromStr for AttemptStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "to_attempt" => Ok(AttemptStatus::ToAttempt),
            "in_progress" => Ok(AttemptStatus::InProgress),
            "completed" => Ok(AttemptStatus::Completed),
            other => Err(Error::Internal(format!("unknown attempt status '{}'", other))),
        }
    }
}

/// One student's attempt at a quiz.
///
/// `questions_snapshot` freezes the quiz's questions and options as they were
/// when the attempt started; grading never looks at the live question bank.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AnswerSheet {
    pub id: Uuid,
    pub student_id: i64,
    pub quiz_id: i64,
    pub time_limit_secs: i64,
    pub time_start: DateTime<Utc>,
    pub time_finish: Option<DateTime<Utc>>,
    pub status: String,
    pub total_points: i32,
    pub attempt_score: Option<i32>,
    pub quiz_key: String,
    pub questions_snapshot: Json<Vec<Question>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl AnswerSheet {
    pub fn status(&self) -> Result<AttemptStatus> {
        self.status.parse()
    }

    /// Fails only for rows whose limit was never range-checked.
    pub fn deadline(&self) -> Result<DateTime<Utc>> {
        Duration::try_seconds(self.time_limit_secs)
            .and_then(|limit| self.time_start.checked_add_signed(limit))
            .ok_or_else(|| {
                Error::Internal(format!(
                    "answer sheet {} has an out-of-range time limit of {}s",
                    self.id, self.time_limit_secs
                ))
            })
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> Result<bool> {
        Ok(now > self.deadline()?)
    }

    pub fn snapshot_question(&self, question_id: i64) -> Option<&Question> {
        self.questions_snapshot.iter().find(|q| q.id == question_id)
    }
}

#[derive(Debug, Clone)]
pub struct NewAnswerSheet {
    pub student_id: i64,
    pub quiz_id: i64,
    pub time_limit_secs: i64,
    pub time_start: DateTime<Utc>,
    pub total_points: i32,
    pub quiz_key: String,
    pub questions_snapshot: Vec<Question>,
}

/// The submission for one question within an attempt.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AnswerSlot {
    pub id: i64,
    pub answer_sheet_id: Uuid,
    pub question_id: i64,
    pub question_type: String,
    pub points_awarded: i32,
    pub selected_option_ids: Vec<i64>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}
