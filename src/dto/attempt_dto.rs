use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::error::{Error, Result};
use crate::models::answer_sheet::{AnswerSheet, AnswerSlot};
use crate::services::grading_service::SlotSelections;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct StartAttemptPayload {
    pub quiz_id: i64,
    #[validate(length(min = 1, message = "Quiz key cannot be empty"))]
    pub quiz_key: String,
}

/// What a student sees when an attempt starts or resumes.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RuntimeQuizPayload {
    pub answer_sheet_id: Uuid,
    pub quiz_id: i64,
    pub quiz_title: String,
    pub course_id: i64,
    pub student_id: i64,
    pub instructions: String,
    pub time_limit_secs: i64,
    pub time_start: DateTime<Utc>,
    pub total_points: i32,
    pub quiz_key: String,
    pub quiz_questions: Vec<RuntimeQuestion>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RuntimeQuestion {
    pub id: i64,
    pub question_text: String,
    pub points: i32,
    pub question_type: String,
    pub options: Vec<RuntimeOption>,
}

/// Deliberately has no correctness field.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RuntimeOption {
    pub id: i64,
    pub option_text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct SaveAnswerSlotPayload {
    pub question_id: i64,
    #[serde(default)]
    pub selected_option_ids: Vec<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct SubmitAnswersPayload {
    /// Selected option ids keyed by question id.
    #[serde(default)]
    pub slots: HashMap<i64, Vec<i64>>,
}

impl SubmitAnswersPayload {
    pub fn into_selections(self) -> SlotSelections {
        self.slots
            .into_iter()
            .map(|(question_id, options)| (question_id, options.into_iter().collect()))
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AnswerSlotResponse {
    pub question_id: i64,
    pub question_type: String,
    pub selected_option_ids: Vec<i64>,
    pub points_awarded: i32,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<AnswerSlot> for AnswerSlotResponse {
    fn from(slot: AnswerSlot) -> Self {
        AnswerSlotResponse {
            question_id: slot.question_id,
            question_type: slot.question_type,
            selected_option_ids: slot.selected_option_ids,
            points_awarded: slot.points_awarded,
            updated_at: slot.updated_at,
        }
    }
}

/// An attempt with its slots. After grading this is the graded result:
/// per-slot points, `attempt_score` and `time_finish` are all set.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AnswerSheetResponse {
    pub id: Uuid,
    pub student_id: i64,
    pub quiz_id: i64,
    pub status: String,
    pub time_limit_secs: i64,
    pub time_start: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    pub time_finish: Option<DateTime<Utc>>,
    pub total_points: i32,
    pub attempt_score: Option<i32>,
    pub slots: Vec<AnswerSlotResponse>,
}

impl TryFrom<(AnswerSheet, Vec<AnswerSlot>)> for AnswerSheetResponse {
    type Error = Error;

    fn try_from((sheet, slots): (AnswerSheet, Vec<AnswerSlot>)) -> Result<Self> {
        Ok(AnswerSheetResponse {
            deadline: sheet.deadline()?,
            id: sheet.id,
            student_id: sheet.student_id,
            quiz_id: sheet.quiz_id,
            status: sheet.status,
            time_limit_secs: sheet.time_limit_secs,
            time_start: sheet.time_start,
            time_finish: sheet.time_finish,
            total_points: sheet.total_points,
            attempt_score: sheet.attempt_score,
            slots: slots.into_iter().map(AnswerSlotResponse::from).collect(),
        })
    }
}
