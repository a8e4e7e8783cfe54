use std::collections::BTreeSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::database::store::QuizStore;
use crate::error::{Error, Result};
use crate::models::answer_sheet::{AnswerSheet, AnswerSlot};
use crate::models::user::CurrentUser;
use crate::services::grading_service::SlotSelections;
use crate::utils::time::now;

#[derive(Clone)]
pub struct AttemptService {
    store: Arc<dyn QuizStore>,
}

fn log_rejection(sheet_id: Uuid, err: &Error) {
    match err {
        Error::Expired { deadline } => {
            tracing::warn!(answer_sheet_id = %sheet_id, %deadline, "late submission rejected")
        }
        Error::AlreadyGraded(_) => {
            tracing::warn!(answer_sheet_id = %sheet_id, "submission to graded sheet rejected")
        }
        _ => {}
    }
}

impl AttemptService {
    pub fn new(store: Arc<dyn QuizStore>) -> Self {
        Self { store }
    }

    /// Sheets are visible to their owner and to staff. Anyone else gets
    /// `NotFound` so sheet ids cannot be probed.
    pub async fn get_answer_sheet(
        &self,
        sheet_id: Uuid,
        user: &CurrentUser,
    ) -> Result<(AnswerSheet, Vec<AnswerSlot>)> {
        let sheet = self.store.fetch_answer_sheet(sheet_id).await?;
        if sheet.student_id != user.id && !user.is_staff() {
            return Err(Error::NotFound(format!("Answer sheet {} not found", sheet_id)));
        }
        let slots = self.store.answer_slots(sheet_id).await?;
        Ok((sheet, slots))
    }

    /// Only the student who owns a sheet may write to it.
    pub async fn ensure_owner(&self, sheet_id: Uuid, user: &CurrentUser) -> Result<()> {
        let sheet = self.store.fetch_answer_sheet(sheet_id).await?;
        if sheet.student_id != user.id {
            return Err(Error::NotFound(format!("Answer sheet {} not found", sheet_id)));
        }
        Ok(())
    }

    pub async fn save_answer_slot(
        &self,
        sheet_id: Uuid,
        question_id: i64,
        option_ids: Vec<i64>,
    ) -> Result<AnswerSlot> {
        let selected: BTreeSet<i64> = option_ids.into_iter().collect();
        self.store
            .save_answer_slot(sheet_id, question_id, selected, now())
            .await
            .map_err(|e| {
                log_rejection(sheet_id, &e);
                e
            })
    }

    pub async fn submit_answers(
        &self,
        sheet_id: Uuid,
        submissions: SlotSelections,
    ) -> Result<(AnswerSheet, Vec<AnswerSlot>)> {
        let (sheet, slots) = self
            .store
            .complete_answer_sheet(sheet_id, &submissions, now())
            .await
            .map_err(|e| {
                log_rejection(sheet_id, &e);
                e
            })?;

        tracing::info!(
            answer_sheet_id = %sheet.id,
            student_id = sheet.student_id,
            quiz_id = sheet.quiz_id,
            attempt_score = sheet.attempt_score.unwrap_or_default(),
            total_points = sheet.total_points,
            "attempt graded"
        );
        Ok((sheet, slots))
    }
}
