use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::database::store::QuizStore;
use crate::dto::attempt_dto::{RuntimeOption, RuntimeQuestion, RuntimeQuizPayload};
use crate::error::{Error, Result};
use crate::models::answer_sheet::{AnswerSheet, AttemptStatus, NewAnswerSheet};
use crate::models::question::Question;
use crate::models::quiz::{Quiz, QuizSetting};
use crate::services::quiz_setting_service::QuizSettingService;
use crate::utils::time::now;

#[derive(Clone)]
pub struct RuntimeService {
    store: Arc<dyn QuizStore>,
    settings: QuizSettingService,
}

/// Strips correctness data and shuffles question order. Option order is
/// shuffled too when `shuffle_options` is set.
pub fn build_runtime_questions<R: Rng + ?Sized>(
    questions: &[Question],
    shuffle_options: bool,
    rng: &mut R,
) -> Vec<RuntimeQuestion> {
    let mut runtime: Vec<RuntimeQuestion> = questions
        .iter()
        .map(|q| {
            let mut options: Vec<RuntimeOption> = q
                .options
                .iter()
                .map(|o| RuntimeOption {
                    id: o.id,
                    option_text: o.option_text.clone(),
                })
                .collect();
            if shuffle_options {
                options.shuffle(rng);
            }
            RuntimeQuestion {
                id: q.id,
                question_text: q.question_text.clone(),
                points: q.points,
                question_type: q.question_type.clone(),
                options,
            }
        })
        .collect();
    runtime.shuffle(rng);
    runtime
}

fn runtime_payload(
    quiz: &Quiz,
    setting: &QuizSetting,
    sheet: &AnswerSheet,
    questions: &[Question],
) -> RuntimeQuizPayload {
    let quiz_questions =
        build_runtime_questions(questions, quiz.random_flag, &mut rand::thread_rng());
    RuntimeQuizPayload {
        answer_sheet_id: sheet.id,
        quiz_id: quiz.id,
        quiz_title: quiz.quiz_title.clone(),
        course_id: quiz.course_id,
        student_id: sheet.student_id,
        instructions: setting.instructions.clone(),
        time_limit_secs: sheet.time_limit_secs,
        time_start: sheet.time_start,
        total_points: sheet.total_points,
        quiz_key: sheet.quiz_key.clone(),
        quiz_questions,
    }
}

impl RuntimeService {
    pub fn new(store: Arc<dyn QuizStore>, settings: QuizSettingService) -> Self {
        Self { store, settings }
    }

    /// Starts an attempt, or resumes the student's in-progress one with the
    /// questions they have not answered yet. Order is reshuffled on every call.
    pub async fn generate_runtime_quiz(
        &self,
        quiz_id: i64,
        quiz_key: &str,
        student_id: i64,
    ) -> Result<RuntimeQuizPayload> {
        let now = now();
        let quiz = self.store.fetch_quiz(quiz_id).await?;
        let setting = self.settings.validate_quiz_key(quiz_id, quiz_key, now).await?;

        if let Some(sheet) = self.store.find_answer_sheet(student_id, quiz_id).await? {
            return self.resume(&quiz, &setting, sheet, now).await;
        }

        let questions = self.store.quiz_questions(quiz_id).await?;
        if questions.is_empty() {
            return Err(Error::Validation(format!(
                "quiz {} has no questions to attempt",
                quiz_id
            )));
        }

        let inserted = self
            .store
            .insert_answer_sheet(NewAnswerSheet {
                student_id,
                quiz_id,
                time_limit_secs: setting.time_limit_secs,
                time_start: now,
                total_points: quiz.total_points,
                quiz_key: setting.quiz_key.clone(),
                questions_snapshot: questions.clone(),
            })
            .await?;

        // A concurrent request from the same student created the sheet first.
        let Some(sheet) = inserted else {
            let existing = self
                .store
                .find_answer_sheet(student_id, quiz_id)
                .await?
                .ok_or_else(|| {
                    Error::Internal(format!(
                        "answer sheet for student {} on quiz {} vanished after insert conflict",
                        student_id, quiz_id
                    ))
                })?;
            return self.resume(&quiz, &setting, existing, now).await;
        };

        tracing::info!(
            answer_sheet_id = %sheet.id,
            quiz_id,
            student_id,
            questions = questions.len(),
            "attempt started"
        );
        Ok(runtime_payload(&quiz, &setting, &sheet, &questions))
    }

    async fn resume(
        &self,
        quiz: &Quiz,
        setting: &QuizSetting,
        sheet: AnswerSheet,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<RuntimeQuizPayload> {
        if sheet.status()? == AttemptStatus::Completed {
            return Err(Error::Conflict(format!(
                "student {} has already completed quiz {}",
                sheet.student_id, sheet.quiz_id
            )));
        }
        let deadline = sheet.deadline()?;
        if now > deadline {
            tracing::warn!(answer_sheet_id = %sheet.id, "resume requested after deadline");
            return Err(Error::Expired { deadline });
        }

        let answered: BTreeSet<i64> = self
            .store
            .answer_slots(sheet.id)
            .await?
            .into_iter()
            .map(|slot| slot.question_id)
            .collect();
        let remaining: Vec<Question> = sheet
            .questions_snapshot
            .iter()
            .filter(|q| !answered.contains(&q.id))
            .cloned()
            .collect();

        tracing::info!(
            answer_sheet_id = %sheet.id,
            remaining = remaining.len(),
            "attempt resumed"
        );
        Ok(runtime_payload(quiz, setting, &sheet, &remaining))
    }
}
