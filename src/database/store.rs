use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::error::Result;
use crate::models::answer_sheet::{AnswerSheet, AnswerSlot, NewAnswerSheet};
use crate::models::question::{NewQuestion, Question};
use crate::models::quiz::{NewQuiz, NewQuizSetting, Quiz, QuizSetting};
use crate::services::grading_service::SlotSelections;

/// Transactional persistence for questions, quizzes and attempts.
///
/// Every method that writes more than one row does so atomically. Questions
/// are always returned with their options attached.
#[async_trait]
pub trait QuizStore: Send + Sync {
    async fn insert_question(&self, question: NewQuestion) -> Result<Question>;

    async fn fetch_question(&self, question_id: i64) -> Result<Question>;

    /// Verified questions attached directly to any of `topic_ids`, ordered by id.
    async fn verified_questions_for_topics(&self, topic_ids: &[i64]) -> Result<Vec<Question>>;

    async fn insert_quiz(
        &self,
        quiz: NewQuiz,
        topic_ids: &[i64],
        questions: &[Question],
    ) -> Result<Quiz>;

    async fn fetch_quiz(&self, quiz_id: i64) -> Result<Quiz>;

    async fn list_quizzes(&self, course_id: i64, offset: i64, limit: i64) -> Result<Vec<Quiz>>;

    /// Removes the quiz together with its links, settings and attempts.
    async fn delete_quiz(&self, quiz_id: i64) -> Result<()>;

    async fn quiz_questions(&self, quiz_id: i64) -> Result<Vec<Question>>;

    /// Applies a topic delta under a per-quiz lock and recomputes
    /// `total_points` from the resulting question set. The explicit link
    /// methods below follow the same locking and recompute rule.
    async fn update_quiz_topics(&self, quiz_id: i64, add: &[i64], remove: &[i64]) -> Result<Quiz>;

    /// Stores a new question and links it to the quiz in one transaction.
    async fn insert_quiz_question(
        &self,
        quiz_id: i64,
        question: NewQuestion,
    ) -> Result<(Question, Quiz)>;

    /// Links an existing question. `Conflict` if it is already part of the quiz.
    async fn link_quiz_question(&self, quiz_id: i64, question_id: i64) -> Result<Quiz>;

    /// `NotFound` if the question is not part of the quiz.
    async fn unlink_quiz_question(&self, quiz_id: i64, question_id: i64) -> Result<Quiz>;

    async fn insert_quiz_setting(&self, setting: NewQuizSetting) -> Result<QuizSetting>;

    async fn quiz_settings(&self, quiz_id: i64) -> Result<Vec<QuizSetting>>;

    async fn fetch_quiz_setting(&self, setting_id: i64) -> Result<QuizSetting>;

    async fn update_quiz_setting(&self, setting: QuizSetting) -> Result<QuizSetting>;

    async fn delete_quiz_setting(&self, setting_id: i64) -> Result<()>;

    async fn find_answer_sheet(&self, student_id: i64, quiz_id: i64)
        -> Result<Option<AnswerSheet>>;

    /// `None` when the student already holds a sheet for the quiz, including
    /// one created concurrently.
    async fn insert_answer_sheet(&self, sheet: NewAnswerSheet) -> Result<Option<AnswerSheet>>;

    async fn fetch_answer_sheet(&self, sheet_id: Uuid) -> Result<AnswerSheet>;

    async fn answer_slots(&self, sheet_id: Uuid) -> Result<Vec<AnswerSlot>>;

    /// Upserts one slot if the sheet still accepts answers at `now`.
    async fn save_answer_slot(
        &self,
        sheet_id: Uuid,
        question_id: i64,
        selected: BTreeSet<i64>,
        now: DateTime<Utc>,
    ) -> Result<AnswerSlot>;

    /// Grades the sheet and moves it to `completed`. At most one concurrent
    /// caller succeeds; the rest see `AlreadyGraded`.
    async fn complete_answer_sheet(
        &self,
        sheet_id: Uuid,
        submitted: &SlotSelections,
        now: DateTime<Utc>,
    ) -> Result<(AnswerSheet, Vec<AnswerSlot>)>;
}
