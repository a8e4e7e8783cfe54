use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{types::Json, PgConnection, PgPool};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::database::store::QuizStore;
use crate::error::{Error, Result};
use crate::models::answer_sheet::{AnswerSheet, AnswerSlot, AttemptStatus, NewAnswerSheet};
use crate::models::question::{NewQuestion, Question, QuestionOption};
use crate::models::quiz::{NewQuiz, NewQuizSetting, Quiz, QuizSetting};
use crate::services::grading_service::{
    ensure_accepting, grade_attempt, merge_selections, validate_selection, SlotSelections,
};

const QUESTION_COLUMNS: &str = "q.id, q.topic_id, q.question_text, q.points, q.difficulty, \
     q.question_type, q.is_verified, q.created_at";

#[derive(Clone)]
pub struct PgQuizStore {
    pool: PgPool,
}

impl PgQuizStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

async fn attach_options(conn: &mut PgConnection, questions: &mut [Question]) -> Result<()> {
    if questions.is_empty() {
        return Ok(());
    }
    let ids: Vec<i64> = questions.iter().map(|q| q.id).collect();
    let options = sqlx::query_as::<_, QuestionOption>(
        r#"
        SELECT id, question_id, option_text, is_correct
        FROM question_options
        WHERE question_id = ANY($1)
        ORDER BY id
        "#,
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    for question in questions.iter_mut() {
        question.options = options
            .iter()
            .filter(|o| o.question_id == question.id)
            .cloned()
            .collect();
    }
    Ok(())
}

async fn attach_links(conn: &mut PgConnection, quiz: &mut Quiz) -> Result<()> {
    quiz.topic_ids = sqlx::query_scalar::<_, i64>(
        "SELECT topic_id FROM quiz_topics WHERE quiz_id = $1 ORDER BY topic_id",
    )
    .bind(quiz.id)
    .fetch_all(&mut *conn)
    .await?;

    quiz.question_ids = sqlx::query_scalar::<_, i64>(
        "SELECT question_id FROM quiz_questions WHERE quiz_id = $1 ORDER BY question_id",
    )
    .bind(quiz.id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(())
}

async fn load_quiz(conn: &mut PgConnection, quiz_id: i64) -> Result<Quiz> {
    let mut quiz = sqlx::query_as::<_, Quiz>("SELECT * FROM quizzes WHERE id = $1")
        .bind(quiz_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Quiz {} not found", quiz_id)))?;
    attach_links(conn, &mut quiz).await?;
    Ok(quiz)
}

/// Serializes every mutation of one quiz's question set.
async fn lock_quiz(conn: &mut PgConnection, quiz_id: i64) -> Result<()> {
    sqlx::query_scalar::<_, i64>("SELECT id FROM quizzes WHERE id = $1 FOR UPDATE")
        .bind(quiz_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Quiz {} not found", quiz_id)))?;
    Ok(())
}

/// Recomputes `total_points` from the full current question set. Must run
/// under `lock_quiz`.
async fn recompute_total_points(conn: &mut PgConnection, quiz_id: i64) -> Result<()> {
    let sum = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COALESCE(SUM(q.points), 0)::BIGINT
        FROM quiz_questions qq
        JOIN questions q ON q.id = qq.question_id
        WHERE qq.quiz_id = $1
        "#,
    )
    .bind(quiz_id)
    .fetch_one(&mut *conn)
    .await?;
    let total = i32::try_from(sum).map_err(|_| {
        Error::Validation("quiz total points exceed the supported range".to_string())
    })?;

    sqlx::query("UPDATE quizzes SET total_points = $2, updated_at = NOW() WHERE id = $1")
        .bind(quiz_id)
        .bind(total)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn insert_question_rows(conn: &mut PgConnection, question: &NewQuestion) -> Result<Question> {
    let mut created = sqlx::query_as::<_, Question>(
        r#"
        INSERT INTO questions
            (topic_id, question_text, points, difficulty, question_type, is_verified)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id, topic_id, question_text, points, difficulty, question_type,
                  is_verified, created_at
        "#,
    )
    .bind(question.topic_id)
    .bind(&question.question_text)
    .bind(question.points)
    .bind(question.difficulty.as_str())
    .bind(question.kind.as_str())
    .bind(question.is_verified)
    .fetch_one(&mut *conn)
    .await?;

    for option in &question.options {
        let stored = sqlx::query_as::<_, QuestionOption>(
            r#"
            INSERT INTO question_options (question_id, option_text, is_correct)
            VALUES ($1, $2, $3)
            RETURNING id, question_id, option_text, is_correct
            "#,
        )
        .bind(created.id)
        .bind(&option.option_text)
        .bind(option.is_correct)
        .fetch_one(&mut *conn)
        .await?;
        created.options.push(stored);
    }
    Ok(created)
}

async fn lock_answer_sheet(conn: &mut PgConnection, sheet_id: Uuid) -> Result<AnswerSheet> {
    sqlx::query_as::<_, AnswerSheet>("SELECT * FROM answer_sheets WHERE id = $1 FOR UPDATE")
        .bind(sheet_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Answer sheet {} not found", sheet_id)))
}

async fn upsert_slot(
    conn: &mut PgConnection,
    sheet_id: Uuid,
    question_id: i64,
    question_type: &str,
    selected: Vec<i64>,
    points_awarded: i32,
) -> Result<AnswerSlot> {
    let slot = sqlx::query_as::<_, AnswerSlot>(
        r#"
        INSERT INTO answer_slots
            (answer_sheet_id, question_id, question_type, selected_option_ids, points_awarded)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (answer_sheet_id, question_id) DO UPDATE
        SET selected_option_ids = EXCLUDED.selected_option_ids,
            points_awarded = EXCLUDED.points_awarded,
            updated_at = NOW()
        RETURNING *
        "#,
    )
    .bind(sheet_id)
    .bind(question_id)
    .bind(question_type)
    .bind(selected)
    .bind(points_awarded)
    .fetch_one(&mut *conn)
    .await?;
    Ok(slot)
}

async fn load_slots(conn: &mut PgConnection, sheet_id: Uuid) -> Result<Vec<AnswerSlot>> {
    let slots = sqlx::query_as::<_, AnswerSlot>(
        "SELECT * FROM answer_slots WHERE answer_sheet_id = $1 ORDER BY question_id",
    )
    .bind(sheet_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(slots)
}

#[async_trait]
impl QuizStore for PgQuizStore {
    async fn insert_question(&self, question: NewQuestion) -> Result<Question> {
        let mut tx = self.pool.begin().await?;
        let created = insert_question_rows(&mut tx, &question).await?;
        tx.commit().await?;
        Ok(created)
    }

    async fn fetch_question(&self, question_id: i64) -> Result<Question> {
        let mut conn = self.pool.acquire().await?;
        let question = sqlx::query_as::<_, Question>(&format!(
            "SELECT {} FROM questions q WHERE q.id = $1",
            QUESTION_COLUMNS
        ))
        .bind(question_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Question {} not found", question_id)))?;

        let mut questions = vec![question];
        attach_options(&mut conn, &mut questions).await?;
        questions
            .pop()
            .ok_or_else(|| Error::Internal("question vanished while loading".to_string()))
    }

    async fn verified_questions_for_topics(&self, topic_ids: &[i64]) -> Result<Vec<Question>> {
        let mut conn = self.pool.acquire().await?;
        let mut questions = sqlx::query_as::<_, Question>(&format!(
            "SELECT {} FROM questions q WHERE q.topic_id = ANY($1) AND q.is_verified ORDER BY q.id",
            QUESTION_COLUMNS
        ))
        .bind(topic_ids)
        .fetch_all(&mut *conn)
        .await?;

        attach_options(&mut conn, &mut questions).await?;
        Ok(questions)
    }

    async fn insert_quiz(
        &self,
        quiz: NewQuiz,
        topic_ids: &[i64],
        questions: &[Question],
    ) -> Result<Quiz> {
        let mut tx = self.pool.begin().await?;

        let quiz_id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO quizzes (course_id, quiz_title, difficulty_level, random_flag, total_points)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(quiz.course_id)
        .bind(&quiz.quiz_title)
        .bind(quiz.difficulty_level.as_str())
        .bind(quiz.random_flag)
        .bind(quiz.total_points)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO quiz_topics (quiz_id, topic_id) SELECT $1, UNNEST($2::BIGINT[])",
        )
        .bind(quiz_id)
        .bind(topic_ids)
        .execute(&mut *tx)
        .await?;

        let question_ids: Vec<i64> = questions.iter().map(|q| q.id).collect();
        let question_topics: Vec<i64> = questions.iter().map(|q| q.topic_id).collect();
        sqlx::query(
            r#"
            INSERT INTO quiz_questions (quiz_id, question_id, topic_id)
            SELECT $1, question_id, topic_id
            FROM UNNEST($2::BIGINT[], $3::BIGINT[]) AS t(question_id, topic_id)
            "#,
        )
        .bind(quiz_id)
        .bind(&question_ids)
        .bind(&question_topics)
        .execute(&mut *tx)
        .await?;

        let created = load_quiz(&mut tx, quiz_id).await?;
        tx.commit().await?;
        Ok(created)
    }

    async fn fetch_quiz(&self, quiz_id: i64) -> Result<Quiz> {
        let mut conn = self.pool.acquire().await?;
        load_quiz(&mut conn, quiz_id).await
    }

    async fn list_quizzes(&self, course_id: i64, offset: i64, limit: i64) -> Result<Vec<Quiz>> {
        let mut conn = self.pool.acquire().await?;
        let mut quizzes = sqlx::query_as::<_, Quiz>(
            "SELECT * FROM quizzes WHERE course_id = $1 ORDER BY id OFFSET $2 LIMIT $3",
        )
        .bind(course_id)
        .bind(offset)
        .bind(limit)
        .fetch_all(&mut *conn)
        .await?;

        for quiz in quizzes.iter_mut() {
            attach_links(&mut conn, quiz).await?;
        }
        Ok(quizzes)
    }

    async fn delete_quiz(&self, quiz_id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM quizzes WHERE id = $1")
            .bind(quiz_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Quiz {} not found", quiz_id)));
        }
        Ok(())
    }

    async fn quiz_questions(&self, quiz_id: i64) -> Result<Vec<Question>> {
        let mut conn = self.pool.acquire().await?;
        let mut questions = sqlx::query_as::<_, Question>(&format!(
            r#"
            SELECT {}
            FROM questions q
            JOIN quiz_questions qq ON qq.question_id = q.id
            WHERE qq.quiz_id = $1
            ORDER BY q.id
            "#,
            QUESTION_COLUMNS
        ))
        .bind(quiz_id)
        .fetch_all(&mut *conn)
        .await?;

        attach_options(&mut conn, &mut questions).await?;
        Ok(questions)
    }

    async fn update_quiz_topics(&self, quiz_id: i64, add: &[i64], remove: &[i64]) -> Result<Quiz> {
        let mut tx = self.pool.begin().await?;
        lock_quiz(&mut tx, quiz_id).await?;

        if !remove.is_empty() {
            sqlx::query("DELETE FROM quiz_questions WHERE quiz_id = $1 AND topic_id = ANY($2)")
                .bind(quiz_id)
                .bind(remove)
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM quiz_topics WHERE quiz_id = $1 AND topic_id = ANY($2)")
                .bind(quiz_id)
                .bind(remove)
                .execute(&mut *tx)
                .await?;
        }

        if !add.is_empty() {
            sqlx::query(
                r#"
                INSERT INTO quiz_topics (quiz_id, topic_id)
                SELECT $1, UNNEST($2::BIGINT[])
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(quiz_id)
            .bind(add)
            .execute(&mut *tx)
            .await?;
            sqlx::query(
                r#"
                INSERT INTO quiz_questions (quiz_id, question_id, topic_id)
                SELECT $1, id, topic_id
                FROM questions
                WHERE topic_id = ANY($2) AND is_verified
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(quiz_id)
            .bind(add)
            .execute(&mut *tx)
            .await?;
        }

        recompute_total_points(&mut tx, quiz_id).await?;
        let updated = load_quiz(&mut tx, quiz_id).await?;
        tx.commit().await?;
        Ok(updated)
    }

    async fn insert_quiz_question(
        &self,
        quiz_id: i64,
        question: NewQuestion,
    ) -> Result<(Question, Quiz)> {
        let mut tx = self.pool.begin().await?;
        lock_quiz(&mut tx, quiz_id).await?;

        let created = insert_question_rows(&mut tx, &question).await?;
        sqlx::query("INSERT INTO quiz_questions (quiz_id, question_id, topic_id) VALUES ($1, $2, $3)")
            .bind(quiz_id)
            .bind(created.id)
            .bind(created.topic_id)
            .execute(&mut *tx)
            .await?;

        recompute_total_points(&mut tx, quiz_id).await?;
        let updated = load_quiz(&mut tx, quiz_id).await?;
        tx.commit().await?;
        Ok((created, updated))
    }

    async fn link_quiz_question(&self, quiz_id: i64, question_id: i64) -> Result<Quiz> {
        let mut tx = self.pool.begin().await?;
        lock_quiz(&mut tx, quiz_id).await?;

        let topic_id = sqlx::query_scalar::<_, i64>("SELECT topic_id FROM questions WHERE id = $1")
            .bind(question_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Question {} not found", question_id)))?;

        let linked = sqlx::query(
            r#"
            INSERT INTO quiz_questions (quiz_id, question_id, topic_id)
            VALUES ($1, $2, $3)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(quiz_id)
        .bind(question_id)
        .bind(topic_id)
        .execute(&mut *tx)
        .await?;
        if linked.rows_affected() == 0 {
            return Err(Error::Conflict(format!(
                "question {} is already part of quiz {}",
                question_id, quiz_id
            )));
        }

        recompute_total_points(&mut tx, quiz_id).await?;
        let updated = load_quiz(&mut tx, quiz_id).await?;
        tx.commit().await?;
        Ok(updated)
    }

    async fn unlink_quiz_question(&self, quiz_id: i64, question_id: i64) -> Result<Quiz> {
        let mut tx = self.pool.begin().await?;
        lock_quiz(&mut tx, quiz_id).await?;

        let removed = sqlx::query("DELETE FROM quiz_questions WHERE quiz_id = $1 AND question_id = $2")
            .bind(quiz_id)
            .bind(question_id)
            .execute(&mut *tx)
            .await?;
        if removed.rows_affected() == 0 {
            return Err(Error::NotFound(format!(
                "question {} is not part of quiz {}",
                question_id, quiz_id
            )));
        }

        recompute_total_points(&mut tx, quiz_id).await?;
        let updated = load_quiz(&mut tx, quiz_id).await?;
        tx.commit().await?;
        Ok(updated)
    }

    async fn insert_quiz_setting(&self, setting: NewQuizSetting) -> Result<QuizSetting> {
        let created = sqlx::query_as::<_, QuizSetting>(
            r#"
            INSERT INTO quiz_settings
                (quiz_id, instructions, time_limit_secs, start_time, end_time, quiz_key)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(setting.quiz_id)
        .bind(&setting.instructions)
        .bind(setting.time_limit_secs)
        .bind(setting.start_time)
        .bind(setting.end_time)
        .bind(&setting.quiz_key)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn quiz_settings(&self, quiz_id: i64) -> Result<Vec<QuizSetting>> {
        let settings = sqlx::query_as::<_, QuizSetting>(
            "SELECT * FROM quiz_settings WHERE quiz_id = $1 ORDER BY id",
        )
        .bind(quiz_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(settings)
    }

    async fn fetch_quiz_setting(&self, setting_id: i64) -> Result<QuizSetting> {
        sqlx::query_as::<_, QuizSetting>("SELECT * FROM quiz_settings WHERE id = $1")
            .bind(setting_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Quiz setting {} not found", setting_id)))
    }

    async fn update_quiz_setting(&self, setting: QuizSetting) -> Result<QuizSetting> {
        sqlx::query_as::<_, QuizSetting>(
            r#"
            UPDATE quiz_settings
            SET instructions = $2, time_limit_secs = $3, start_time = $4, end_time = $5,
                quiz_key = $6
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(setting.id)
        .bind(&setting.instructions)
        .bind(setting.time_limit_secs)
        .bind(setting.start_time)
        .bind(setting.end_time)
        .bind(&setting.quiz_key)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Quiz setting {} not found", setting.id)))
    }

    async fn delete_quiz_setting(&self, setting_id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM quiz_settings WHERE id = $1")
            .bind(setting_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Quiz setting {} not found", setting_id)));
        }
        Ok(())
    }

    async fn find_answer_sheet(
        &self,
        student_id: i64,
        quiz_id: i64,
    ) -> Result<Option<AnswerSheet>> {
        let sheet = sqlx::query_as::<_, AnswerSheet>(
            "SELECT * FROM answer_sheets WHERE student_id = $1 AND quiz_id = $2",
        )
        .bind(student_id)
        .bind(quiz_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(sheet)
    }

    async fn insert_answer_sheet(&self, sheet: NewAnswerSheet) -> Result<Option<AnswerSheet>> {
        let created = sqlx::query_as::<_, AnswerSheet>(
            r#"
            INSERT INTO answer_sheets (
                id, student_id, quiz_id, time_limit_secs, time_start, status,
                total_points, quiz_key, questions_snapshot
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (student_id, quiz_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(sheet.student_id)
        .bind(sheet.quiz_id)
        .bind(sheet.time_limit_secs)
        .bind(sheet.time_start)
        .bind(AttemptStatus::InProgress.as_str())
        .bind(sheet.total_points)
        .bind(&sheet.quiz_key)
        .bind(Json(&sheet.questions_snapshot))
        .fetch_optional(&self.pool)
        .await?;
        Ok(created)
    }

    async fn fetch_answer_sheet(&self, sheet_id: Uuid) -> Result<AnswerSheet> {
        sqlx::query_as::<_, AnswerSheet>("SELECT * FROM answer_sheets WHERE id = $1")
            .bind(sheet_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Answer sheet {} not found", sheet_id)))
    }

    async fn answer_slots(&self, sheet_id: Uuid) -> Result<Vec<AnswerSlot>> {
        let mut conn = self.pool.acquire().await?;
        load_slots(&mut conn, sheet_id).await
    }

    async fn save_answer_slot(
        &self,
        sheet_id: Uuid,
        question_id: i64,
        selected: BTreeSet<i64>,
        now: DateTime<Utc>,
    ) -> Result<AnswerSlot> {
        let mut tx = self.pool.begin().await?;
        let sheet = lock_answer_sheet(&mut tx, sheet_id).await?;
        ensure_accepting(&sheet, now)?;

        let question = sheet.snapshot_question(question_id).ok_or_else(|| {
            Error::Validation(format!("question {} is not part of this attempt", question_id))
        })?;
        let kind = validate_selection(question, &selected)?;

        let slot = upsert_slot(
            &mut tx,
            sheet_id,
            question_id,
            kind.as_str(),
            selected.into_iter().collect(),
            0,
        )
        .await?;

        tx.commit().await?;
        Ok(slot)
    }

    async fn complete_answer_sheet(
        &self,
        sheet_id: Uuid,
        submitted: &SlotSelections,
        now: DateTime<Utc>,
    ) -> Result<(AnswerSheet, Vec<AnswerSlot>)> {
        let mut tx = self.pool.begin().await?;
        let sheet = lock_answer_sheet(&mut tx, sheet_id).await?;
        ensure_accepting(&sheet, now)?;

        let saved = load_slots(&mut tx, sheet_id).await?;
        let selections = merge_selections(&saved, submitted);
        let outcome = grade_attempt(&sheet.questions_snapshot, &selections)?;

        for graded in &outcome.slots {
            upsert_slot(
                &mut tx,
                sheet_id,
                graded.question_id,
                graded.kind.as_str(),
                graded.selected_option_ids.clone(),
                graded.points_awarded,
            )
            .await?;
        }

        let completed = sqlx::query_as::<_, AnswerSheet>(
            r#"
            UPDATE answer_sheets
            SET status = $2, time_finish = $3, attempt_score = $4, updated_at = NOW()
            WHERE id = $1 AND status = $5
            RETURNING *
            "#,
        )
        .bind(sheet_id)
        .bind(AttemptStatus::Completed.as_str())
        .bind(now)
        .bind(outcome.attempt_score)
        .bind(AttemptStatus::InProgress.as_str())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(Error::AlreadyGraded(sheet_id))?;

        let slots = load_slots(&mut tx, sheet_id).await?;
        tx.commit().await?;
        Ok((completed, slots))
    }
}
