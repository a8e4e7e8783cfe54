#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use quiz_engine::config::{Config, LogFormat};
use quiz_engine::database::store::QuizStore;
use quiz_engine::error::{Error, Result};
use quiz_engine::models::answer_sheet::{
    AnswerSheet, AnswerSlot, AttemptStatus, NewAnswerSheet,
};
use quiz_engine::models::catalog::{CourseRecord, TopicRecord};
use quiz_engine::models::question::{
    Difficulty, NewOption, NewQuestion, Question, QuestionKind, QuestionOption,
};
use quiz_engine::models::quiz::{NewQuiz, NewQuizSetting, Quiz, QuizSetting};
use quiz_engine::models::user::CurrentUser;
use quiz_engine::services::catalog_service::Catalog;
use quiz_engine::services::grading_service::{
    ensure_accepting, grade_attempt, merge_selections, validate_selection, SlotSelections,
};
use quiz_engine::services::identity_service::IdentityProvider;
use quiz_engine::AppState;

pub const COURSE_ID: i64 = 5;
pub const STAFF_TOKEN: &str = "staff-token";
pub const STUDENT_TOKEN: &str = "student-token";
pub const OTHER_STUDENT_TOKEN: &str = "other-student-token";
pub const STUDENT_ID: i64 = 100;
pub const OTHER_STUDENT_ID: i64 = 101;

#[derive(Default)]
struct Tables {
    next_id: i64,
    questions: BTreeMap<i64, Question>,
    quizzes: BTreeMap<i64, Quiz>,
    settings: Vec<QuizSetting>,
    sheets: HashMap<Uuid, AnswerSheet>,
    slots: Vec<AnswerSlot>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn recompute_total(&mut self, quiz_id: i64) -> Result<()> {
        let Some(quiz) = self.quizzes.get(&quiz_id) else {
            return Err(Error::NotFound(format!("Quiz {} not found", quiz_id)));
        };
        let total = quiz
            .question_ids
            .iter()
            .filter_map(|id| self.questions.get(id))
            .try_fold(0i32, |total, q| total.checked_add(q.points))
            .ok_or_else(|| {
                Error::Validation("quiz total points exceed the supported range".to_string())
            })?;
        if let Some(quiz) = self.quizzes.get_mut(&quiz_id) {
            quiz.total_points = total;
            quiz.updated_at = Some(Utc::now());
        }
        Ok(())
    }

    fn quiz(&self, quiz_id: i64) -> Result<Quiz> {
        self.quizzes
            .get(&quiz_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Quiz {} not found", quiz_id)))
    }

    fn store_question(&mut self, question: NewQuestion) -> Question {
        let id = self.next_id();
        let options = question
            .options
            .iter()
            .map(|o| QuestionOption {
                id: self.next_id(),
                question_id: id,
                option_text: o.option_text.clone(),
                is_correct: o.is_correct,
            })
            .collect::<Vec<_>>();
        let stored = Question {
            id,
            topic_id: question.topic_id,
            question_text: question.question_text,
            points: question.points,
            difficulty: question.difficulty.as_str().to_string(),
            question_type: question.kind.as_str().to_string(),
            is_verified: question.is_verified,
            options,
            created_at: Some(Utc::now()),
        };
        self.questions.insert(id, stored.clone());
        stored
    }

    fn upsert_slot(
        &mut self,
        sheet_id: Uuid,
        question_id: i64,
        question_type: &str,
        selected: Vec<i64>,
        points_awarded: i32,
    ) -> AnswerSlot {
        let now = Utc::now();
        if let Some(slot) = self
            .slots
            .iter_mut()
            .find(|s| s.answer_sheet_id == sheet_id && s.question_id == question_id)
        {
            slot.selected_option_ids = selected;
            slot.points_awarded = points_awarded;
            slot.updated_at = Some(now);
            return slot.clone();
        }
        let slot = AnswerSlot {
            id: self.next_id(),
            answer_sheet_id: sheet_id,
            question_id,
            question_type: question_type.to_string(),
            points_awarded,
            selected_option_ids: selected,
            created_at: Some(now),
            updated_at: Some(now),
        };
        self.slots.push(slot.clone());
        slot
    }

    fn slots_of(&self, sheet_id: Uuid) -> Vec<AnswerSlot> {
        let mut slots: Vec<AnswerSlot> = self
            .slots
            .iter()
            .filter(|s| s.answer_sheet_id == sheet_id)
            .cloned()
            .collect();
        slots.sort_by_key(|s| s.question_id);
        slots
    }
}

/// Mirrors `PgQuizStore` semantics. Each call holds the table lock for its
/// whole duration, which stands in for the row locks Postgres takes.
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    pub fn sheet_count(&self) -> usize {
        self.tables.lock().unwrap().sheets.len()
    }

    /// Moves an attempt's start time into the past.
    pub fn backdate_sheet(&self, sheet_id: Uuid, by: Duration) {
        let mut tables = self.tables.lock().unwrap();
        if let Some(sheet) = tables.sheets.get_mut(&sheet_id) {
            sheet.time_start = sheet.time_start - by;
        }
    }

    /// Simulates an edit to the live question bank after attempts started.
    pub fn flip_correct_option(&self, question_id: i64, option_id: i64) {
        let mut tables = self.tables.lock().unwrap();
        if let Some(question) = tables.questions.get_mut(&question_id) {
            for option in &mut question.options {
                option.is_correct = option.id == option_id;
            }
        }
    }
}

#[async_trait]
impl QuizStore for InMemoryStore {
    async fn insert_question(&self, question: NewQuestion) -> Result<Question> {
        Ok(self.tables.lock().unwrap().store_question(question))
    }

    async fn fetch_question(&self, question_id: i64) -> Result<Question> {
        self.tables
            .lock()
            .unwrap()
            .questions
            .get(&question_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Question {} not found", question_id)))
    }

    async fn verified_questions_for_topics(&self, topic_ids: &[i64]) -> Result<Vec<Question>> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .questions
            .values()
            .filter(|q| q.is_verified && topic_ids.contains(&q.topic_id))
            .cloned()
            .collect())
    }

    async fn insert_quiz(
        &self,
        quiz: NewQuiz,
        topic_ids: &[i64],
        questions: &[Question],
    ) -> Result<Quiz> {
        let mut tables = self.tables.lock().unwrap();
        let id = tables.next_id();
        let now = Utc::now();
        let stored = Quiz {
            id,
            course_id: quiz.course_id,
            quiz_title: quiz.quiz_title,
            difficulty_level: quiz.difficulty_level.as_str().to_string(),
            random_flag: quiz.random_flag,
            total_points: quiz.total_points,
            topic_ids: topic_ids.to_vec(),
            question_ids: questions.iter().map(|q| q.id).collect(),
            created_at: Some(now),
            updated_at: Some(now),
        };
        tables.quizzes.insert(id, stored.clone());
        Ok(stored)
    }

    async fn fetch_quiz(&self, quiz_id: i64) -> Result<Quiz> {
        self.tables.lock().unwrap().quiz(quiz_id)
    }

    async fn list_quizzes(&self, course_id: i64, offset: i64, limit: i64) -> Result<Vec<Quiz>> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .quizzes
            .values()
            .filter(|q| q.course_id == course_id)
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(usize::try_from(limit).unwrap_or(0))
            .cloned()
            .collect())
    }

    async fn delete_quiz(&self, quiz_id: i64) -> Result<()> {
        let mut tables = self.tables.lock().unwrap();
        if tables.quizzes.remove(&quiz_id).is_none() {
            return Err(Error::NotFound(format!("Quiz {} not found", quiz_id)));
        }
        tables.settings.retain(|s| s.quiz_id != quiz_id);
        let sheets: BTreeSet<Uuid> = tables
            .sheets
            .values()
            .filter(|s| s.quiz_id == quiz_id)
            .map(|s| s.id)
            .collect();
        tables.sheets.retain(|id, _| !sheets.contains(id));
        tables.slots.retain(|s| !sheets.contains(&s.answer_sheet_id));
        Ok(())
    }

    async fn quiz_questions(&self, quiz_id: i64) -> Result<Vec<Question>> {
        let tables = self.tables.lock().unwrap();
        let quiz = tables
            .quizzes
            .get(&quiz_id)
            .ok_or_else(|| Error::NotFound(format!("Quiz {} not found", quiz_id)))?;
        Ok(quiz
            .question_ids
            .iter()
            .filter_map(|id| tables.questions.get(id))
            .cloned()
            .collect())
    }

    async fn update_quiz_topics(&self, quiz_id: i64, add: &[i64], remove: &[i64]) -> Result<Quiz> {
        let mut tables = self.tables.lock().unwrap();
        let added_questions: Vec<i64> = tables
            .questions
            .values()
            .filter(|q| q.is_verified && add.contains(&q.topic_id))
            .map(|q| q.id)
            .collect();
        let removed_questions: BTreeSet<i64> = tables
            .questions
            .values()
            .filter(|q| remove.contains(&q.topic_id))
            .map(|q| q.id)
            .collect();

        let quiz = tables
            .quizzes
            .get_mut(&quiz_id)
            .ok_or_else(|| Error::NotFound(format!("Quiz {} not found", quiz_id)))?;

        let mut topics: BTreeSet<i64> = quiz.topic_ids.iter().copied().collect();
        let mut questions: BTreeSet<i64> = quiz.question_ids.iter().copied().collect();
        topics.retain(|t| !remove.contains(t));
        questions.retain(|q| !removed_questions.contains(q));
        topics.extend(add.iter().copied());
        questions.extend(added_questions);
        let previous = quiz.clone();
        quiz.topic_ids = topics.into_iter().collect();
        quiz.question_ids = questions.into_iter().collect();

        if let Err(e) = tables.recompute_total(quiz_id) {
            tables.quizzes.insert(quiz_id, previous);
            return Err(e);
        }
        tables.quiz(quiz_id)
    }

    async fn insert_quiz_question(
        &self,
        quiz_id: i64,
        question: NewQuestion,
    ) -> Result<(Question, Quiz)> {
        let mut tables = self.tables.lock().unwrap();
        let previous = tables.quiz(quiz_id)?;
        let created = tables.store_question(question);
        if let Some(quiz) = tables.quizzes.get_mut(&quiz_id) {
            quiz.question_ids.push(created.id);
            quiz.question_ids.sort_unstable();
        }
        if let Err(e) = tables.recompute_total(quiz_id) {
            tables.quizzes.insert(quiz_id, previous);
            tables.questions.remove(&created.id);
            return Err(e);
        }
        Ok((created, tables.quiz(quiz_id)?))
    }

    async fn link_quiz_question(&self, quiz_id: i64, question_id: i64) -> Result<Quiz> {
        let mut tables = self.tables.lock().unwrap();
        let previous = tables.quiz(quiz_id)?;
        if !tables.questions.contains_key(&question_id) {
            return Err(Error::NotFound(format!("Question {} not found", question_id)));
        }
        if previous.question_ids.contains(&question_id) {
            return Err(Error::Conflict(format!(
                "question {} is already part of quiz {}",
                question_id, quiz_id
            )));
        }
        if let Some(quiz) = tables.quizzes.get_mut(&quiz_id) {
            quiz.question_ids.push(question_id);
            quiz.question_ids.sort_unstable();
        }
        if let Err(e) = tables.recompute_total(quiz_id) {
            tables.quizzes.insert(quiz_id, previous);
            return Err(e);
        }
        tables.quiz(quiz_id)
    }

    async fn unlink_quiz_question(&self, quiz_id: i64, question_id: i64) -> Result<Quiz> {
        let mut tables = self.tables.lock().unwrap();
        let quiz = tables
            .quizzes
            .get_mut(&quiz_id)
            .ok_or_else(|| Error::NotFound(format!("Quiz {} not found", quiz_id)))?;
        let before = quiz.question_ids.len();
        quiz.question_ids.retain(|id| *id != question_id);
        if quiz.question_ids.len() == before {
            return Err(Error::NotFound(format!(
                "question {} is not part of quiz {}",
                question_id, quiz_id
            )));
        }
        tables.recompute_total(quiz_id)?;
        tables.quiz(quiz_id)
    }

    async fn insert_quiz_setting(&self, setting: NewQuizSetting) -> Result<QuizSetting> {
        let mut tables = self.tables.lock().unwrap();
        if tables
            .settings
            .iter()
            .any(|s| s.quiz_id == setting.quiz_id && s.quiz_key == setting.quiz_key)
        {
            return Err(Error::DataIntegrity("duplicate quiz key".to_string()));
        }
        let stored = QuizSetting {
            id: tables.next_id(),
            quiz_id: setting.quiz_id,
            instructions: setting.instructions,
            time_limit_secs: setting.time_limit_secs,
            start_time: setting.start_time,
            end_time: setting.end_time,
            quiz_key: setting.quiz_key,
            created_at: Some(Utc::now()),
        };
        tables.settings.push(stored.clone());
        Ok(stored)
    }

    async fn quiz_settings(&self, quiz_id: i64) -> Result<Vec<QuizSetting>> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .settings
            .iter()
            .filter(|s| s.quiz_id == quiz_id)
            .cloned()
            .collect())
    }

    async fn fetch_quiz_setting(&self, setting_id: i64) -> Result<QuizSetting> {
        self.tables
            .lock()
            .unwrap()
            .settings
            .iter()
            .find(|s| s.id == setting_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Quiz setting {} not found", setting_id)))
    }

    async fn update_quiz_setting(&self, setting: QuizSetting) -> Result<QuizSetting> {
        let mut tables = self.tables.lock().unwrap();
        if tables
            .settings
            .iter()
            .any(|s| s.id != setting.id && s.quiz_id == setting.quiz_id && s.quiz_key == setting.quiz_key)
        {
            return Err(Error::DataIntegrity("duplicate quiz key".to_string()));
        }
        let stored = tables
            .settings
            .iter_mut()
            .find(|s| s.id == setting.id)
            .ok_or_else(|| Error::NotFound(format!("Quiz setting {} not found", setting.id)))?;
        *stored = setting;
        Ok(stored.clone())
    }

    async fn delete_quiz_setting(&self, setting_id: i64) -> Result<()> {
        let mut tables = self.tables.lock().unwrap();
        let before = tables.settings.len();
        tables.settings.retain(|s| s.id != setting_id);
        if tables.settings.len() == before {
            return Err(Error::NotFound(format!("Quiz setting {} not found", setting_id)));
        }
        Ok(())
    }

    /// Yields after reading so concurrent starts can interleave between the
    /// lookup and the insert.
    async fn find_answer_sheet(
        &self,
        student_id: i64,
        quiz_id: i64,
    ) -> Result<Option<AnswerSheet>> {
        let found = {
            let tables = self.tables.lock().unwrap();
            tables
                .sheets
                .values()
                .find(|s| s.student_id == student_id && s.quiz_id == quiz_id)
                .cloned()
        };
        tokio::task::yield_now().await;
        Ok(found)
    }

    async fn insert_answer_sheet(&self, sheet: NewAnswerSheet) -> Result<Option<AnswerSheet>> {
        let mut tables = self.tables.lock().unwrap();
        if tables
            .sheets
            .values()
            .any(|s| s.student_id == sheet.student_id && s.quiz_id == sheet.quiz_id)
        {
            return Ok(None);
        }
        let now = Utc::now();
        let stored = AnswerSheet {
            id: Uuid::new_v4(),
            student_id: sheet.student_id,
            quiz_id: sheet.quiz_id,
            time_limit_secs: sheet.time_limit_secs,
            time_start: sheet.time_start,
            time_finish: None,
            status: AttemptStatus::InProgress.as_str().to_string(),
            total_points: sheet.total_points,
            attempt_score: None,
            quiz_key: sheet.quiz_key,
            questions_snapshot: sqlx::types::Json(sheet.questions_snapshot),
            created_at: Some(now),
            updated_at: Some(now),
        };
        tables.sheets.insert(stored.id, stored.clone());
        Ok(Some(stored))
    }

    async fn fetch_answer_sheet(&self, sheet_id: Uuid) -> Result<AnswerSheet> {
        self.tables
            .lock()
            .unwrap()
            .sheets
            .get(&sheet_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Answer sheet {} not found", sheet_id)))
    }

    async fn answer_slots(&self, sheet_id: Uuid) -> Result<Vec<AnswerSlot>> {
        Ok(self.tables.lock().unwrap().slots_of(sheet_id))
    }

    async fn save_answer_slot(
        &self,
        sheet_id: Uuid,
        question_id: i64,
        selected: BTreeSet<i64>,
        now: DateTime<Utc>,
    ) -> Result<AnswerSlot> {
        let mut tables = self.tables.lock().unwrap();
        let sheet = tables
            .sheets
            .get(&sheet_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Answer sheet {} not found", sheet_id)))?;
        ensure_accepting(&sheet, now)?;

        let question = sheet.snapshot_question(question_id).ok_or_else(|| {
            Error::Validation(format!("question {} is not part of this attempt", question_id))
        })?;
        let kind = validate_selection(question, &selected)?;
        Ok(tables.upsert_slot(
            sheet_id,
            question_id,
            kind.as_str(),
            selected.into_iter().collect(),
            0,
        ))
    }

    async fn complete_answer_sheet(
        &self,
        sheet_id: Uuid,
        submitted: &SlotSelections,
        now: DateTime<Utc>,
    ) -> Result<(AnswerSheet, Vec<AnswerSlot>)> {
        let mut tables = self.tables.lock().unwrap();
        let sheet = tables
            .sheets
            .get(&sheet_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Answer sheet {} not found", sheet_id)))?;
        ensure_accepting(&sheet, now)?;

        let selections = merge_selections(&tables.slots_of(sheet_id), submitted);
        let outcome = grade_attempt(&sheet.questions_snapshot, &selections)?;

        for graded in &outcome.slots {
            tables.upsert_slot(
                sheet_id,
                graded.question_id,
                graded.kind.as_str(),
                graded.selected_option_ids.clone(),
                graded.points_awarded,
            );
        }

        let stored = tables
            .sheets
            .get_mut(&sheet_id)
            .ok_or_else(|| Error::NotFound(format!("Answer sheet {} not found", sheet_id)))?;
        stored.status = AttemptStatus::Completed.as_str().to_string();
        stored.time_finish = Some(now);
        stored.attempt_score = Some(outcome.attempt_score);
        stored.updated_at = Some(now);
        let completed = stored.clone();

        Ok((completed, tables.slots_of(sheet_id)))
    }
}

/// Course 5 owns topics 10, 11 and 12; topic 20 belongs to course 6.
pub struct StubCatalog {
    topics: HashMap<i64, i64>,
}

impl Default for StubCatalog {
    fn default() -> Self {
        Self {
            topics: HashMap::from([(10, COURSE_ID), (11, COURSE_ID), (12, COURSE_ID), (20, 6)]),
        }
    }
}

#[async_trait]
impl Catalog for StubCatalog {
    async fn get_course(&self, course_id: i64) -> Result<CourseRecord> {
        if course_id == COURSE_ID || course_id == 6 {
            Ok(CourseRecord {
                id: course_id,
                name: Some(format!("Course {}", course_id)),
            })
        } else {
            Err(Error::NotFound(format!("Course {} not found", course_id)))
        }
    }

    async fn get_topic(&self, topic_id: i64) -> Result<TopicRecord> {
        self.topics
            .get(&topic_id)
            .map(|course_id| TopicRecord {
                id: topic_id,
                course_id: *course_id,
                parent_id: None,
                title: format!("Topic {}", topic_id),
                description: None,
            })
            .ok_or_else(|| Error::NotFound(format!("Topic {} not found", topic_id)))
    }
}

pub struct StubIdentity;

#[async_trait]
impl IdentityProvider for StubIdentity {
    async fn get_current_user(&self, token: &str) -> Result<CurrentUser> {
        let (id, role) = match token {
            STAFF_TOKEN => (1, "instructor"),
            STUDENT_TOKEN => (STUDENT_ID, "student"),
            OTHER_STUDENT_TOKEN => (OTHER_STUDENT_ID, "student"),
            _ => return Err(Error::Unauthorized("invalid or expired token".to_string())),
        };
        Ok(CurrentUser {
            id,
            email: None,
            full_name: None,
            is_superuser: false,
            role: Some(role.to_string()),
        })
    }
}

pub fn test_config() -> Config {
    Config {
        server_address: "127.0.0.1:0".to_string(),
        database_url: "postgres://unused".to_string(),
        database_max_connections: 1,
        auth_server_url: "http://auth.invalid".to_string(),
        educational_program_url: "http://programs.invalid".to_string(),
        question_bank_url: "http://questions.invalid".to_string(),
        service_token: None,
        http_timeout_secs: 1,
        log_format: LogFormat::Text,
    }
}

pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub state: AppState,
}

pub fn harness() -> Harness {
    let store = Arc::new(InMemoryStore::default());
    let state = AppState::new(
        test_config(),
        store.clone(),
        Arc::new(StubCatalog::default()),
        Arc::new(StubIdentity),
    );
    Harness { store, state }
}

/// Inserts a verified question; `options` pairs text with correctness.
pub async fn seed_question(
    store: &InMemoryStore,
    topic_id: i64,
    kind: QuestionKind,
    points: i32,
    options: &[(&str, bool)],
) -> Question {
    store
        .insert_question(NewQuestion {
            topic_id,
            question_text: format!("Question on topic {}", topic_id),
            points,
            difficulty: Difficulty::Easy,
            kind,
            is_verified: true,
            options: options
                .iter()
                .map(|(text, correct)| NewOption {
                    option_text: text.to_string(),
                    is_correct: *correct,
                })
                .collect(),
        })
        .await
        .expect("seed question")
}

pub fn option_id(question: &Question, text: &str) -> i64 {
    question
        .options
        .iter()
        .find(|o| o.option_text == text)
        .map(|o| o.id)
        .expect("option exists")
}
