use std::collections::BTreeSet;
use std::sync::Arc;

use crate::database::store::QuizStore;
use crate::dto::question_dto::CreateQuestionPayload;
use crate::dto::quiz_dto::{ComposeQuizPayload, QuizListQuery, UpdateQuizTopicsPayload};
use crate::error::{Error, Result};
use crate::models::question::{NewQuestion, Question};
use crate::models::quiz::{NewQuiz, Quiz};
use crate::services::catalog_service::Catalog;
use crate::services::question_service::check_question;

#[derive(Clone)]
pub struct QuizService {
    store: Arc<dyn QuizStore>,
    catalog: Arc<dyn Catalog>,
}

pub fn total_points(questions: &[Question]) -> Result<i32> {
    questions
        .iter()
        .try_fold(0i32, |total, q| total.checked_add(q.points))
        .ok_or_else(|| Error::Validation("quiz total points exceed the supported range".to_string()))
}

fn dedup(ids: &[i64]) -> Vec<i64> {
    ids.iter().copied().collect::<BTreeSet<_>>().into_iter().collect()
}

impl QuizService {
    pub fn new(store: Arc<dyn QuizStore>, catalog: Arc<dyn Catalog>) -> Self {
        Self { store, catalog }
    }

    pub async fn compose_quiz(&self, payload: ComposeQuizPayload) -> Result<Quiz> {
        let topic_ids = dedup(&payload.topic_ids);
        if topic_ids.is_empty() {
            return Err(Error::Validation("a quiz needs at least one topic".to_string()));
        }

        self.catalog
            .get_course(payload.course_id)
            .await
            .map_err(|e| match e {
                Error::NotFound(_) => {
                    Error::Validation(format!("course {} does not exist", payload.course_id))
                }
                other => other,
            })?;
        self.ensure_topics_in_course(payload.course_id, &topic_ids)
            .await?;

        let questions = self.store.verified_questions_for_topics(&topic_ids).await?;
        if questions.is_empty() {
            return Err(Error::Validation(
                "the selected topics contain no verified questions".to_string(),
            ));
        }

        let new_quiz = NewQuiz {
            course_id: payload.course_id,
            quiz_title: payload.quiz_title,
            difficulty_level: payload.difficulty_level.unwrap_or_default(),
            random_flag: payload.random_flag,
            total_points: total_points(&questions)?,
        };
        let quiz = self.store.insert_quiz(new_quiz, &topic_ids, &questions).await?;

        tracing::info!(
            quiz_id = quiz.id,
            course_id = quiz.course_id,
            questions = quiz.question_ids.len(),
            total_points = quiz.total_points,
            "quiz composed"
        );
        Ok(quiz)
    }

    pub async fn update_quiz_topics(
        &self,
        quiz_id: i64,
        payload: UpdateQuizTopicsPayload,
    ) -> Result<Quiz> {
        let add = dedup(&payload.add_topic_ids);
        let remove = dedup(&payload.remove_topic_ids);
        if add.is_empty() && remove.is_empty() {
            return Err(Error::Validation("no topics to add or remove".to_string()));
        }
        if let Some(both) = add.iter().find(|id| remove.contains(id)) {
            return Err(Error::Validation(format!(
                "topic {} is both added and removed",
                both
            )));
        }

        let quiz = self.store.fetch_quiz(quiz_id).await?;
        self.ensure_topics_in_course(quiz.course_id, &add).await?;

        let updated = self.store.update_quiz_topics(quiz_id, &add, &remove).await?;
        tracing::info!(
            quiz_id,
            added = ?add,
            removed = ?remove,
            total_points = updated.total_points,
            "quiz topics updated"
        );
        Ok(updated)
    }

    pub async fn get_quiz(&self, quiz_id: i64) -> Result<Quiz> {
        self.store.fetch_quiz(quiz_id).await
    }

    pub async fn list_quizzes(&self, course_id: i64, query: &QuizListQuery) -> Result<Vec<Quiz>> {
        let (offset, limit) = query.window();
        self.store.list_quizzes(course_id, offset, limit).await
    }

    pub async fn delete_quiz(&self, quiz_id: i64) -> Result<()> {
        self.store.delete_quiz(quiz_id).await?;
        tracing::info!(quiz_id, "quiz deleted");
        Ok(())
    }

    /// Writes a new question to the bank and links it to the quiz directly,
    /// without attaching its topic.
    pub async fn add_quiz_question(
        &self,
        quiz_id: i64,
        payload: CreateQuestionPayload,
    ) -> Result<(Question, Quiz)> {
        let question = NewQuestion::from(payload);
        check_question(&question)?;
        if !question.is_verified {
            return Err(Error::Validation(
                "only verified questions can be added to a quiz".to_string(),
            ));
        }

        let quiz = self.store.fetch_quiz(quiz_id).await?;
        self.ensure_topics_in_course(quiz.course_id, &[question.topic_id])
            .await?;

        let (created, updated) = self.store.insert_quiz_question(quiz_id, question).await?;
        tracing::info!(
            quiz_id,
            question_id = created.id,
            total_points = updated.total_points,
            "question added to quiz"
        );
        Ok((created, updated))
    }

    pub async fn link_quiz_question(&self, quiz_id: i64, question_id: i64) -> Result<Quiz> {
        let quiz = self.store.fetch_quiz(quiz_id).await?;
        let question = self.store.fetch_question(question_id).await?;
        if !question.is_verified {
            return Err(Error::Validation(format!(
                "question {} is not verified",
                question_id
            )));
        }
        self.ensure_topics_in_course(quiz.course_id, &[question.topic_id])
            .await?;

        let updated = self.store.link_quiz_question(quiz_id, question_id).await?;
        tracing::info!(
            quiz_id,
            question_id,
            total_points = updated.total_points,
            "question linked to quiz"
        );
        Ok(updated)
    }

    pub async fn unlink_quiz_question(&self, quiz_id: i64, question_id: i64) -> Result<Quiz> {
        let updated = self.store.unlink_quiz_question(quiz_id, question_id).await?;
        tracing::info!(
            quiz_id,
            question_id,
            total_points = updated.total_points,
            "question removed from quiz"
        );
        Ok(updated)
    }

    /// Only the topic itself is checked; subtopics are never pulled in.
    async fn ensure_topics_in_course(&self, course_id: i64, topic_ids: &[i64]) -> Result<()> {
        for topic_id in topic_ids {
            let topic = self.catalog.get_topic(*topic_id).await.map_err(|e| match e {
                Error::NotFound(_) => Error::Validation(format!("topic {} does not exist", topic_id)),
                other => other,
            })?;
            if topic.course_id != course_id {
                return Err(Error::Validation(format!(
                    "topic {} does not belong to course {}",
                    topic_id, course_id
                )));
            }
        }
        Ok(())
    }
}
