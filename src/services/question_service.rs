use std::sync::Arc;

use crate::database::store::QuizStore;
use crate::dto::question_dto::CreateQuestionPayload;
use crate::error::{Error, Result};
use crate::models::question::{NewQuestion, Question, MAX_QUESTION_POINTS};
use crate::services::catalog_service::Catalog;

#[derive(Clone)]
pub struct QuestionService {
    store: Arc<dyn QuizStore>,
    catalog: Arc<dyn Catalog>,
}

/// Authoring rules shared by the question bank and direct quiz additions.
pub fn check_question(question: &NewQuestion) -> Result<()> {
    if !(0..=MAX_QUESTION_POINTS).contains(&question.points) {
        return Err(Error::Validation(format!(
            "points must be between 0 and {}",
            MAX_QUESTION_POINTS
        )));
    }
    question.kind.validate_options(&question.options)
}

impl QuestionService {
    pub fn new(store: Arc<dyn QuizStore>, catalog: Arc<dyn Catalog>) -> Self {
        Self { store, catalog }
    }

    pub async fn create_question(&self, payload: CreateQuestionPayload) -> Result<Question> {
        let question = NewQuestion::from(payload);
        check_question(&question)?;

        self.catalog
            .get_topic(question.topic_id)
            .await
            .map_err(|e| match e {
                Error::NotFound(_) => {
                    Error::Validation(format!("topic {} does not exist", question.topic_id))
                }
                other => other,
            })?;

        let created = self.store.insert_question(question).await?;
        tracing::info!(
            question_id = created.id,
            topic_id = created.topic_id,
            question_type = %created.question_type,
            "question created"
        );
        Ok(created)
    }

    pub async fn get_question(&self, question_id: i64) -> Result<Question> {
        self.store.fetch_question(question_id).await
    }
}
