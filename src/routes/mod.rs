pub mod attempts;
pub mod health;
pub mod questions;
pub mod quizzes;

use axum::{
    middleware::from_fn_with_state,
    routing::{get, patch, post, put},
    Json, Router,
};
use tower_http::trace::TraceLayer;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::dto::{attempt_dto, question_dto, quiz_dto};
use crate::middleware::{auth, cors::api_cors};
use crate::models::question::{Difficulty, QuestionKind};
use crate::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        questions::create_question,
        questions::get_question,
        quizzes::compose_quiz,
        quizzes::get_quiz,
        quizzes::update_quiz_topics,
        quizzes::create_quiz_setting,
        quizzes::list_quiz_settings,
        quizzes::list_quizzes,
        quizzes::delete_quiz,
        quizzes::add_quiz_question,
        quizzes::link_quiz_question,
        quizzes::unlink_quiz_question,
        quizzes::get_quiz_setting,
        quizzes::update_quiz_setting,
        quizzes::delete_quiz_setting,
        quizzes::validate_quiz_key,
        attempts::start_attempt,
        attempts::get_answer_sheet,
        attempts::save_answer_slot,
        attempts::submit_answers,
    ),
    components(schemas(
        Difficulty,
        QuestionKind,
        question_dto::CreateQuestionPayload,
        question_dto::OptionPayload,
        question_dto::QuestionResponse,
        question_dto::OptionResponse,
        quiz_dto::ComposeQuizPayload,
        quiz_dto::UpdateQuizTopicsPayload,
        quiz_dto::QuizResponse,
        quiz_dto::CreateQuizSettingPayload,
        quiz_dto::QuizSettingResponse,
        quiz_dto::UpdateQuizSettingPayload,
        quiz_dto::QuizKeyPayload,
        quiz_dto::QuizKeyStatusResponse,
        quiz_dto::QuizQuestionResponse,
        attempt_dto::StartAttemptPayload,
        attempt_dto::RuntimeQuizPayload,
        attempt_dto::RuntimeQuestion,
        attempt_dto::RuntimeOption,
        attempt_dto::SaveAnswerSlotPayload,
        attempt_dto::SubmitAnswersPayload,
        attempt_dto::AnswerSlotResponse,
        attempt_dto::AnswerSheetResponse,
    )),
    modifiers(&BearerAuth)
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

pub fn build_router(state: AppState) -> Router {
    let staff_api = Router::new()
        .route("/api/v1/questions", post(questions::create_question))
        .route("/api/v1/questions/:id", get(questions::get_question))
        .route("/api/v1/quizzes", post(quizzes::compose_quiz))
        .route(
            "/api/v1/courses/:course_id/quizzes",
            get(quizzes::list_quizzes),
        )
        .route(
            "/api/v1/quizzes/:id",
            get(quizzes::get_quiz).delete(quizzes::delete_quiz),
        )
        .route(
            "/api/v1/quizzes/:id/topics",
            patch(quizzes::update_quiz_topics),
        )
        .route(
            "/api/v1/quizzes/:id/settings",
            get(quizzes::list_quiz_settings).post(quizzes::create_quiz_setting),
        )
        .route(
            "/api/v1/quizzes/:id/questions",
            post(quizzes::add_quiz_question),
        )
        .route(
            "/api/v1/quizzes/:id/questions/:question_id",
            put(quizzes::link_quiz_question).delete(quizzes::unlink_quiz_question),
        )
        .route(
            "/api/v1/quiz-settings/:id",
            get(quizzes::get_quiz_setting)
                .patch(quizzes::update_quiz_setting)
                .delete(quizzes::delete_quiz_setting),
        )
        .route_layer(from_fn_with_state(state.clone(), auth::require_staff));

    let attempt_api = Router::new()
        .route("/api/v1/attempts", post(attempts::start_attempt))
        .route(
            "/api/v1/quiz-keys/validate",
            post(quizzes::validate_quiz_key),
        )
        .route("/api/v1/attempts/:id", get(attempts::get_answer_sheet))
        .route("/api/v1/attempts/:id/slots", put(attempts::save_answer_slot))
        .route("/api/v1/attempts/:id/submit", post(attempts::submit_answers))
        .route_layer(from_fn_with_state(state.clone(), auth::require_user));

    Router::new()
        .route("/health", get(health::health))
        .route("/api-docs/openapi.json", get(openapi_json))
        .merge(staff_api)
        .merge(attempt_api)
        .with_state(state)
        .layer(api_cors())
        .layer(TraceLayer::new_for_http())
}
