use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use validator::Validate;

use crate::{
    dto::{
        question_dto::{CreateQuestionPayload, QuestionResponse},
        quiz_dto::{
            ComposeQuizPayload, CreateQuizSettingPayload, QuizKeyPayload, QuizKeyStatusResponse,
            QuizListQuery, QuizQuestionResponse, QuizResponse, QuizSettingResponse,
            UpdateQuizSettingPayload, UpdateQuizTopicsPayload,
        },
    },
    error::Result,
    AppState,
};

#[utoipa::path(
    post,
    path = "/api/v1/quizzes",
    request_body = ComposeQuizPayload,
    responses(
        (status = 201, description = "Quiz composed", body = QuizResponse),
        (status = 400, description = "Invalid payload"),
        (status = 422, description = "Unknown course or topic, or no questions selected"),
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn compose_quiz(
    State(state): State<AppState>,
    Json(payload): Json<ComposeQuizPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let quiz = state.quiz_service.compose_quiz(payload).await?;
    Ok((StatusCode::CREATED, Json(QuizResponse::from(quiz))))
}

#[utoipa::path(
    get,
    path = "/api/v1/quizzes/{id}",
    params(("id" = i64, Path, description = "Quiz ID")),
    responses(
        (status = 200, description = "Quiz with topic and question ids", body = QuizResponse),
        (status = 404, description = "Quiz not found"),
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn get_quiz(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let quiz = state.quiz_service.get_quiz(id).await?;
    Ok(Json(QuizResponse::from(quiz)))
}

#[utoipa::path(
    patch,
    path = "/api/v1/quizzes/{id}/topics",
    params(("id" = i64, Path, description = "Quiz ID")),
    request_body = UpdateQuizTopicsPayload,
    responses(
        (status = 200, description = "Topics updated and total recomputed", body = QuizResponse),
        (status = 404, description = "Quiz not found"),
        (status = 422, description = "Invalid topic delta"),
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn update_quiz_topics(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateQuizTopicsPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let quiz = state.quiz_service.update_quiz_topics(id, payload).await?;
    Ok(Json(QuizResponse::from(quiz)))
}

#[utoipa::path(
    post,
    path = "/api/v1/quizzes/{id}/settings",
    params(("id" = i64, Path, description = "Quiz ID")),
    request_body = CreateQuizSettingPayload,
    responses(
        (status = 201, description = "Setting created", body = QuizSettingResponse),
        (status = 404, description = "Quiz not found"),
        (status = 409, description = "Key already used for this quiz"),
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn create_quiz_setting(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<CreateQuizSettingPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let setting = state
        .quiz_setting_service
        .create_quiz_setting(id, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(QuizSettingResponse::from(setting))))
}

#[utoipa::path(
    get,
    path = "/api/v1/quizzes/{id}/settings",
    params(("id" = i64, Path, description = "Quiz ID")),
    responses(
        (status = 200, description = "Settings of the quiz", body = [QuizSettingResponse]),
        (status = 404, description = "Quiz not found"),
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn list_quiz_settings(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let settings = state.quiz_setting_service.list_quiz_settings(id).await?;
    let body: Vec<QuizSettingResponse> = settings.into_iter().map(Into::into).collect();
    Ok(Json(body))
}

#[utoipa::path(
    get,
    path = "/api/v1/courses/{course_id}/quizzes",
    params(
        ("course_id" = i64, Path, description = "Course ID"),
        ("page" = Option<i64>, Query, description = "Page number, starting at 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, at most 100"),
    ),
    responses(
        (status = 200, description = "Quizzes of the course", body = [QuizResponse]),
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn list_quizzes(
    State(state): State<AppState>,
    Path(course_id): Path<i64>,
    Query(query): Query<QuizListQuery>,
) -> Result<impl IntoResponse> {
    let quizzes = state.quiz_service.list_quizzes(course_id, &query).await?;
    let body: Vec<QuizResponse> = quizzes.into_iter().map(Into::into).collect();
    Ok(Json(body))
}

#[utoipa::path(
    delete,
    path = "/api/v1/quizzes/{id}",
    params(("id" = i64, Path, description = "Quiz ID")),
    responses(
        (status = 204, description = "Quiz, its settings and its answer sheets deleted"),
        (status = 404, description = "Quiz not found"),
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn delete_quiz(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    state.quiz_service.delete_quiz(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/v1/quizzes/{id}/questions",
    params(("id" = i64, Path, description = "Quiz ID")),
    request_body = CreateQuestionPayload,
    responses(
        (status = 201, description = "Question created and linked", body = QuizQuestionResponse),
        (status = 404, description = "Quiz not found"),
        (status = 422, description = "Invalid question or topic outside the quiz course"),
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn add_quiz_question(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<CreateQuestionPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let (question, quiz) = state.quiz_service.add_quiz_question(id, payload).await?;
    let body = QuizQuestionResponse {
        question: QuestionResponse::from(question),
        quiz: QuizResponse::from(quiz),
    };
    Ok((StatusCode::CREATED, Json(body)))
}

#[utoipa::path(
    put,
    path = "/api/v1/quizzes/{id}/questions/{question_id}",
    params(
        ("id" = i64, Path, description = "Quiz ID"),
        ("question_id" = i64, Path, description = "Question ID"),
    ),
    responses(
        (status = 200, description = "Question linked and total recomputed", body = QuizResponse),
        (status = 404, description = "Quiz or question not found"),
        (status = 409, description = "Question already in the quiz"),
        (status = 422, description = "Unverified question or topic outside the quiz course"),
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn link_quiz_question(
    State(state): State<AppState>,
    Path((id, question_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse> {
    let quiz = state.quiz_service.link_quiz_question(id, question_id).await?;
    Ok(Json(QuizResponse::from(quiz)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/quizzes/{id}/questions/{question_id}",
    params(
        ("id" = i64, Path, description = "Quiz ID"),
        ("question_id" = i64, Path, description = "Question ID"),
    ),
    responses(
        (status = 200, description = "Question unlinked and total recomputed", body = QuizResponse),
        (status = 404, description = "Question is not in the quiz"),
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn unlink_quiz_question(
    State(state): State<AppState>,
    Path((id, question_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse> {
    let quiz = state
        .quiz_service
        .unlink_quiz_question(id, question_id)
        .await?;
    Ok(Json(QuizResponse::from(quiz)))
}

#[utoipa::path(
    get,
    path = "/api/v1/quiz-settings/{id}",
    params(("id" = i64, Path, description = "Quiz setting ID")),
    responses(
        (status = 200, description = "Quiz setting", body = QuizSettingResponse),
        (status = 404, description = "Quiz setting not found"),
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn get_quiz_setting(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let setting = state.quiz_setting_service.get_quiz_setting(id).await?;
    Ok(Json(QuizSettingResponse::from(setting)))
}

#[utoipa::path(
    patch,
    path = "/api/v1/quiz-settings/{id}",
    params(("id" = i64, Path, description = "Quiz setting ID")),
    request_body = UpdateQuizSettingPayload,
    responses(
        (status = 200, description = "Quiz setting updated", body = QuizSettingResponse),
        (status = 404, description = "Quiz setting not found"),
        (status = 409, description = "Key already used for this quiz"),
        (status = 422, description = "Invalid time limit or window"),
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn update_quiz_setting(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateQuizSettingPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let setting = state
        .quiz_setting_service
        .update_quiz_setting(id, payload)
        .await?;
    Ok(Json(QuizSettingResponse::from(setting)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/quiz-settings/{id}",
    params(("id" = i64, Path, description = "Quiz setting ID")),
    responses(
        (status = 204, description = "Quiz setting deleted"),
        (status = 404, description = "Quiz setting not found"),
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn delete_quiz_setting(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    state.quiz_setting_service.delete_quiz_setting(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/v1/quiz-keys/validate",
    request_body = QuizKeyPayload,
    responses(
        (status = 200, description = "Key unlocks an open setting", body = QuizKeyStatusResponse),
        (status = 403, description = "Key mismatch or quiz not active"),
        (status = 404, description = "Quiz not found"),
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn validate_quiz_key(
    State(state): State<AppState>,
    Json(payload): Json<QuizKeyPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let setting = state
        .quiz_setting_service
        .check_quiz_key(payload.quiz_id, &payload.quiz_key)
        .await?;
    Ok(Json(QuizKeyStatusResponse::from(setting)))
}
