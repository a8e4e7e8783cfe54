use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use validator::Validate;

use crate::{
    dto::question_dto::{CreateQuestionPayload, QuestionResponse},
    error::Result,
    AppState,
};

#[utoipa::path(
    post,
    path = "/api/v1/questions",
    request_body = CreateQuestionPayload,
    responses(
        (status = 201, description = "Question created", body = QuestionResponse),
        (status = 400, description = "Invalid payload"),
        (status = 422, description = "Option set violates the question type or topic is unknown"),
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn create_question(
    State(state): State<AppState>,
    Json(payload): Json<CreateQuestionPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let question = state.question_service.create_question(payload).await?;
    Ok((StatusCode::CREATED, Json(QuestionResponse::from(question))))
}

#[utoipa::path(
    get,
    path = "/api/v1/questions/{id}",
    params(("id" = i64, Path, description = "Question ID")),
    responses(
        (status = 200, description = "Question with options", body = QuestionResponse),
        (status = 404, description = "Question not found"),
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn get_question(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let question = state.question_service.get_question(id).await?;
    Ok(Json(QuestionResponse::from(question)))
}
