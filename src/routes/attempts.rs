use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::attempt_dto::{
        AnswerSheetResponse, AnswerSlotResponse, SaveAnswerSlotPayload, StartAttemptPayload,
        SubmitAnswersPayload,
    },
    error::Result,
    models::user::CurrentUser,
    AppState,
};

#[utoipa::path(
    post,
    path = "/api/v1/attempts",
    request_body = StartAttemptPayload,
    responses(
        (status = 201, description = "Attempt started or resumed", body = crate::dto::attempt_dto::RuntimeQuizPayload),
        (status = 403, description = "Key mismatch or quiz not active"),
        (status = 409, description = "Quiz already completed by this student"),
        (status = 410, description = "Existing attempt has expired"),
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn start_attempt(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<StartAttemptPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let runtime = state
        .runtime_service
        .generate_runtime_quiz(payload.quiz_id, &payload.quiz_key, user.id)
        .await?;
    Ok((StatusCode::CREATED, Json(runtime)))
}

#[utoipa::path(
    get,
    path = "/api/v1/attempts/{id}",
    params(("id" = Uuid, Path, description = "Answer sheet ID")),
    responses(
        (status = 200, description = "Answer sheet with slots", body = AnswerSheetResponse),
        (status = 404, description = "Answer sheet not found"),
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn get_answer_sheet(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let sheet = state.attempt_service.get_answer_sheet(id, &user).await?;
    Ok(Json(AnswerSheetResponse::try_from(sheet)?))
}

#[utoipa::path(
    put,
    path = "/api/v1/attempts/{id}/slots",
    params(("id" = Uuid, Path, description = "Answer sheet ID")),
    request_body = SaveAnswerSlotPayload,
    responses(
        (status = 200, description = "Slot saved", body = AnswerSlotResponse),
        (status = 409, description = "Attempt already graded"),
        (status = 410, description = "Attempt deadline has passed"),
        (status = 422, description = "Selection does not fit the question"),
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn save_answer_slot(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SaveAnswerSlotPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    state.attempt_service.ensure_owner(id, &user).await?;
    let slot = state
        .attempt_service
        .save_answer_slot(id, payload.question_id, payload.selected_option_ids)
        .await?;
    Ok(Json(AnswerSlotResponse::from(slot)))
}

#[utoipa::path(
    post,
    path = "/api/v1/attempts/{id}/submit",
    params(("id" = Uuid, Path, description = "Answer sheet ID")),
    request_body = SubmitAnswersPayload,
    responses(
        (status = 200, description = "Attempt graded", body = AnswerSheetResponse),
        (status = 409, description = "Attempt already graded"),
        (status = 410, description = "Attempt deadline has passed"),
        (status = 422, description = "Submission does not fit the attempt"),
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn submit_answers(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SubmitAnswersPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    state.attempt_service.ensure_owner(id, &user).await?;
    let graded = state
        .attempt_service
        .submit_answers(id, payload.into_selections())
        .await?;
    Ok(Json(AnswerSheetResponse::try_from(graded)?))
}
