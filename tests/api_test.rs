mod common;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value as JsonValue};
use tower::ServiceExt;

use common::*;
use quiz_engine::models::question::QuestionKind;
use quiz_engine::routes::build_router;

async fn call(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<JsonValue>,
) -> (StatusCode, JsonValue) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    let body = body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty);
    let resp = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();

    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
    let value = if bytes.is_empty() {
        JsonValue::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn option_ids(question: &JsonValue) -> Vec<(String, i64)> {
    question["options"]
        .as_array()
        .unwrap()
        .iter()
        .map(|o| {
            (
                o["option_text"].as_str().unwrap().to_string(),
                o["id"].as_i64().unwrap(),
            )
        })
        .collect()
}

#[tokio::test]
async fn health_needs_no_token() {
    let h = harness();
    let app = build_router(h.state);
    let (status, body) = call(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn staff_routes_reject_missing_token_and_students() {
    let h = harness();
    let app = build_router(h.state);

    let (status, body) = call(&app, "GET", "/api/v1/quizzes/1", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let (status, _) = call(&app, "GET", "/api/v1/quizzes/1", Some("bogus"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = call(&app, "GET", "/api/v1/quizzes/1", Some(STUDENT_TOKEN), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    let (status, body) = call(&app, "GET", "/api/v1/quizzes/1", Some(STAFF_TOKEN), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn invalid_payload_is_a_bad_request() {
    let h = harness();
    let app = build_router(h.state);

    let (status, body) = call(
        &app,
        "POST",
        "/api/v1/quizzes",
        Some(STAFF_TOKEN),
        Some(json!({"course_id": COURSE_ID, "quiz_title": "", "topic_ids": []})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn attempt_lifecycle_over_http() {
    let h = harness();
    let app = build_router(h.state);

    let (status, question) = call(
        &app,
        "POST",
        "/api/v1/questions",
        Some(STAFF_TOKEN),
        Some(json!({
            "topic_id": 10,
            "question_text": "2 + 2?",
            "points": 3,
            "difficulty": "easy",
            "question_type": "single_select_mcq",
            "is_verified": true,
            "options": [
                {"option_text": "4", "is_correct": true},
                {"option_text": "5", "is_correct": false}
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(question["options"][0]["is_correct"], true);
    let question_id = question["id"].as_i64().unwrap();
    let options = option_ids(&question);
    let right = options.iter().find(|(t, _)| t == "4").unwrap().1;

    let (status, quiz) = call(
        &app,
        "POST",
        "/api/v1/quizzes",
        Some(STAFF_TOKEN),
        Some(json!({
            "course_id": COURSE_ID,
            "quiz_title": "Arithmetic",
            "difficulty_level": "easy",
            "random_flag": true,
            "topic_ids": [10]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(quiz["total_points"], 3);
    let quiz_id = quiz["id"].as_i64().unwrap();

    let (status, setting) = call(
        &app,
        "POST",
        &format!("/api/v1/quizzes/{}/settings", quiz_id),
        Some(STAFF_TOKEN),
        Some(json!({"instructions": "No calculators", "time_limit_secs": 900})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let key = setting["quiz_key"].as_str().unwrap().to_string();

    let (status, body) = call(
        &app,
        "POST",
        "/api/v1/attempts",
        Some(STUDENT_TOKEN),
        Some(json!({"quiz_id": quiz_id, "quiz_key": "definitely-wrong"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "invalid_key");

    let (status, runtime) = call(
        &app,
        "POST",
        "/api/v1/attempts",
        Some(STUDENT_TOKEN),
        Some(json!({"quiz_id": quiz_id, "quiz_key": key})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(runtime["student_id"], STUDENT_ID);
    assert_eq!(runtime["instructions"], "No calculators");
    assert!(!runtime.to_string().contains("is_correct"));
    let sheet_id = runtime["answer_sheet_id"].as_str().unwrap().to_string();

    let (status, _) = call(
        &app,
        "GET",
        &format!("/api/v1/attempts/{}", sheet_id),
        Some(OTHER_STUDENT_TOKEN),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(
        &app,
        "POST",
        &format!("/api/v1/attempts/{}/submit", sheet_id),
        Some(OTHER_STUDENT_TOKEN),
        Some(json!({"slots": {}})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, slot) = call(
        &app,
        "PUT",
        &format!("/api/v1/attempts/{}/slots", sheet_id),
        Some(STUDENT_TOKEN),
        Some(json!({"question_id": question_id, "selected_option_ids": [right]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(slot["points_awarded"], 0);

    let (status, graded) = call(
        &app,
        "POST",
        &format!("/api/v1/attempts/{}/submit", sheet_id),
        Some(STUDENT_TOKEN),
        Some(json!({"slots": {}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(graded["status"], "completed");
    assert_eq!(graded["attempt_score"], 3);
    assert_eq!(graded["slots"][0]["points_awarded"], 3);

    let (status, body) = call(
        &app,
        "POST",
        &format!("/api/v1/attempts/{}/submit", sheet_id),
        Some(STUDENT_TOKEN),
        Some(json!({"slots": {}})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "already_graded");

    let (status, sheet) = call(
        &app,
        "GET",
        &format!("/api/v1/attempts/{}", sheet_id),
        Some(STAFF_TOKEN),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(sheet["attempt_score"], 3);
}

#[tokio::test]
async fn openapi_document_is_served() {
    let h = harness();
    let app = build_router(h.state);
    let (status, doc) = call(&app, "GET", "/api-docs/openapi.json", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(doc["paths"]["/api/v1/attempts/{id}/submit"].is_object());
}

#[tokio::test]
async fn quiz_management_over_http() {
    let h = harness();
    let first = seed_question(&h.store, 10, QuestionKind::SingleSelect, 2, &[("a", true), ("b", false)]).await;
    let second = seed_question(&h.store, 11, QuestionKind::SingleSelect, 4, &[("a", true), ("b", false)]).await;
    let app = build_router(h.state);

    let (status, quiz) = call(
        &app,
        "POST",
        "/api/v1/quizzes",
        Some(STAFF_TOKEN),
        Some(json!({"course_id": COURSE_ID, "quiz_title": "Managed", "topic_ids": [10]})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let quiz_id = quiz["id"].as_i64().unwrap();
    assert_eq!(quiz["question_ids"], json!([first.id]));

    let link = format!("/api/v1/quizzes/{}/questions/{}", quiz_id, second.id);
    let (status, quiz) = call(&app, "PUT", &link, Some(STAFF_TOKEN), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(quiz["total_points"], 6);
    let (status, _) = call(&app, "PUT", &link, Some(STAFF_TOKEN), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, quiz) = call(&app, "DELETE", &link, Some(STAFF_TOKEN), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(quiz["total_points"], 2);

    let (status, body) = call(
        &app,
        "POST",
        &format!("/api/v1/quizzes/{}/questions", quiz_id),
        Some(STAFF_TOKEN),
        Some(json!({
            "topic_id": 12,
            "question_text": "Direct",
            "points": 10001,
            "question_type": "single_select_mcq",
            "is_verified": true,
            "options": [
                {"option_text": "x", "is_correct": true},
                {"option_text": "y", "is_correct": false}
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (status, added) = call(
        &app,
        "POST",
        &format!("/api/v1/quizzes/{}/questions", quiz_id),
        Some(STAFF_TOKEN),
        Some(json!({
            "topic_id": 12,
            "question_text": "Direct",
            "points": 5,
            "question_type": "single_select_mcq",
            "is_verified": true,
            "options": [
                {"option_text": "x", "is_correct": true},
                {"option_text": "y", "is_correct": false}
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(added["quiz"]["total_points"], 7);
    assert_eq!(added["question"]["points"], 5);

    let (status, listed) = call(
        &app,
        "GET",
        &format!("/api/v1/courses/{}/quizzes?page=1&per_page=5", COURSE_ID),
        Some(STAFF_TOKEN),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let (status, setting) = call(
        &app,
        "POST",
        &format!("/api/v1/quizzes/{}/settings", quiz_id),
        Some(STAFF_TOKEN),
        Some(json!({"time_limit_secs": 604801})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(setting["error"], "validation_error");

    let (status, setting) = call(
        &app,
        "POST",
        &format!("/api/v1/quizzes/{}/settings", quiz_id),
        Some(STAFF_TOKEN),
        Some(json!({"time_limit_secs": 600, "quiz_key": "LETMEIN"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let setting_uri = format!("/api/v1/quiz-settings/{}", setting["id"].as_i64().unwrap());

    let (status, checked) = call(
        &app,
        "POST",
        "/api/v1/quiz-keys/validate",
        Some(STUDENT_TOKEN),
        Some(json!({"quiz_id": quiz_id, "quiz_key": "LETMEIN"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(checked["time_limit_secs"], 600);
    assert!(checked.get("quiz_key").is_none());

    let (status, updated) = call(
        &app,
        "PATCH",
        &setting_uri,
        Some(STAFF_TOKEN),
        Some(json!({"instructions": "Closed book", "time_limit_secs": 300})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["instructions"], "Closed book");
    assert_eq!(updated["time_limit_secs"], 300);

    let (status, _) = call(&app, "DELETE", &setting_uri, Some(STAFF_TOKEN), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = call(&app, "GET", &setting_uri, Some(STAFF_TOKEN), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = call(
        &app,
        "POST",
        "/api/v1/quiz-keys/validate",
        Some(STUDENT_TOKEN),
        Some(json!({"quiz_id": quiz_id, "quiz_key": "LETMEIN"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "invalid_key");

    let quiz_uri = format!("/api/v1/quizzes/{}", quiz_id);
    let (status, _) = call(&app, "DELETE", &quiz_uri, Some(STUDENT_TOKEN), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = call(&app, "DELETE", &quiz_uri, Some(STAFF_TOKEN), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = call(&app, "GET", &quiz_uri, Some(STAFF_TOKEN), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
