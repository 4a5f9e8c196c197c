use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;

use crate::app::{App, DisciplineInput, InputError};
use crate::models::{Discipline, ReviewStatus, UserSettings};
use crate::scoring;

#[derive(Clone)]
pub struct ApiState {
    pub app: Arc<Mutex<App>>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/disciplines", get(list_disciplines).post(create_discipline))
        .route(
            "/api/disciplines/:id",
            axum::routing::put(update_discipline).delete(delete_discipline),
        )
        .route("/api/disciplines/:id/review", post(mark_reviewed))
        .route("/api/disciplines/:id/reset", post(reset_discipline))
        .route("/api/disciplines/:id/topics", post(add_topic))
        .route(
            "/api/disciplines/:id/topics/:topic_id",
            axum::routing::put(rename_topic).delete(delete_topic),
        )
        .route(
            "/api/disciplines/:id/topics/:topic_id/toggle",
            post(toggle_topic),
        )
        .route(
            "/api/disciplines/:id/topics/:topic_id/reset",
            post(reset_topic),
        )
        .route(
            "/api/disciplines/:id/topics/:topic_id/questions",
            post(record_questions),
        )
        .route("/api/history", get(history))
        .route("/api/stats", get(stats))
        .route("/api/settings", get(get_settings).put(put_settings))
        .route("/api/export", get(export_backup))
        .route("/api/import", post(import_backup))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Input rejections surface as 422, store failures as 500. Missing-id
/// operations are silent no-ops and answer 200 like any other success.
fn error_response(err: anyhow::Error) -> Response {
    if let Some(input) = err.downcast_ref::<InputError>() {
        (StatusCode::UNPROCESSABLE_ENTITY, input.to_string()).into_response()
    } else if err.downcast_ref::<serde_json::Error>().is_some() {
        (StatusCode::BAD_REQUEST, err.to_string()).into_response()
    } else {
        log::error!("api request failed: {err:#}");
        (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
    }
}

/// A discipline plus the analytics derived from it.
#[derive(Serialize)]
struct DisciplineView {
    #[serde(flatten)]
    discipline: Discipline,
    average_score: Option<u8>,
    weak_topic_count: usize,
    strong_topic_count: usize,
    priority_score: f64,
    status: ReviewStatus,
}

fn view_of(discipline: &Discipline, status: ReviewStatus) -> DisciplineView {
    DisciplineView {
        discipline: discipline.clone(),
        average_score: scoring::discipline_average(discipline),
        weak_topic_count: scoring::weak_topics(discipline).len(),
        strong_topic_count: scoring::strong_topics(discipline).len(),
        priority_score: scoring::priority_score(discipline),
        status,
    }
}

/// Ranked by priority, most urgent first.
async fn list_disciplines(State(state): State<ApiState>) -> Response {
    let app = state.app.lock().await;
    let views: Vec<DisciplineView> = app
        .ranked()
        .into_iter()
        .map(|d| view_of(d, app.status_of(d)))
        .collect();
    Json(views).into_response()
}

async fn create_discipline(
    State(state): State<ApiState>,
    Json(input): Json<DisciplineInput>,
) -> Response {
    let mut app = state.app.lock().await;
    match app.add_discipline(input).await {
        Ok(id) => (StatusCode::CREATED, Json(serde_json::json!({ "id": id }))).into_response(),
        Err(err) => error_response(err),
    }
}

async fn update_discipline(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(input): Json<DisciplineInput>,
) -> Response {
    let mut app = state.app.lock().await;
    match app.update_discipline(&id, input).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => error_response(err),
    }
}

async fn delete_discipline(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    let mut app = state.app.lock().await;
    match app.delete_discipline(&id).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => error_response(err),
    }
}

async fn mark_reviewed(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    let mut app = state.app.lock().await;
    match app.mark_reviewed(&id).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => error_response(err),
    }
}

async fn reset_discipline(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    let mut app = state.app.lock().await;
    match app.reset_discipline(&id).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => error_response(err),
    }
}

#[derive(Deserialize)]
struct NewTopic {
    text: String,
}

async fn add_topic(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(body): Json<NewTopic>,
) -> Response {
    let mut app = state.app.lock().await;
    match app.add_topic(&id, &body.text).await {
        Ok(topic_id) => Json(serde_json::json!({ "id": topic_id })).into_response(),
        Err(err) => error_response(err),
    }
}

async fn rename_topic(
    State(state): State<ApiState>,
    Path((id, topic_id)): Path<(String, String)>,
    Json(body): Json<NewTopic>,
) -> Response {
    let mut app = state.app.lock().await;
    match app.rename_topic(&id, &topic_id, &body.text).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => error_response(err),
    }
}

async fn delete_topic(
    State(state): State<ApiState>,
    Path((id, topic_id)): Path<(String, String)>,
) -> Response {
    let mut app = state.app.lock().await;
    match app.delete_topic(&id, &topic_id).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => error_response(err),
    }
}

async fn toggle_topic(
    State(state): State<ApiState>,
    Path((id, topic_id)): Path<(String, String)>,
) -> Response {
    let mut app = state.app.lock().await;
    match app.toggle_topic(&id, &topic_id).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => error_response(err),
    }
}

async fn reset_topic(
    State(state): State<ApiState>,
    Path((id, topic_id)): Path<(String, String)>,
) -> Response {
    let mut app = state.app.lock().await;
    match app.reset_topic(&id, &topic_id).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => error_response(err),
    }
}

#[derive(Deserialize)]
struct QuestionBatch {
    attempted: u32,
    correct: u32,
}

async fn record_questions(
    State(state): State<ApiState>,
    Path((id, topic_id)): Path<(String, String)>,
    Json(batch): Json<QuestionBatch>,
) -> Response {
    let mut app = state.app.lock().await;
    match app
        .record_questions(&id, &topic_id, batch.attempted, batch.correct)
        .await
    {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => error_response(err),
    }
}

#[derive(Serialize)]
struct HistoryView {
    reviews: Vec<crate::models::ReviewLogEntry>,
    questions: Vec<crate::models::QuestionLogEntry>,
}

/// Both append-only logs, newest last.
async fn history(State(state): State<ApiState>) -> Response {
    let app = state.app.lock().await;
    Json(HistoryView {
        reviews: app.data.review_history.clone(),
        questions: app.data.question_history.clone(),
    })
    .into_response()
}

#[derive(Serialize)]
struct StatsView {
    overall_progress: u8,
    total_disciplines: usize,
    due_today: usize,
    mastered: usize,
    high_priority: usize,
    overall_average: u8,
    study_consistency: u8,
    performance: scoring::PerformanceStats,
    focus_areas: Vec<scoring::FocusArea>,
    recommendations: Vec<scoring::Recommendation>,
    generated_at: DateTime<Utc>,
}

async fn stats(State(state): State<ApiState>) -> Response {
    let app = state.app.lock().await;
    let now = Utc::now();
    let disciplines = &app.data.disciplines;

    let view = StatsView {
        overall_progress: app.overall_progress(),
        total_disciplines: disciplines.len(),
        due_today: app.due_today(),
        mastered: app.mastered_count(),
        high_priority: app.high_priority_count(),
        overall_average: scoring::overall_average(disciplines),
        study_consistency: scoring::study_consistency(&app.data.review_history, now),
        performance: scoring::performance_stats(disciplines),
        focus_areas: scoring::focus_areas(disciplines),
        recommendations: scoring::recommendations(disciplines, &app.data.review_history, now),
        generated_at: now,
    };
    Json(view).into_response()
}

async fn get_settings(State(state): State<ApiState>) -> Response {
    let app = state.app.lock().await;
    Json(app.data.settings.clone()).into_response()
}

async fn put_settings(
    State(state): State<ApiState>,
    Json(settings): Json<UserSettings>,
) -> Response {
    let mut app = state.app.lock().await;
    match app.update_settings(settings).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => error_response(err),
    }
}

async fn export_backup(State(state): State<ApiState>) -> Response {
    let app = state.app.lock().await;
    match app.export_json() {
        Ok(raw) => ([("content-type", "application/json")], raw).into_response(),
        Err(err) => error_response(err),
    }
}

async fn import_backup(State(state): State<ApiState>, body: String) -> Response {
    let mut app = state.app.lock().await;
    match app.import_json(&body).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => error_response(err),
    }
}
