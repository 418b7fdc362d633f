use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{Method, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use pollbox_core::model::{OptionId, PollCategory, PollId, PollStatus, PollWithOptions};
use pollbox_core::service::{StatsReport, DEFAULT_TRENDING_LIMIT};
use pollbox_core::store::{ListFilter, ListOrder, PollDraft};
use pollbox_core::{PollError, PollService};
use pollbox_store::Database;

use crate::error::ApiError;

const DEFAULT_PAGE_SIZE: u32 = 10;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PollService<Database>>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/api/polls", get(list_polls).post(create_poll))
        .route("/api/polls/search", get(search_polls))
        .route("/api/polls/:id", get(get_poll))
        .route("/api/polls/:id/vote", post(submit_vote).get(vote_status))
        .route("/api/stats", get(stats))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / response shapes
// ---------------------------------------------------------------------------

/// `{success: true, data: ...}` — the envelope the frontend expects.
#[derive(Serialize)]
struct Envelope<T> {
    success: bool,
    data: T,
}

fn ok<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        data,
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Deserialize)]
struct CreatePollBody {
    question: String,
    description: Option<String>,
    category: Option<PollCategory>,
    options: Vec<String>,
    /// RFC 3339; omit for a poll that never expires.
    expires_at: Option<String>,
}

#[derive(Deserialize)]
struct ListParams {
    status: Option<PollStatus>,
    category: Option<PollCategory>,
    featured: Option<bool>,
    trending: Option<bool>,
    sort: Option<ListOrder>,
    limit: Option<u32>,
    offset: Option<u32>,
}

#[derive(Deserialize)]
struct SearchParams {
    q: Option<String>,
}

#[derive(Deserialize)]
struct VoteBody {
    option_id: Uuid,
    visitor_id: String,
}

#[derive(Deserialize)]
struct VoteStatusParams {
    visitor_id: String,
}

#[derive(Serialize)]
struct VoteStatusResponse {
    has_voted: bool,
    voted_option_id: Option<OptionId>,
    voted_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `GET /api/polls`
///
/// `featured=true` narrows the listing to the single featured poll (`data`
/// is `null` when none is active); `trending=true` returns the trending
/// set; otherwise a filtered, paginated listing.
async fn list_polls(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<axum::response::Response, ApiError> {
    use axum::response::IntoResponse;

    if params.featured == Some(true) {
        let poll = state.service.featured()?;
        return Ok(ok(poll).into_response());
    }

    if params.trending == Some(true) {
        let limit = params.limit.unwrap_or(DEFAULT_TRENDING_LIMIT);
        let polls = state.service.trending(limit)?;
        return Ok(ok(polls).into_response());
    }

    let filter = ListFilter {
        status: params.status,
        category: params.category,
        featured: None,
    };
    let polls = state.service.list(
        &filter,
        params.sort.unwrap_or_default(),
        params.limit.unwrap_or(DEFAULT_PAGE_SIZE),
        params.offset.unwrap_or(0),
    )?;
    Ok(ok(polls).into_response())
}

/// `POST /api/polls`
async fn create_poll(
    State(state): State<AppState>,
    Json(body): Json<CreatePollBody>,
) -> Result<(StatusCode, Json<Envelope<PollWithOptions>>), ApiError> {
    let expires_at = body
        .expires_at
        .as_deref()
        .map(parse_expiry)
        .transpose()?;

    let draft = PollDraft {
        question: body.question,
        description: body.description,
        category: body.category.unwrap_or_default(),
        options: body.options,
        expires_at,
        is_featured: false,
    };

    let poll = state.service.create_poll(draft)?;
    Ok((StatusCode::CREATED, ok(poll)))
}

/// `GET /api/polls/search?q=`
async fn search_polls(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Envelope<Vec<PollWithOptions>>>, ApiError> {
    let query = params.q.unwrap_or_default();
    Ok(ok(state.service.search(&query)?))
}

/// `GET /api/polls/{id}`
async fn get_poll(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Envelope<PollWithOptions>>, ApiError> {
    Ok(ok(state.service.poll(PollId(id))?))
}

/// `POST /api/polls/{id}/vote`
///
/// Success returns the updated poll so the caller can render the new
/// percentages without a second round trip.
async fn submit_vote(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<VoteBody>,
) -> Result<Json<Envelope<PollWithOptions>>, ApiError> {
    let poll = state
        .service
        .submit_vote(PollId(id), OptionId(body.option_id), &body.visitor_id)?;
    Ok(ok(poll))
}

/// `GET /api/polls/{id}/vote?visitor_id=`
async fn vote_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<VoteStatusParams>,
) -> Result<Json<Envelope<VoteStatusResponse>>, ApiError> {
    let vote = state.service.visitor_vote(PollId(id), &params.visitor_id)?;
    Ok(ok(VoteStatusResponse {
        has_voted: vote.is_some(),
        voted_option_id: vote.as_ref().map(|v| v.option_id),
        voted_at: vote.map(|v| v.created_at),
    }))
}

/// `GET /api/stats`
async fn stats(
    State(state): State<AppState>,
) -> Result<Json<Envelope<StatsReport>>, ApiError> {
    Ok(ok(state.service.stats()?))
}

fn parse_expiry(raw: &str) -> Result<DateTime<Utc>, ApiError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| {
            PollError::InvalidInput("expires_at must be a valid RFC 3339 timestamp".into()).into()
        })
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    tracing::info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
