//! Dashboard API route handlers.
//!
//! All endpoints return JSON. State is shared via `Arc<DashboardState>`;
//! each handler locks exactly one session for the duration of its call.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::betting::ticket::PurchaseTicket;
use crate::betting::{BetRequest, PlanView};
use crate::data::RosterSource;
use crate::ranking::{Direction, RankKey, RankedRow};
use crate::session::{SessionRegistry, SessionSummary};
use crate::types::{BetType, Combination, Grade, KeibaError, Mark, Overlay, RaceMeta, Racecourse};

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Shared state accessible by all route handlers.
pub struct DashboardState {
    pub registry: Arc<SessionRegistry>,
    pub source: Box<dyn RosterSource>,
}

impl DashboardState {
    pub fn new(registry: Arc<SessionRegistry>, source: Box<dyn RosterSource>) -> Self {
        Self { registry, source }
    }
}

pub type AppState = Arc<DashboardState>;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Keiba(#[from] KeibaError),

    #[error("Roster source failed: {0:#}")]
    Roster(anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Keiba(e) => match e {
                KeibaError::Range { .. }
                | KeibaError::InvalidValue { .. }
                | KeibaError::InsufficientPool { .. }
                | KeibaError::CombinationNotFound(_) => StatusCode::UNPROCESSABLE_ENTITY,
                KeibaError::CompetitorNotFound(_) | KeibaError::SessionNotFound(_) => {
                    StatusCode::NOT_FOUND
                }
                KeibaError::NoActiveBet => StatusCode::CONFLICT,
            },
            ApiError::Roster(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }
        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

// ---------------------------------------------------------------------------
// Request & response types
// ---------------------------------------------------------------------------

/// Body of `POST /api/sessions`. The date defaults to today (UTC).
#[derive(Debug, Clone, Deserialize)]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub date: Option<NaiveDate>,
    pub course: Racecourse,
    pub number: u8,
    #[serde(default)]
    pub race_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub grade: Option<Grade>,
    #[serde(default)]
    pub post_time: Option<String>,
}

impl CreateSessionRequest {
    fn into_meta(self) -> Result<RaceMeta, KeibaError> {
        let mut meta = RaceMeta::new(
            self.date.unwrap_or_else(|| Utc::now().date_naive()),
            self.course,
            self.number,
        )?;
        meta.race_id = self.race_id;
        meta.name = self.name;
        meta.grade = self.grade;
        meta.post_time = self.post_time;
        Ok(meta)
    }
}

#[derive(Debug, Serialize)]
pub struct CreatedSession {
    pub id: Uuid,
    pub race: String,
    pub runners: usize,
    pub source: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct RunnersQuery {
    pub sort: Option<String>,
    pub direction: Option<Direction>,
}

#[derive(Debug, Deserialize)]
pub struct OverlayRequest {
    pub delta: i64,
}

#[derive(Debug, Serialize)]
pub struct OverlayResponse {
    pub number: u32,
    pub previous: Overlay,
    pub overlay: Overlay,
}

#[derive(Debug, Deserialize)]
pub struct MarkRequest {
    pub mark: String,
}

#[derive(Debug, Serialize)]
pub struct MarkResponse {
    pub number: u32,
    pub previous: Mark,
    pub mark: Mark,
}

/// Body of `PUT /api/sessions/:id/bet`. A missing budget takes the
/// configured `default_budget`.
#[derive(Debug, Clone, Deserialize)]
pub struct BetSlipRequest {
    pub bet_type: BetType,
    #[serde(default)]
    pub selection: Vec<u32>,
    #[serde(default)]
    pub budget: Option<u64>,
    #[serde(default = "default_auto_allocate")]
    pub auto_allocate: bool,
}

fn default_auto_allocate() -> bool {
    true
}

impl BetSlipRequest {
    fn into_request(self, default_budget: u64) -> BetRequest {
        BetRequest {
            bet_type: self.bet_type,
            selection: self.selection,
            budget: self.budget.unwrap_or(default_budget),
            auto_allocate: self.auto_allocate,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LineRequest {
    pub runners: Vec<u32>,
    pub amount: i64,
}

#[derive(Debug, Deserialize)]
pub struct RemainderRequest {
    pub runners: Vec<u32>,
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// POST /api/sessions
pub async fn create_session(
    State(state): State<AppState>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<CreatedSession>), ApiError> {
    let meta = req.into_meta()?;
    let roster = state
        .source
        .fetch_roster(&meta)
        .await
        .map_err(ApiError::Roster)?;
    let runners = roster.len();
    let race = meta.label();
    let id = state.registry.open(meta, roster).await?;
    info!(session_id = %id, race = %race, source = state.source.name(), "Session created via API");

    Ok((
        StatusCode::CREATED,
        Json(CreatedSession {
            id,
            race,
            runners,
            source: state.source.name().to_string(),
        }),
    ))
}

/// GET /api/sessions
pub async fn list_sessions(State(state): State<AppState>) -> Json<Vec<SessionSummary>> {
    Json(state.registry.list().await)
}

/// DELETE /api/sessions/:id
pub async fn close_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.registry.close(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/sessions/:id/runners?sort=&direction=
pub async fn get_runners(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<RunnersQuery>,
) -> ApiResult<Vec<RankedRow>> {
    let sort = match query.sort.as_deref() {
        Some(s) => s.parse::<RankKey>()?,
        None => RankKey::default(),
    };
    let session = state.registry.get(id).await?;
    let session = session.lock().await;
    let rule = state.registry.display().highlight_rule();
    Ok(Json(session.runner_table(sort, query.direction, &rule)))
}

/// GET /api/sessions/:id/runners/:number
pub async fn get_runner(
    State(state): State<AppState>,
    Path((id, number)): Path<(Uuid, u32)>,
) -> ApiResult<RankedRow> {
    let session = state.registry.get(id).await?;
    let session = session.lock().await;
    let rule = state.registry.display().highlight_rule();
    Ok(Json(session.runner(number, &rule)?))
}

/// PUT /api/sessions/:id/runners/:number/overlay
pub async fn set_overlay(
    State(state): State<AppState>,
    Path((id, number)): Path<(Uuid, u32)>,
    Json(req): Json<OverlayRequest>,
) -> ApiResult<OverlayResponse> {
    let session = state.registry.get(id).await?;
    let mut session = session.lock().await;
    let previous = session.set_overlay(number, req.delta, state.registry.planner())?;
    let overlay = session.store().get(number)?.overlay;
    Ok(Json(OverlayResponse {
        number,
        previous,
        overlay,
    }))
}

/// DELETE /api/sessions/:id/overlays
pub async fn reset_overlays(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<RankedRow>> {
    let session = state.registry.get(id).await?;
    let mut session = session.lock().await;
    session.reset_overlays(state.registry.planner())?;
    let rule = state.registry.display().highlight_rule();
    Ok(Json(session.runner_table(RankKey::Composite, None, &rule)))
}

/// PUT /api/sessions/:id/runners/:number/mark
pub async fn set_mark(
    State(state): State<AppState>,
    Path((id, number)): Path<(Uuid, u32)>,
    Json(req): Json<MarkRequest>,
) -> ApiResult<MarkResponse> {
    let session = state.registry.get(id).await?;
    let mut session = session.lock().await;
    let previous = session.set_mark(number, &req.mark)?;
    let mark = session.store().get(number)?.mark;
    Ok(Json(MarkResponse {
        number,
        previous,
        mark,
    }))
}

/// PUT /api/sessions/:id/bet
pub async fn configure_bet(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<BetSlipRequest>,
) -> ApiResult<PlanView> {
    let cap = state.registry.display().combination_cap;
    let req = req.into_request(state.registry.default_budget());
    let session = state.registry.get(id).await?;
    let mut session = session.lock().await;
    let plan = session.configure_bet(req, state.registry.planner())?;
    Ok(Json(plan.view(cap)))
}

/// GET /api/sessions/:id/bet
pub async fn get_bet(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<PlanView> {
    let cap = state.registry.display().combination_cap;
    let session = state.registry.get(id).await?;
    let session = session.lock().await;
    Ok(Json(session.plan()?.view(cap)))
}

/// PUT /api/sessions/:id/bet/lines
pub async fn set_line(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<LineRequest>,
) -> ApiResult<PlanView> {
    let cap = state.registry.display().combination_cap;
    let session = state.registry.get(id).await?;
    let mut session = session.lock().await;
    let combination = Combination::new(session.plan()?.request.bet_type, req.runners)?;
    session.set_manual(&combination, req.amount)?;
    Ok(Json(session.plan()?.view(cap)))
}

/// POST /api/sessions/:id/bet/remainder
pub async fn assign_remainder(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<RemainderRequest>,
) -> ApiResult<PlanView> {
    let cap = state.registry.display().combination_cap;
    let session = state.registry.get(id).await?;
    let mut session = session.lock().await;
    let combination = Combination::new(session.plan()?.request.bet_type, req.runners)?;
    session.assign_remainder(&combination)?;
    Ok(Json(session.plan()?.view(cap)))
}

/// POST /api/sessions/:id/bet/simulate
pub async fn simulate_purchase(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<PurchaseTicket> {
    let session = state.registry.get(id).await?;
    let session = session.lock().await;
    Ok(Json(session.simulate_purchase()?))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
