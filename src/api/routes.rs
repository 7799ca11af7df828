use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, Query, State, WebSocketUpgrade},
    http::{header, HeaderMap},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::api::health::HealthState;
use crate::api::latency::LatencyStats;
use crate::chain::EthersGateway;
use crate::config::Config;
use crate::db::QuestionStore;
use crate::error::AppError;
use crate::moderation::{Decision, Moderation, SubmittedPhoto, SubmittedQuestion};
use crate::stake::StakeWorkflow;
use crate::state::{ActivityLog, CardStore};
use crate::types::{MarketCard, Question, StatusFilter, TransactionRecord};
use crate::ws::DeckSession;

#[derive(Clone)]
pub struct ApiState {
    pub cfg: Arc<Config>,
    pub questions: QuestionStore,
    pub moderation: Moderation,
    pub cards: Arc<CardStore>,
    pub activity: Arc<ActivityLog>,
    pub stake: Arc<StakeWorkflow<EthersGateway>>,
    pub updates_tx: broadcast::Sender<Vec<MarketCard>>,
    pub latency: Arc<LatencyStats>,
    pub health: Arc<HealthState>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/questions", post(submit_question).get(list_public_questions))
        .route("/api/markets", get(list_markets))
        .route("/api/activity", get(list_activity))
        .route("/admin/questions", get(admin_list_questions))
        .route("/admin/questions/:id/approve", post(approve_question))
        .route("/admin/questions/:id/reject", post(reject_question))
        .route("/admin/questions/:id/market", post(link_market))
        .route("/.well-known/manifest.json", get(manifest))
        .route("/health", get(health))
        .route("/stats/latency", get(latency_stats))
        .route("/ws", get(deck_ws))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Admin authorization
// ---------------------------------------------------------------------------

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Moderation and the submission bypass require the configured admin token.
/// A role claim in the request body alone is never enough.
fn require_admin(cfg: &Config, headers: &HeaderMap) -> Result<(), AppError> {
    match bearer_token(headers) {
        Some(token) if token == cfg.admin_token => Ok(()),
        _ => Err(AppError::Unauthorized("admin token required".to_string())),
    }
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct SubmitResponse {
    pub success: bool,
    pub message: String,
    pub data: Question,
}

/// Public listing shape: a question dressed as a display card with its
/// stored fallback percentages.
#[derive(Serialize)]
pub struct QuestionCard {
    pub id: String,
    pub title: String,
    pub symbol: String,
    pub description: Option<String>,
    pub image: Option<String>,
    pub status: String,
    pub is_new: bool,
    pub yes_percentage: u8,
    pub no_percentage: u8,
    pub volume: String,
    pub category: String,
}

impl From<Question> for QuestionCard {
    fn from(q: Question) -> Self {
        QuestionCard {
            status: format!("Open • Ends {}", q.end_date),
            id: q.id,
            title: q.title,
            symbol: q.symbol,
            description: q.description,
            image: q.photo_url,
            is_new: q.is_new,
            yes_percentage: q.yes_percentage,
            no_percentage: q.no_percentage,
            volume: q.volume,
            category: q.category,
        }
    }
}

#[derive(Serialize)]
pub struct ListResponse<T> {
    pub success: bool,
    pub data: Vec<T>,
}

// ---------------------------------------------------------------------------
// Question submission and listings
// ---------------------------------------------------------------------------

async fn submit_question(
    State(state): State<ApiState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<SubmitResponse>, AppError> {
    let mut title = String::new();
    let mut description = None;
    let mut end_date = String::new();
    let mut end_time = String::new();
    let mut category = String::new();
    let mut is_admin = false;
    let mut photo = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("malformed form: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "photo" => {
                let filename = field.file_name().unwrap_or("photo").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("unreadable photo: {e}")))?;
                if !bytes.is_empty() {
                    photo = Some(SubmittedPhoto {
                        filename,
                        content_type,
                        bytes: bytes.to_vec(),
                    });
                }
            }
            _ => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("unreadable field {name}: {e}")))?;
                match name.as_str() {
                    "title" => title = value,
                    "description" if !value.is_empty() => description = Some(value),
                    "endDate" => end_date = value,
                    "endTime" => end_time = value,
                    "category" => category = value,
                    "isAdmin" => is_admin = value == "true",
                    _ => {}
                }
            }
        }
    }

    // The bypass flag is only honored for callers holding the admin token.
    if is_admin {
        require_admin(&state.cfg, &headers)?;
    }

    let question = state
        .moderation
        .submit(
            SubmittedQuestion {
                title,
                description,
                end_date,
                end_time,
                category,
                photo,
            },
            is_admin,
        )
        .await?;

    let message = if is_admin {
        "Question created and approved".to_string()
    } else {
        "Question submitted and waiting for approval".to_string()
    };
    Ok(Json(SubmitResponse {
        success: true,
        message,
        data: question,
    }))
}

/// Public listing: approved questions only, with stored fallback values.
async fn list_public_questions(
    State(state): State<ApiState>,
) -> Result<Json<ListResponse<QuestionCard>>, AppError> {
    let questions = state.questions.list_by_status(StatusFilter::Approved).await?;
    Ok(Json(ListResponse {
        success: true,
        data: questions.into_iter().map(QuestionCard::from).collect(),
    }))
}

/// The reconciled card list: questions merged with live chain state.
async fn list_markets(State(state): State<ApiState>) -> Json<Vec<MarketCard>> {
    Json(state.cards.list())
}

async fn list_activity(State(state): State<ApiState>) -> Json<Vec<TransactionRecord>> {
    Json(state.activity.list())
}

// ---------------------------------------------------------------------------
// Moderation console
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct AdminListQuery {
    pub status: Option<String>,
}

async fn admin_list_questions(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Query(params): Query<AdminListQuery>,
) -> Result<Json<Vec<Question>>, AppError> {
    require_admin(&state.cfg, &headers)?;
    let filter = match params.status.as_deref() {
        None => StatusFilter::All,
        Some(s) => StatusFilter::parse(s)
            .ok_or_else(|| AppError::Validation(format!("unknown status filter: {s}")))?,
    };
    Ok(Json(state.questions.list_by_status(filter).await?))
}

async fn approve_question(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Question>, AppError> {
    require_admin(&state.cfg, &headers)?;
    Ok(Json(state.moderation.decide(&id, Decision::Approve).await?))
}

async fn reject_question(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Question>, AppError> {
    require_admin(&state.cfg, &headers)?;
    Ok(Json(state.moderation.decide(&id, Decision::Reject).await?))
}

#[derive(Deserialize)]
pub struct LinkMarketBody {
    pub market_id: u64,
}

/// Record the on-chain market id for a deployed question. The new linkage is
/// picked up by the reconciler on its next question snapshot (process start).
async fn link_market(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<LinkMarketBody>,
) -> Result<Json<Question>, AppError> {
    require_admin(&state.cfg, &headers)?;
    state.questions.set_market_id(&id, body.market_id).await?;
    Ok(Json(state.questions.get(&id).await?))
}

// ---------------------------------------------------------------------------
// Manifest, health, stats
// ---------------------------------------------------------------------------

async fn manifest(State(state): State<ApiState>) -> Json<serde_json::Value> {
    let base = state.cfg.public_base_url.trim_end_matches('/');
    Json(serde_json::json!({
        "miniapp": {
            "version": "1",
            "name": "PredictionsHome",
            "homeUrl": base,
            "iconUrl": format!("{base}/icon.png"),
            "splashImageUrl": format!("{base}/splash.png"),
            "splashBackgroundColor": "#111118",
            "subtitle": "Swipe to predict and trade",
            "description": "Swipe cards to stake on binary YES/NO outcomes.",
            "primaryCategory": "finance",
            "tags": ["prediction-market", "swipe", "web3", "staking"],
        }
    }))
}

async fn health(State(state): State<ApiState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "cards": state.cards.len(),
        "polls_completed": state.health.polls_completed(),
        "last_poll_at_ns": state.health.last_poll_at_ns(),
        "last_poll_failures": state.health.last_poll_failures(),
        "active_sessions": state.health.active_sessions(),
    }))
}

async fn latency_stats(State(state): State<ApiState>) -> Json<serde_json::Value> {
    Json(serde_json::to_value(state.latency.summary()).unwrap_or_default())
}

// ---------------------------------------------------------------------------
// Deck session upgrade
// ---------------------------------------------------------------------------

async fn deck_ws(State(state): State<ApiState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| async move {
        let session = DeckSession::new(
            state.cards.list(),
            Arc::clone(&state.stake),
            Arc::clone(&state.activity),
        );
        session
            .run(socket, state.updates_tx.subscribe(), Arc::clone(&state.health))
            .await;
    })
}
