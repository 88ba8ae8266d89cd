// Coin Pot - REST API (axum)
//
// Thin JSON layer over the service operations. Every handler locks the
// shared connection, runs one service call, and maps PotError to a status.

use crate::coins::{Coin, CoinsList};
use crate::db::Event;
use crate::error::PotError;
use crate::pot::Pot;
use crate::service::{self, AddCoinsRequest, PotContents, RemoveCoinsRequest};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
}

impl AppState {
    pub fn new(conn: Connection) -> Self {
        AppState {
            db: Arc::new(Mutex::new(conn)),
        }
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, PotError> {
        self.db
            .lock()
            .map_err(|_| PotError::internal("database lock poisoned"))
    }
}

/// API Response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            code: None,
        }
    }
}

impl IntoResponse for PotError {
    fn into_response(self) -> Response {
        let status = match &self {
            PotError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            PotError::NotFound(_) => StatusCode::NOT_FOUND,
            PotError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body: ApiResponse<()> = ApiResponse {
            success: false,
            data: None,
            error: Some(self.to_string()),
            code: Some(self.code().to_string()),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, PotError>;

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, PotError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| PotError::invalid_argument(rejection.body_text()))
}

// ============================================================================
// Request bodies
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreatePotBody {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct AddCoinsBody {
    pub coins: Vec<Coin>,
}

#[derive(Debug, Deserialize)]
pub struct RemoveCoinsBody {
    pub count: u32,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// POST /api/pots - Create an empty pot
async fn create_pot(
    State(state): State<AppState>,
    payload: Result<Json<CreatePotBody>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<Pot>>), PotError> {
    let request = body(payload)?;
    let mut conn = state.conn()?;
    let pot = service::create_pot(&mut conn, &request.name)?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(pot))))
}

/// GET /api/pots/:id - Pot and its coins
async fn get_pot(State(state): State<AppState>, Path(pot_id): Path<i64>) -> ApiResult<PotContents> {
    let conn = state.conn()?;
    let contents = service::get_pot(&conn, pot_id)?;
    Ok(Json(ApiResponse::ok(contents)))
}

/// GET /api/pots/:id/events - Audit trail for a pot
async fn get_pot_events(
    State(state): State<AppState>,
    Path(pot_id): Path<i64>,
) -> ApiResult<Vec<Event>> {
    let conn = state.conn()?;
    let events = service::pot_events(&conn, pot_id)?;
    Ok(Json(ApiResponse::ok(events)))
}

/// POST /api/pots/:id/coins - AddCoins
async fn add_coins(
    State(state): State<AppState>,
    Path(pot_id): Path<i64>,
    payload: Result<Json<AddCoinsBody>, JsonRejection>,
) -> ApiResult<CoinsList> {
    let request = AddCoinsRequest {
        pot_id,
        coins: body(payload)?.coins,
    };
    let mut conn = state.conn()?;
    let added = service::add_coins(&mut conn, &request)?;
    Ok(Json(ApiResponse::ok(added)))
}

/// POST /api/pots/:id/coins/remove - RemoveCoins
async fn remove_coins(
    State(state): State<AppState>,
    Path(pot_id): Path<i64>,
    payload: Result<Json<RemoveCoinsBody>, JsonRejection>,
) -> ApiResult<CoinsList> {
    let request = RemoveCoinsRequest {
        pot_id,
        count: body(payload)?.count,
    };
    let mut conn = state.conn()?;
    let removed = service::remove_coins(&mut conn, &request, &mut rand::thread_rng())?;
    Ok(Json(ApiResponse::ok(removed)))
}

// ============================================================================
// Router
// ============================================================================

pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/pots", post(create_pot))
        .route("/pots/:id", get(get_pot))
        .route("/pots/:id/events", get(get_pot_events))
        .route("/pots/:id/coins", post(add_coins))
        .route("/pots/:id/coins/remove", post(remove_coins))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
