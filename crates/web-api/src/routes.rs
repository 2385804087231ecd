use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, WebSocketUpgrade},
        Path, Query, State,
    },
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use application::ApplicationError;
use domain::{DomainError, Message, Room, RoomId};
use serde::Deserialize;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use uuid::Uuid;

use crate::{error::ApiError, state::AppState, ws_connection::WebSocketConnection};

/// HTTP 历史接口单次最多返回的消息条数
const MAX_HISTORY_PAGE: u32 = 100;

const LIVENESS_TEXT: &str = "chat server is running";

#[derive(Debug, Deserialize)]
struct CreateRoomPayload {
    name: String,
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct WsQuery {
    token: Option<String>,
}

pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.cors_origins);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/ws", get(websocket_upgrade))
        .nest("/api", api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/rooms/all", get(list_rooms))
        .route("/rooms/create", post(create_room))
        .route("/rooms/{room_id}/messages", get(get_history))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() || origins.iter().any(|origin| origin == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(origin = %origin, error = %err, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn health() -> &'static str {
    LIVENESS_TEXT
}

async fn list_rooms(State(state): State<AppState>) -> Result<Json<Vec<Room>>, ApiError> {
    let rooms = state.room_directory.list_all().await?;
    Ok(Json(rooms))
}

async fn create_room(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateRoomPayload>,
) -> Result<(StatusCode, Json<Room>), ApiError> {
    let user = state.jwt_service.extract_user_from_headers(&headers)?;

    let room = state.room_directory.create(&payload.name).await?;
    tracing::info!(room_id = %room.id, created_by = %user.email, "room created over http");

    Ok((StatusCode::CREATED, Json(room)))
}

async fn get_history(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let room_id = RoomId::from(room_id);
    if state.room_directory.find_by_id(room_id).await?.is_none() {
        return Err(ApplicationError::from(DomainError::RoomNotFound).into());
    }

    let limit = query
        .limit
        .unwrap_or(MAX_HISTORY_PAGE)
        .clamp(1, MAX_HISTORY_PAGE);
    let messages = state.message_log.recent_history(room_id, limit).await?;
    Ok(Json(messages))
}

// token 校验先于升级请求校验
async fn websocket_upgrade(
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
) -> Result<Response, ApiError> {
    let identity = match query.token.as_deref() {
        Some(token) => Some(state.jwt_service.verify_token(token)?),
        None if state.require_token => {
            return Err(ApiError::unauthorized("No token, authorization denied"))
        }
        None => None,
    };

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return Ok(rejection.into_response()),
    };
    Ok(ws.on_upgrade(move |socket| async move {
        WebSocketConnection::new(state, identity).run(socket).await;
    }))
}
