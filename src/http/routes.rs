//! HTTP route definitions

use axum::{
    extract::{Extension, Path, State},
    http::{header, Method, StatusCode},
    middleware,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::{GameMode, MatchView};
use crate::http::middleware::{require_auth, AuthenticatedUser};
use crate::matchmaking::queue::QueuedPlayer;
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // CORS configuration - support multiple origins (comma-separated in CLIENT_ORIGIN)
    let allowed_origins: Vec<header::HeaderValue> = state
        .config
        .client_origin
        .split(',')
        .filter_map(|s| s.trim().parse::<header::HeaderValue>().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true);

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/matchmaking/join", post(matchmaking_join_handler))
        .route("/matchmaking/leave", post(matchmaking_leave_handler))
        .route("/matchmaking/status", get(matchmaking_status_handler))
        .route("/matches/:match_id", get(match_view_handler))
        .route("/streaks/me", get(streak_handler))
        .layer(TimeoutLayer::new(Duration::from_secs(10)))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    active_matches: usize,
    active_players: usize,
    queue_size: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let queue_size = state.matchmaking.queue_size().await;

    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        active_matches: state.match_registry.active_matches(),
        active_players: state.match_registry.total_players(),
        queue_size,
    })
}

// ============================================================================
// Matchmaking endpoints
// ============================================================================

#[derive(Deserialize)]
struct JoinMatchRequest {
    mode: GameMode,
}

#[derive(Serialize)]
struct JoinMatchResponse {
    status: &'static str,
    message: String,
    ws_url: String,
}

async fn matchmaking_join_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Json(req): Json<JoinMatchRequest>,
) -> Result<Json<JoinMatchResponse>, AppError> {
    let player = QueuedPlayer::new(auth.user_id, auth.claims.display_name(), req.mode)
        .with_wallet(auth.claims.wallet.clone());

    state
        .matchmaking
        .join_queue(player)
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let ws_url = format!(
        "{}/ws",
        state
            .config
            .public_base_url
            .replace("https://", "wss://")
            .replace("http://", "ws://")
    );

    Ok(Json(JoinMatchResponse {
        status: "queued",
        message: "Added to matchmaking queue".to_string(),
        ws_url,
    }))
}

#[derive(Serialize)]
struct LeaveResponse {
    status: &'static str,
}

async fn matchmaking_leave_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
) -> Json<LeaveResponse> {
    state.matchmaking.leave(auth.user_id).await;
    Json(LeaveResponse { status: "left" })
}

#[derive(Serialize)]
struct MatchmakingStatus {
    queued: bool,
    match_id: Option<Uuid>,
}

async fn matchmaking_status_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
) -> Json<MatchmakingStatus> {
    Json(MatchmakingStatus {
        queued: state.matchmaking.is_in_queue(&auth.user_id).await,
        match_id: state.matchmaking.get_player_match(&auth.user_id),
    })
}

// ============================================================================
// Match and streak views
// ============================================================================

async fn match_view_handler(
    State(state): State<AppState>,
    Path(match_id): Path<Uuid>,
) -> Result<Json<MatchView>, AppError> {
    let handle = state
        .match_registry
        .get(&match_id)
        .ok_or_else(|| AppError::NotFound(format!("match {}", match_id)))?;

    Ok(Json(handle.view()))
}

#[derive(Serialize)]
struct StreakResponse {
    streak: u32,
    bonus_percent: f64,
    /// Factor applied to a base payout
    payout_multiplier: f64,
}

async fn streak_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
) -> Json<StreakResponse> {
    Json(StreakResponse {
        streak: state.streaks.streak(auth.user_id),
        bonus_percent: state.streaks.bonus_percent(auth.user_id),
        payout_multiplier: state.streaks.apply_bonus(1.0, auth.user_id),
    })
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::game::MatchDefaults;
    use crate::http::middleware::{sign_jwt, JwtClaims};
    use crate::util::time::unix_millis;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    const SECRET: &str = "test-secret";

    fn test_state() -> AppState {
        AppState::new(Config {
            server_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "debug".to_string(),
            jwt_secret: SECRET.to_string(),
            public_base_url: "https://arena.example".to_string(),
            client_origin: "http://localhost:3000".to_string(),
            match_defaults: MatchDefaults::default(),
        })
    }

    fn bearer(user_id: Uuid) -> String {
        let claims = JwtClaims {
            sub: user_id,
            exp: unix_millis() / 1000 + 600,
            iat: 0,
            name: Some("archer".to_string()),
            wallet: None,
        };
        format!("Bearer {}", sign_jwt(&claims, SECRET))
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let response = build_router(test_state())
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn join_requires_authentication() {
        let response = build_router(test_state())
            .oneshot(
                Request::post("/matchmaking/join")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"mode":"staked_duel"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn authenticated_join_is_queued() {
        let state = test_state();
        let user_id = Uuid::new_v4();
        let response = build_router(state.clone())
            .oneshot(
                Request::post("/matchmaking/join")
                    .header(header::AUTHORIZATION, bearer(user_id))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"mode":"staked_duel"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let response = build_router(state)
            .oneshot(
                Request::get("/matchmaking/status")
                    .header(header::AUTHORIZATION, bearer(user_id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let status: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(status["queued"], true);
        assert!(status["match_id"].is_null());
    }

    #[tokio::test]
    async fn streak_without_wallet_has_no_bonus() {
        let response = build_router(test_state())
            .oneshot(
                Request::get("/streaks/me")
                    .header(header::AUTHORIZATION, bearer(Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let streak: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(streak["streak"], 0);
        assert_eq!(streak["payout_multiplier"], 1.0);
    }

    #[tokio::test]
    async fn unknown_match_is_not_found() {
        let response = build_router(test_state())
            .oneshot(
                Request::get(format!("/matches/{}", Uuid::new_v4()))
                    .header(header::AUTHORIZATION, bearer(Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
