//! HTTP API for Rollcall.

use crate::member::MemberEntry;
use crate::node::NodeState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use rollcall_core::ConfirmOutcome;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

type AppState = Arc<NodeState>;

/// Acknowledgement for a member command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub member: String,
    pub message: String,
}

/// Build the API router.
pub fn build_router(state: AppState) -> Router {
    // CORS layer for browser access
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/v1/health", get(health))
        // Members
        .route("/api/v1/members", get(list_members))
        .route("/api/v1/members/:id/join", post(join_member))
        .route("/api/v1/members/:id/leave", post(leave_member))
        .route("/api/v1/members/:id/confirm", post(confirm_member))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

fn status_for(e: &rollcall_core::Error) -> StatusCode {
    match e {
        rollcall_core::Error::MemberResolution(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn list_members(State(state): State<AppState>) -> Json<Vec<MemberEntry>> {
    let members = state.roster.list().await;
    Json(members.into_iter().map(MemberEntry::from).collect())
}

async fn join_member(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<Ack>), StatusCode> {
    let member = state.roster.join(&id).await.map_err(|e| status_for(&e))?;
    let message = format!("{} is now active!", member);
    Ok((StatusCode::CREATED, Json(Ack { member, message })))
}

async fn leave_member(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Ack>, StatusCode> {
    let member = state.roster.leave(&id).await.map_err(|e| status_for(&e))?;
    let message = format!("{} has left the active list.", member);
    Ok(Json(Ack { member, message }))
}

async fn confirm_member(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Ack>, StatusCode> {
    match state.roster.confirm(&id).await {
        Ok(ConfirmOutcome::Confirmed) => {
            let member = id.trim().to_string();
            let message = format!("{} is marked as active again.", member);
            Ok(Json(Ack { member, message }))
        }
        Ok(ConfirmOutcome::NotTracked) => Err(StatusCode::NOT_FOUND),
        Err(e) => Err(status_for(&e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeConfig;
    use rollcall_core::{BroadcastNotifier, MemoryStore, Roster, StaticDirectory};

    fn state() -> AppState {
        let roster = Roster::new(MemoryStore::new(), StaticDirectory::new(["alice", "bob"]));
        Arc::new(NodeState::new(
            Arc::new(roster),
            Arc::new(BroadcastNotifier::new("checks", 8)),
            NodeConfig::default(),
        ))
    }

    #[tokio::test]
    async fn join_confirm_leave() {
        let state = state();

        let (status, Json(ack)) = join_member(State(state.clone()), Path("alice".into()))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(ack.member, "alice");

        assert!(confirm_member(State(state.clone()), Path("alice".into())).await.is_ok());

        let Json(members) = list_members(State(state.clone())).await;
        assert_eq!(members.len(), 1);

        leave_member(State(state.clone()), Path("alice".into())).await.unwrap();
        let Json(members) = list_members(State(state)).await;
        assert!(members.is_empty());
    }

    #[tokio::test]
    async fn confirm_untracked_is_404() {
        let err = confirm_member(State(state()), Path("bob".into())).await.unwrap_err();
        assert_eq!(err, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_member_is_400() {
        let err = join_member(State(state()), Path("mallory".into())).await.unwrap_err();
        assert_eq!(err, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn router_builds() {
        let _router = build_router(state());
    }
}
