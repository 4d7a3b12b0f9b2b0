//! Broadcaster administration

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use streamgate_core::models::{
    Broadcaster, BroadcasterId, CreateBroadcasterRequest, UpdateBroadcasterRequest,
};

use crate::http::{AppResult, AppState};

pub fn create_broadcaster_router() -> Router<AppState> {
    Router::new()
        .route("/broadcasters", get(list_broadcasters).post(create_broadcaster))
        .route(
            "/broadcasters/{id}",
            get(get_broadcaster)
                .patch(update_broadcaster)
                .delete(delete_broadcaster),
        )
}

pub async fn create_broadcaster(
    State(state): State<AppState>,
    payload: Result<Json<CreateBroadcasterRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<Broadcaster>)> {
    let Json(request) = payload?;
    let broadcaster = state.broadcaster_service.create(request).await?;
    Ok((StatusCode::CREATED, Json(broadcaster)))
}

pub async fn list_broadcasters(State(state): State<AppState>) -> AppResult<Json<Vec<Broadcaster>>> {
    Ok(Json(state.broadcaster_service.list().await?))
}

pub async fn get_broadcaster(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Broadcaster>> {
    let broadcaster = state
        .broadcaster_service
        .get(&BroadcasterId::from_string(id))
        .await?;
    Ok(Json(broadcaster))
}

/// PATCH /broadcasters/{id}
///
/// Absent fields are left unchanged.
pub async fn update_broadcaster(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateBroadcasterRequest>, JsonRejection>,
) -> AppResult<Json<Broadcaster>> {
    let Json(request) = payload?;
    let broadcaster = state
        .broadcaster_service
        .update(&BroadcasterId::from_string(id), request)
        .await?;
    Ok(Json(broadcaster))
}

/// DELETE /broadcasters/{id}
///
/// Refused with 409 while the broadcaster still owns stream keys.
pub async fn delete_broadcaster(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    state
        .broadcaster_service
        .delete(&BroadcasterId::from_string(id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
