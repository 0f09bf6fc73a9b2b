//! Authenticated `/api` endpoints forwarding to the backends.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::Value;

use super::AppState;
use crate::network::auth::AuthenticatedCaller;
use crate::network::error::ApiError;
use crate::network::rate_limit::{self, Quota};

pub const CREATE_NOTIFICATION: &str = "createNotification";
pub const UPDATE_INVENTORY: &str = "updateInventory";
pub const GET_PREDICTION: &str = "getPrediction";
pub const GLOBAL_EVENT: &str = "globalEvent";

type Created = (StatusCode, Json<Value>);

fn admit(state: &AppState, quota: &Quota, caller: &AuthenticatedCaller) -> Result<(), ApiError> {
    state.limits.check(quota, caller.subject())
}

/// `POST /api/notifications`
pub async fn create_notification(
    State(state): State<AppState>,
    caller: AuthenticatedCaller,
    Json(body): Json<Value>,
) -> Result<Created, ApiError> {
    admit(&state, &rate_limit::NOTIFICATIONS, &caller)?;
    let reply = state
        .router
        .route_to_notification_service(CREATE_NOTIFICATION, body)
        .await?;
    Ok((StatusCode::CREATED, Json(reply)))
}

/// `POST /api/inventory`
pub async fn update_inventory(
    State(state): State<AppState>,
    caller: AuthenticatedCaller,
    Json(body): Json<Value>,
) -> Result<Created, ApiError> {
    admit(&state, &rate_limit::INVENTORY, &caller)?;
    let reply = state
        .router
        .route_to_inventory_service(UPDATE_INVENTORY, body)
        .await?;
    Ok((StatusCode::CREATED, Json(reply)))
}

/// `POST /api/predictions`
pub async fn get_prediction(
    State(state): State<AppState>,
    caller: AuthenticatedCaller,
    Json(body): Json<Value>,
) -> Result<Created, ApiError> {
    admit(&state, &rate_limit::PREDICTIONS, &caller)?;
    let reply = state
        .router
        .route_to_ai_ml_service(GET_PREDICTION, body)
        .await?;
    Ok((StatusCode::CREATED, Json(reply)))
}

/// `POST /api/broadcast`
///
/// 201 with the acknowledgements in registry order when every backend
/// accepted the event, 502 naming the failed and delivered backends otherwise.
pub async fn broadcast_event(
    State(state): State<AppState>,
    caller: AuthenticatedCaller,
    Json(body): Json<Value>,
) -> Result<Created, ApiError> {
    admit(&state, &rate_limit::BROADCAST, &caller)?;
    let values = state
        .router
        .broadcast(GLOBAL_EVENT, &body)
        .await
        .into_values()?;
    Ok((StatusCode::CREATED, Json(Value::Array(values))))
}
