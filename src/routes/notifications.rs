use std::convert::Infallible;

use axum::{
    Json, Router,
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
};
use futures::{Stream, stream};
use tokio::sync::broadcast::error::RecvError;

use crate::{
    dto::notifications::{RecentNotifications, SendNotificationRequest, SendNotificationResponse},
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    services::notification_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/send", post(send_notification))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/recent", get(recent_notifications))
        .route("/stream", get(stream_notifications))
}

#[utoipa::path(
    post,
    path = "/api/notifications/send",
    request_body = SendNotificationRequest,
    responses(
        (status = 200, description = "Emails dispatched", body = ApiResponse<SendNotificationResponse>),
        (status = 400, description = "Missing recipients, title or body"),
        (status = 404, description = "No matching users"),
    ),
    security(("bearer_auth" = [])),
    tag = "Notifications"
)]
pub async fn send_notification(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<SendNotificationRequest>,
) -> AppResult<Json<ApiResponse<SendNotificationResponse>>> {
    let resp = notification_service::send_notification(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/admin/notifications/recent",
    responses(
        (status = 200, description = "Last ten order notifications, newest first", body = ApiResponse<RecentNotifications>),
    ),
    security(("bearer_auth" = [])),
    tag = "Notifications"
)]
pub async fn recent_notifications(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<RecentNotifications>>> {
    let resp = notification_service::recent_order_notifications(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/admin/notifications/stream",
    responses(
        (status = 200, description = "Server-sent order notifications", content_type = "text/event-stream"),
    ),
    security(("bearer_auth" = [])),
    tag = "Notifications"
)]
pub async fn stream_notifications(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let rx = notification_service::subscribe_order_notifications(&state, &user).await?;

    let events = stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(notification) => {
                    match Event::default()
                        .event(notification.kind.as_str())
                        .json_data(&notification)
                    {
                        Ok(event) => return Some((Ok(event), rx)),
                        Err(err) => tracing::warn!(error = %err, "unserializable notification"),
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "notification stream lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
