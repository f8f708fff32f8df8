use std::collections::BTreeSet;

use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use tokio::sync::broadcast;

use crate::{
    audit,
    dto::notifications::{RecentNotifications, SendNotificationRequest, SendNotificationResponse},
    entity::users::{Column as UserCol, Entity as Users},
    error::{AppError, AppResult},
    events::OrderNotification,
    mail,
    middleware::auth::{AdminModule, AuthUser, ensure_admin, ensure_module},
    response::{ApiResponse, Meta},
    state::AppState,
};

/// Emails a message to each selected customer. Users without an address
/// or whose delivery fails are counted as skipped.
pub async fn send_notification(
    state: &AppState,
    user: &AuthUser,
    payload: SendNotificationRequest,
) -> AppResult<ApiResponse<SendNotificationResponse>> {
    ensure_admin(user)?;

    let title = payload.title.trim();
    let body = payload.body.trim();
    if payload.user_ids.is_empty() || title.is_empty() || body.is_empty() {
        return Err(AppError::BadRequest(
            "userIds, title and body are required".into(),
        ));
    }

    let user_ids: BTreeSet<_> = payload.user_ids.iter().copied().collect();
    let recipients = Users::find()
        .filter(UserCol::Id.is_in(user_ids.iter().copied()))
        .all(&state.orm)
        .await?;
    if recipients.is_empty() {
        return Err(AppError::NotFound);
    }

    let mut sent = 0;
    let mut skipped = user_ids.len().saturating_sub(recipients.len());
    for recipient in &recipients {
        if recipient.email.trim().is_empty() {
            skipped += 1;
            continue;
        }
        let message = mail::notification_email(&recipient.email, &recipient.name, title, body);
        match state.mailer.send(message).await {
            Ok(()) => sent += 1,
            Err(err) => {
                tracing::warn!(user_id = %recipient.id, error = %err, "notification email failed");
                skipped += 1;
            }
        }
    }

    tracing::info!(sent, skipped, "notification dispatched");
    audit::record(
        &state.orm,
        Some(user.user_id),
        "notification_send",
        "users",
        serde_json::json!({ "title": title, "sent": sent, "skipped": skipped }),
    )
    .await;

    Ok(ApiResponse::success(
        "Notification sent",
        SendNotificationResponse { sent, skipped },
        Some(Meta::empty()),
    ))
}

pub async fn recent_order_notifications(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<RecentNotifications>> {
    ensure_module(state, user, AdminModule::Orders).await?;
    let items = state.events.recent();
    let meta = Meta::unpaged(items.len());
    Ok(ApiResponse::success(
        "Recent order notifications",
        RecentNotifications { items },
        Some(meta),
    ))
}

pub async fn subscribe_order_notifications(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<broadcast::Receiver<OrderNotification>> {
    ensure_module(state, user, AdminModule::Orders).await?;
    tracing::debug!(user_id = %user.user_id, "order notification stream opened");
    Ok(state.events.subscribe())
}
