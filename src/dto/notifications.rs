use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::events::OrderNotification;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SendNotificationRequest {
    #[serde(default)]
    pub user_ids: Vec<Uuid>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SendNotificationResponse {
    pub sent: usize,
    /// Users with no deliverable address or whose send failed.
    pub skipped: usize,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct RecentNotifications {
    #[schema(value_type = Vec<OrderNotification>)]
    pub items: Vec<OrderNotification>,
}
