use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Coupon, CouponStatus};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateCouponRequest {
    /// Generated when omitted.
    pub coupon_code: Option<String>,
    pub user_id: Uuid,
    pub order_number: Option<String>,
    pub reward_title: String,
    pub reward_description: Option<String>,
    #[serde(default)]
    pub points_used: i32,
    pub expiration_date: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateCouponRequest {
    pub reward_title: Option<String>,
    pub reward_description: Option<String>,
    pub status: Option<CouponStatus>,
    pub expiration_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct CouponList {
    #[schema(value_type = Vec<Coupon>)]
    pub items: Vec<Coupon>,
}
