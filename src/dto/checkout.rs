use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    models::OrderStatus,
    payments::{GatewayKind, ReturnTarget},
};

/// One cart entry as the storefront sends it. Entries whose product id does
/// not parse or does not exist are skipped.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CartItemInput {
    pub product_id: String,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransactionRequest {
    #[schema(value_type = Option<f64>, example = 13.76)]
    pub amount: Option<Decimal>,
    pub reference_id: Option<String>,
    #[serde(default)]
    pub cart_items: Vec<CartItemInput>,
    pub user_id: Option<Uuid>,
    pub gateway: Option<GatewayKind>,
    pub return_to: Option<ReturnTarget>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransactionResponse {
    pub success: bool,
    pub token: String,
    pub checkout_url: String,
    pub reference_id: String,
    pub order_number: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusQuery {
    pub reference_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusResponse {
    pub status: OrderStatus,
    pub order_number: String,
    pub points_earned: i32,
    #[schema(value_type = String, example = "13.76")]
    pub total: Decimal,
    pub found: bool,
}

/// Query string of the return URLs handed to gateways.
///
/// Authorize.Net appends `transId`; Clover appends its `orderId` and an
/// outcome `status` which is only logged.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CallbackQuery {
    pub reference_id: Option<String>,
    pub target: Option<ReturnTarget>,
    pub sig: Option<String>,
    pub trans_id: Option<String>,
    pub order_id: Option<String>,
    pub status: Option<String>,
}
