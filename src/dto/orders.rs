use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::Order;

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<Order>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderLineDetail {
    pub product_id: Uuid,
    /// `None` when the product row no longer resolves.
    pub product_name: Option<String>,
    pub quantity: i32,
    #[schema(value_type = String)]
    pub unit_price: Decimal,
    #[schema(value_type = String)]
    pub subtotal: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderDetail {
    pub order: Order,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub items: Vec<OrderLineDetail>,
    /// Sum of line subtotals; may differ from `order.total` for orders
    /// placed with skipped cart entries.
    #[schema(value_type = String)]
    pub items_total: Decimal,
}
