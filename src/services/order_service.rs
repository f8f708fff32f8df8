use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveEnum, ColumnTrait, Condition, ConnectionTrait, EntityTrait, JoinType, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, RelationTrait, sea_query::Expr,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::orders::{OrderDetail, OrderLineDetail, OrderList},
    entity::{
        order_line_items::{Column as LineCol, Entity as OrderLineItems},
        orders::{self, Column as OrderCol, Entity as Orders, Model as OrderModel},
        products::Entity as Products,
        users::{Column as UserCol, Entity as Users},
    },
    error::{AppError, AppResult},
    events::{OrderEventKind, OrderNotification},
    middleware::auth::{AdminModule, AuthUser, ensure_module},
    models::{Order, OrderStatus},
    money::from_cents,
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder, like_pattern},
    services::contains_ci,
    state::AppState,
};

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_module(state, user, AdminModule::Orders).await?;
    let (page, limit, offset) = query.pagination().normalize();

    let mut condition = Condition::all();
    if let Some(status) = query.status {
        condition = condition.add(OrderCol::StatusId.eq(status.to_value()));
    }
    if let Some(user_id) = query.user_id {
        condition = condition.add(OrderCol::UserId.eq(user_id));
    }
    if let Some(pattern) = like_pattern(query.q.as_deref()) {
        condition = condition.add(
            Condition::any()
                .add(contains_ci((Orders, OrderCol::OrderNumber), &pattern))
                .add(contains_ci((Users, UserCol::Name), &pattern)),
        );
    }

    let mut finder = Orders::find()
        .join(JoinType::LeftJoin, orders::Relation::Users.def())
        .filter(condition);
    finder = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Order::from)
        .collect();

    Ok(ApiResponse::success(
        "Ok",
        OrderList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderDetail>> {
    ensure_module(state, user, AdminModule::Orders).await?;
    let order = find_order(&state.orm, id).await?;
    let customer = Users::find_by_id(order.user_id).one(&state.orm).await?;

    let items: Vec<OrderLineDetail> = OrderLineItems::find()
        .filter(LineCol::OrderId.eq(order.id))
        .order_by_asc(LineCol::CreatedAt)
        .find_also_related(Products)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|(line, product)| {
            let unit_price = from_cents(line.unit_price);
            OrderLineDetail {
                product_id: line.product_id,
                product_name: product.map(|p| p.name),
                quantity: line.quantity,
                unit_price,
                subtotal: unit_price * Decimal::from(line.quantity),
            }
        })
        .collect();
    let items_total = items.iter().map(|i| i.subtotal).sum();

    Ok(ApiResponse::success(
        "OK",
        OrderDetail {
            order: order.into(),
            customer_name: customer.as_ref().map(|c| c.name.clone()),
            customer_email: customer.map(|c| c.email),
            items,
            items_total,
        },
        Some(Meta::empty()),
    ))
}

/// Flags a paid order as ready for the customer to collect.
pub async fn mark_ready_for_pickup(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Order>> {
    ensure_module(state, user, AdminModule::Orders).await?;

    let result = Orders::update_many()
        .col_expr(OrderCol::ReadyForPickup, Expr::value(true))
        .col_expr(OrderCol::UpdatedAt, Expr::value(Utc::now().fixed_offset()))
        .filter(OrderCol::Id.eq(id))
        .filter(OrderCol::StatusId.eq(OrderStatus::Paid.to_value()))
        .exec(&state.orm)
        .await?;

    let order = find_order(&state.orm, id).await?;
    if result.rows_affected == 0 {
        return Err(AppError::Conflict(format!(
            "Order is {}; only paid orders can be marked ready for pickup",
            order.status_id.as_str()
        )));
    }

    finish_transition(state, user, order, OrderEventKind::ReadyForPickup, "order_ready").await
}

pub async fn mark_delivered(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Order>> {
    ensure_module(state, user, AdminModule::Orders).await?;

    let current = find_order(&state.orm, id).await?;
    if !current.status_id.can_advance_to(OrderStatus::Delivered) {
        return Err(AppError::Conflict(format!(
            "Cannot move order from {} to delivered",
            current.status_id.as_str()
        )));
    }

    let result = Orders::update_many()
        .col_expr(OrderCol::StatusId, Expr::value(OrderStatus::Delivered.to_value()))
        .col_expr(OrderCol::UpdatedAt, Expr::value(Utc::now().fixed_offset()))
        .filter(OrderCol::Id.eq(id))
        .filter(OrderCol::StatusId.eq(OrderStatus::Paid.to_value()))
        .exec(&state.orm)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::Conflict(
            "Order changed while it was being delivered".into(),
        ));
    }

    let order = find_order(&state.orm, id).await?;
    finish_transition(state, user, order, OrderEventKind::Delivered, "order_delivered").await
}

async fn finish_transition(
    state: &AppState,
    user: &AuthUser,
    order: OrderModel,
    kind: OrderEventKind,
    action: &str,
) -> AppResult<ApiResponse<Order>> {
    let order = Order::from(order);
    state
        .events
        .publish(OrderNotification::for_order(kind, &order));
    audit::record(
        &state.orm,
        Some(user.user_id),
        action,
        "orders",
        serde_json::json!({ "order_id": order.id }),
    )
    .await;
    Ok(ApiResponse::success("Updated", order, Some(Meta::empty())))
}

async fn find_order<C: ConnectionTrait>(db: &C, id: Uuid) -> AppResult<OrderModel> {
    Orders::find_by_id(id).one(db).await?.ok_or(AppError::NotFound)
}
