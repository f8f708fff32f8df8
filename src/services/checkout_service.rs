//! Checkout and payment reconciliation. Status changes are conditional on
//! `status_id = pending`, so an order settles at most once.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use sea_orm::{
    ActiveEnum, ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter,
    Set, SqlErr, TransactionTrait, sea_query::Expr,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::checkout::{
        CallbackQuery, CartItemInput, CreateTransactionRequest, CreateTransactionResponse,
        PaymentStatusResponse,
    },
    entity::{
        order_line_items::ActiveModel as LineItemActive,
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        products::{Column as ProductCol, Entity as Products},
        users::{Column as UserCol, Entity as Users},
    },
    error::{AppError, AppResult},
    events::{OrderEventKind, OrderNotification},
    models::{Order, OrderStatus},
    money::{from_cents, loyalty_points, to_cents},
    payments::{GatewayKind, HostedCheckoutRequest, ReturnTarget, StatusLookup, TransactionStatus},
    state::AppState,
};

const REFERENCE_ID_MAX: usize = 64;
pub const VERIFY_PAYMENT_PATH: &str = "/api/checkout/verify-payment";
pub const REDIRECT_PATH: &str = "/api/checkout/redirect";

pub async fn create_transaction(
    state: &AppState,
    payload: CreateTransactionRequest,
) -> AppResult<CreateTransactionResponse> {
    let reference_id = required_reference(payload.reference_id.as_deref())?;
    let amount = payload
        .amount
        .ok_or_else(|| AppError::BadRequest("amount is required".into()))?;
    let amount_cents = to_cents(amount)?;
    let user_id = payload
        .user_id
        .ok_or_else(|| AppError::BadRequest("userId is required".into()))?;

    Users::find_by_id(user_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::BadRequest("Unknown user".into()))?;

    if find_by_reference(&state.orm, &reference_id).await?.is_some() {
        return Err(AppError::Conflict(format!(
            "An order already exists for reference {reference_id}"
        )));
    }

    let kind = payload.gateway.unwrap_or(state.gateways.default_kind());
    let gateway = state.gateways.get(kind).ok_or_else(|| {
        AppError::BadRequest(format!("Payment gateway '{kind}' is not configured"))
    })?;

    let target = payload.return_to.unwrap_or_default();
    let return_url = state.signer.return_url(
        &state.config.public_url,
        return_path(kind),
        &reference_id,
        target,
    )?;

    let order_number = generate_order_number();
    let checkout = gateway
        .create_checkout(&HostedCheckoutRequest {
            reference_id: reference_id.clone(),
            order_number: order_number.clone(),
            amount_cents,
            description: format!("Farm Land Deli Order {order_number}"),
            return_url,
        })
        .await
        .inspect_err(|err| {
            tracing::error!(%reference_id, gateway = %kind, error = %err, "hosted checkout failed");
        })?;

    let order = persist_order(
        state,
        NewOrder {
            reference_id: &reference_id,
            order_number: &order_number,
            user_id,
            amount_cents,
            gateway: kind,
            checkout_id: &checkout.checkout_id,
        },
        &payload.cart_items,
    )
    .await?;

    tracing::info!(
        %reference_id,
        order_number = %order.order_number,
        gateway = %kind,
        "checkout created"
    );
    state.events.publish(OrderNotification::for_order(
        OrderEventKind::Created,
        &Order::from(order.clone()),
    ));
    audit::record(
        &state.orm,
        Some(user_id),
        "checkout_create",
        "orders",
        serde_json::json!({ "order_id": order.id, "reference_id": reference_id }),
    )
    .await;

    Ok(CreateTransactionResponse {
        success: true,
        token: checkout.checkout_id,
        checkout_url: checkout.checkout_url,
        reference_id,
        order_number: order.order_number,
    })
}

struct NewOrder<'a> {
    reference_id: &'a str,
    order_number: &'a str,
    user_id: Uuid,
    amount_cents: i64,
    gateway: GatewayKind,
    checkout_id: &'a str,
}

/// Writes the pending order and its line items in one transaction.
async fn persist_order(
    state: &AppState,
    new: NewOrder<'_>,
    cart_items: &[CartItemInput],
) -> AppResult<OrderModel> {
    let txn = state.orm.begin().await?;
    let now = Utc::now();

    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        order_number: Set(new.order_number.to_string()),
        payment_reference: Set(new.reference_id.to_string()),
        user_id: Set(new.user_id),
        price: Set(new.amount_cents),
        status_id: Set(OrderStatus::Pending),
        ready_for_pickup: Set(false),
        gateway: Set(new.gateway.as_str().to_string()),
        gateway_checkout_id: Set(Some(new.checkout_id.to_string())),
        gateway_transaction_id: Set(None),
        points_awarded: Set(0),
        paid_at: Set(None),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&txn)
    .await
    .map_err(|err| duplicate_reference(err, new.reference_id))?;

    let requested = valid_cart_entries(cart_items);
    let ids: Vec<Uuid> = requested
        .iter()
        .map(|(id, _)| *id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    let prices: HashMap<Uuid, i64> = if ids.is_empty() {
        HashMap::new()
    } else {
        Products::find()
            .filter(ProductCol::Id.is_in(ids))
            .all(&txn)
            .await?
            .into_iter()
            .map(|p| (p.id, p.price))
            .collect()
    };

    let mut written = 0usize;
    for (product_id, quantity) in requested {
        let Some(unit_price) = prices.get(&product_id) else {
            tracing::warn!(order_id = %order.id, %product_id, "skipping cart entry for unknown product");
            continue;
        };
        LineItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(product_id),
            quantity: Set(quantity),
            unit_price: Set(*unit_price),
            created_at: Set(now.into()),
        }
        .insert(&txn)
        .await?;
        written += 1;
    }

    txn.commit().await?;

    if written < cart_items.len() {
        tracing::warn!(
            order_id = %order.id,
            requested = cart_items.len(),
            written,
            "some cart entries were skipped"
        );
    }
    Ok(order)
}

/// A concurrent checkout with the same reference loses on the unique index.
fn duplicate_reference(err: DbErr, reference_id: &str) -> AppError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            AppError::Conflict(format!("An order already exists for reference {reference_id}"))
        }
        _ => err.into(),
    }
}

/// Cart entries with a parsable product id and a positive quantity.
pub fn valid_cart_entries(items: &[CartItemInput]) -> Vec<(Uuid, i32)> {
    items
        .iter()
        .filter(|item| item.quantity > 0)
        .filter_map(|item| {
            Uuid::parse_str(item.product_id.trim())
                .ok()
                .map(|id| (id, item.quantity))
        })
        .collect()
}

pub async fn check_payment_status(
    state: &AppState,
    reference_id: Option<&str>,
) -> AppResult<PaymentStatusResponse> {
    let reference_id = required_reference(reference_id)?;
    let order = find_by_reference(&state.orm, &reference_id)
        .await?
        .ok_or(AppError::NotFound)?;
    let order = reconcile(state, order, None).await?;
    Ok(status_response(&order))
}

fn status_response(order: &OrderModel) -> PaymentStatusResponse {
    PaymentStatusResponse {
        status: order.status_id,
        order_number: order.order_number.clone(),
        points_earned: order.points_awarded,
        total: from_cents(order.price),
        found: true,
    }
}

/// Brings a pending order up to date with its gateway. Settled orders are
/// returned untouched.
///
/// `callback_transaction_id` comes from the customer's redirect and is only a
/// hint: a payment counts only when the gateway files it under this order's
/// reference for this order's amount, and only then is the id stored.
pub async fn reconcile(
    state: &AppState,
    order: OrderModel,
    callback_transaction_id: Option<String>,
) -> AppResult<OrderModel> {
    if order.status_id != OrderStatus::Pending {
        return Ok(order);
    }

    let hint = callback_transaction_id
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());

    let Ok(kind) = order.gateway.parse::<GatewayKind>() else {
        tracing::warn!(order_id = %order.id, gateway = %order.gateway, "order has an unknown gateway");
        return Ok(order);
    };
    let Some(gateway) = state.gateways.get(kind) else {
        tracing::warn!(order_id = %order.id, gateway = %kind, "gateway for order is not configured");
        return Ok(order);
    };

    let lookup = StatusLookup {
        reference_id: &order.payment_reference,
        order_number: &order.order_number,
        amount_cents: order.price,
        checkout_id: order.gateway_checkout_id.as_deref(),
        transaction_id: order.gateway_transaction_id.as_deref().or(hint.as_deref()),
        created_at: order.created_at.with_timezone(&Utc),
    };
    let outcome = match gateway.transaction_status(&lookup).await {
        Ok(outcome) => outcome,
        Err(err) => {
            // The poller asks again; a flaky gateway must not fail the order.
            tracing::warn!(
                reference_id = %order.payment_reference,
                gateway = %kind,
                error = %err,
                "payment status lookup failed"
            );
            return Ok(order);
        }
    };

    let expected_reference = gateway.order_reference(&order.payment_reference, &order.order_number);
    match outcome {
        TransactionStatus::Pending => Ok(order),
        TransactionStatus::Captured(payment) | TransactionStatus::Declined { payment, .. }
            if !payment.matches(&expected_reference, order.price) =>
        {
            tracing::warn!(
                reference_id = %order.payment_reference,
                gateway = %kind,
                transaction_id = payment.transaction_id.as_deref().unwrap_or("-"),
                gateway_reference = payment.reference.as_deref().unwrap_or("-"),
                gateway_amount_cents = payment.amount_cents,
                "gateway payment does not belong to this order"
            );
            Ok(order)
        }
        TransactionStatus::Captured(payment) => {
            if confirm_payment(&state.orm, order.id, payment.transaction_id).await? {
                let paid = reload(&state.orm, order.id).await?;
                tracing::info!(
                    reference_id = %paid.payment_reference,
                    points = paid.points_awarded,
                    "payment confirmed"
                );
                state.events.publish(OrderNotification::for_order(
                    OrderEventKind::Paid,
                    &Order::from(paid.clone()),
                ));
                audit::record(
                    &state.orm,
                    Some(paid.user_id),
                    "payment_confirmed",
                    "orders",
                    serde_json::json!({ "order_id": paid.id, "points": paid.points_awarded }),
                )
                .await;
                Ok(paid)
            } else {
                reload(&state.orm, order.id).await
            }
        }
        TransactionStatus::Declined { payment, reason } => {
            if mark_failed(&state.orm, order.id, payment.transaction_id).await? {
                let failed = reload(&state.orm, order.id).await?;
                tracing::info!(reference_id = %failed.payment_reference, %reason, "payment declined");
                state.events.publish(OrderNotification::for_order(
                    OrderEventKind::Failed,
                    &Order::from(failed.clone()),
                ));
                Ok(failed)
            } else {
                reload(&state.orm, order.id).await
            }
        }
    }
}

/// Moves a pending order to paid and credits its points, atomically.
///
/// Returns `false` when the order was no longer pending; nothing is written
/// in that case.
pub async fn confirm_payment<C>(
    db: &C,
    order_id: Uuid,
    transaction_id: Option<String>,
) -> AppResult<bool>
where
    C: ConnectionTrait + TransactionTrait,
{
    let txn = db.begin().await?;
    let order = Orders::find_by_id(order_id)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;
    let points = loyalty_points(order.price);
    let now = Utc::now();

    let mut update = Orders::update_many()
        .col_expr(OrderCol::StatusId, Expr::value(OrderStatus::Paid.to_value()))
        .col_expr(OrderCol::PointsAwarded, Expr::value(points))
        .col_expr(OrderCol::PaidAt, Expr::value(now.fixed_offset()))
        .col_expr(OrderCol::UpdatedAt, Expr::value(now.fixed_offset()));
    if let Some(transaction_id) = transaction_id {
        update = update.col_expr(OrderCol::GatewayTransactionId, Expr::value(transaction_id));
    }
    let result = update
        .filter(OrderCol::Id.eq(order_id))
        .filter(OrderCol::StatusId.eq(OrderStatus::Pending.to_value()))
        .exec(&txn)
        .await?;

    if result.rows_affected != 1 {
        txn.rollback().await?;
        return Ok(false);
    }

    Users::update_many()
        .col_expr(UserCol::Points, Expr::col(UserCol::Points).add(points))
        .filter(UserCol::Id.eq(order.user_id))
        .exec(&txn)
        .await?;

    txn.commit().await?;
    Ok(true)
}

/// Pending to failed. Returns whether this call made the change.
pub async fn mark_failed<C: ConnectionTrait>(
    db: &C,
    order_id: Uuid,
    transaction_id: Option<String>,
) -> AppResult<bool> {
    let mut update = Orders::update_many()
        .col_expr(OrderCol::StatusId, Expr::value(OrderStatus::Failed.to_value()))
        .col_expr(OrderCol::UpdatedAt, Expr::value(Utc::now().fixed_offset()));
    if let Some(transaction_id) = transaction_id {
        update = update.col_expr(OrderCol::GatewayTransactionId, Expr::value(transaction_id));
    }
    let result = update
        .filter(OrderCol::Id.eq(order_id))
        .filter(OrderCol::StatusId.eq(OrderStatus::Pending.to_value()))
        .exec(db)
        .await?;
    Ok(result.rows_affected == 1)
}

/// Handles a customer returning from a gateway and returns where to send them.
///
/// Only URLs this service signed are honoured. Whatever outcome the gateway
/// put in the query string is logged but never trusted; the order is
/// reconciled against the gateway instead.
pub async fn handle_callback(state: &AppState, query: CallbackQuery) -> AppResult<String> {
    let reference_id = required_reference(query.reference_id.as_deref())?;
    let target = query.target.unwrap_or_default();
    let signature = query.sig.as_deref().ok_or(AppError::Forbidden)?;
    if !state.signer.verify(&reference_id, target, signature) {
        tracing::warn!(%reference_id, "callback signature mismatch");
        return Err(AppError::Forbidden);
    }

    let order = find_by_reference(&state.orm, &reference_id)
        .await?
        .ok_or(AppError::NotFound)?;
    tracing::info!(
        %reference_id,
        claimed_status = query.status.as_deref().unwrap_or("-"),
        "customer returned from gateway"
    );

    let transaction_id = query.trans_id.or(query.order_id);
    let order = reconcile(state, order, transaction_id).await?;
    confirmation_url(state, &order, target)
}

/// `{SITE_URL}/order-confirmation?..` or `{scheme}://order-confirmation?..`.
pub fn confirmation_url(
    state: &AppState,
    order: &OrderModel,
    target: ReturnTarget,
) -> AppResult<String> {
    let base = match target {
        ReturnTarget::Web => format!("{}/order-confirmation", state.config.site_url),
        ReturnTarget::App => format!("{}://order-confirmation", state.config.app_deep_link_scheme),
    };
    let mut url = reqwest::Url::parse(&base)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("invalid confirmation url {base}: {e}")))?;
    url.query_pairs_mut()
        .append_pair("status", order.status_id.as_str())
        .append_pair("referenceId", &order.payment_reference)
        .append_pair("amount", &from_cents(order.price).to_string())
        .append_pair("orderNumber", &order.order_number);
    Ok(url.to_string())
}

pub async fn find_by_reference<C: ConnectionTrait>(
    db: &C,
    reference_id: &str,
) -> AppResult<Option<OrderModel>> {
    Ok(Orders::find()
        .filter(OrderCol::PaymentReference.eq(reference_id))
        .one(db)
        .await?)
}

async fn reload<C: ConnectionTrait>(db: &C, order_id: Uuid) -> AppResult<OrderModel> {
    Orders::find_by_id(order_id)
        .one(db)
        .await?
        .ok_or(AppError::NotFound)
}

fn required_reference(reference_id: Option<&str>) -> AppResult<String> {
    let reference_id = reference_id.map(str::trim).unwrap_or_default();
    if reference_id.is_empty() {
        return Err(AppError::BadRequest("referenceId is required".into()));
    }
    if reference_id.chars().count() > REFERENCE_ID_MAX {
        return Err(AppError::BadRequest(format!(
            "referenceId must be at most {REFERENCE_ID_MAX} characters"
        )));
    }
    Ok(reference_id.to_string())
}

fn return_path(kind: GatewayKind) -> &'static str {
    match kind {
        GatewayKind::AuthorizeNet => VERIFY_PAYMENT_PATH,
        GatewayKind::Clover | GatewayKind::Sandbox => REDIRECT_PATH,
    }
}

/// `ORD-YYYYMMDD-XXXXXXXX`.
pub fn generate_order_number() -> String {
    let suffix: String = Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(8)
        .collect();
    format!(
        "ORD-{}-{}",
        Utc::now().format("%Y%m%d"),
        suffix.to_uppercase()
    )
}
