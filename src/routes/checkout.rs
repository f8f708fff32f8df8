//! Storefront checkout endpoints. Successful responses use the bare shapes
//! the storefront expects rather than the `ApiResponse` envelope.

use axum::{
    Json, Router,
    extract::{Query, State},
    response::Redirect,
    routing::{get, post},
};

use crate::{
    dto::checkout::{
        CallbackQuery, CreateTransactionRequest, CreateTransactionResponse, PaymentStatusQuery,
        PaymentStatusResponse,
    },
    error::AppResult,
    services::checkout_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/create-transaction", post(create_transaction))
        .route("/check-payment-status", get(check_payment_status))
        .route("/verify-payment", get(verify_payment))
        .route("/redirect", get(gateway_redirect))
}

#[utoipa::path(
    post,
    path = "/api/checkout/create-transaction",
    request_body = CreateTransactionRequest,
    responses(
        (status = 200, description = "Hosted checkout created", body = CreateTransactionResponse),
        (status = 400, description = "Invalid input, unknown user, gateway not configured or gateway rejection"),
        (status = 409, description = "Reference id already used"),
        (status = 500, description = "Gateway unreachable or order could not be stored"),
    ),
    tag = "Checkout"
)]
pub async fn create_transaction(
    State(state): State<AppState>,
    Json(payload): Json<CreateTransactionRequest>,
) -> AppResult<Json<CreateTransactionResponse>> {
    let resp = checkout_service::create_transaction(&state, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/checkout/check-payment-status",
    params(("referenceId" = String, Query, description = "Checkout reference id")),
    responses(
        (status = 200, description = "Current order status", body = PaymentStatusResponse),
        (status = 400, description = "Missing referenceId"),
        (status = 404, description = "Unknown reference"),
    ),
    tag = "Checkout"
)]
pub async fn check_payment_status(
    State(state): State<AppState>,
    Query(query): Query<PaymentStatusQuery>,
) -> AppResult<Json<PaymentStatusResponse>> {
    let resp =
        checkout_service::check_payment_status(&state, query.reference_id.as_deref()).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/checkout/verify-payment",
    params(
        ("referenceId" = String, Query, description = "Checkout reference id"),
        ("target" = Option<String>, Query, description = "web or app"),
        ("sig" = String, Query, description = "Return URL signature"),
        ("transId" = Option<String>, Query, description = "Authorize.Net transaction id"),
    ),
    responses(
        (status = 303, description = "Redirect to the order confirmation page"),
        (status = 400, description = "Missing referenceId"),
        (status = 403, description = "Bad signature"),
        (status = 404, description = "Unknown reference"),
    ),
    tag = "Checkout"
)]
pub async fn verify_payment(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> AppResult<Redirect> {
    let location = checkout_service::handle_callback(&state, query).await?;
    Ok(Redirect::to(&location))
}

#[utoipa::path(
    get,
    path = "/api/checkout/redirect",
    params(
        ("referenceId" = String, Query, description = "Checkout reference id"),
        ("target" = Option<String>, Query, description = "web or app"),
        ("sig" = String, Query, description = "Return URL signature"),
        ("orderId" = Option<String>, Query, description = "Clover order id"),
        ("status" = Option<String>, Query, description = "Outcome claimed by the gateway; informational only"),
    ),
    responses(
        (status = 303, description = "Redirect to the order confirmation page"),
        (status = 400, description = "Missing referenceId"),
        (status = 403, description = "Bad signature"),
        (status = 404, description = "Unknown reference"),
    ),
    tag = "Checkout"
)]
pub async fn gateway_redirect(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> AppResult<Redirect> {
    let location = checkout_service::handle_callback(&state, query).await?;
    Ok(Redirect::to(&location))
}
