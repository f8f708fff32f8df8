//! Gateway and email clients against a local HTTP server that mimics the
//! provider APIs.

mod common;

use std::{
    collections::HashMap,
    net::SocketAddr,
    str::FromStr,
    sync::{Arc, Mutex},
};

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;
use common::{RecordingMailer, create_user, state_with, user_points};
use farmland_deli_api::{
    config::{AuthorizeNetConfig, CloverConfig},
    dto::checkout::{CallbackQuery, CreateTransactionRequest},
    mail::{EmailMessage, Mailer, ResendMailer},
    models::OrderStatus,
    payments::{
        AuthorizeNetGateway, CloverGateway, GatewayError, GatewayPayment, HostedCheckoutRequest,
        PaymentGateway, ReturnTarget, StatusLookup, TransactionStatus,
    },
    services::checkout_service,
};
use rust_decimal::Decimal;
use serde_json::{Value, json};

type Seen = Arc<Mutex<Vec<Value>>>;

async fn authorize_net(State(seen): State<Seen>, Json(body): Json<Value>) -> impl IntoResponse {
    seen.lock().unwrap().push(body.clone());
    let ok = json!({ "resultCode": "Ok", "message": [{ "code": "I00001", "text": "Successful." }] });

    let reply = if body.get("getHostedPaymentPageRequest").is_some() {
        let key = &body["getHostedPaymentPageRequest"]["merchantAuthentication"]["transactionKey"];
        if key == "wrong" {
            json!({
                "messages": {
                    "resultCode": "Error",
                    "message": [{ "code": "E00007", "text": "User authentication failed." }]
                }
            })
        } else {
            json!({ "token": "tok-123", "messages": ok })
        }
    } else if body.get("getTransactionDetailsRequest").is_some() {
        json!({
            "transaction": {
                "transId": body["getTransactionDetailsRequest"]["transId"],
                "transactionStatus": "settledSuccessfully",
                "order": { "invoiceNumber": "ORD20240405AAAA0001" },
                "authAmount": 13.76,
                "settleAmount": 13.76
            },
            "messages": ok
        })
    } else {
        json!({
            "transactions": [
                { "transId": "9001", "transactionStatus": "declined", "invoiceNumber": "OTHER", "settleAmount": 5.00 },
                { "transId": "9002", "transactionStatus": "capturedPendingSettlement", "invoiceNumber": "ORD20240405AAAA0001", "settleAmount": 13.76 }
            ],
            "messages": ok
        })
    };
    // Authorize.Net prefixes its JSON with a byte order mark.
    (
        [(header::CONTENT_TYPE, "application/json")],
        format!("\u{feff}{reply}"),
    )
}

async fn html_error() -> impl IntoResponse {
    (
        StatusCode::BAD_GATEWAY,
        [(header::CONTENT_TYPE, "text/html")],
        "<html><body>502 Bad Gateway</body></html>",
    )
}

async fn clover_checkout(
    State(seen): State<Seen>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    seen.lock().unwrap().push(body);
    if headers.get("x-clover-merchant-id").and_then(|v| v.to_str().ok()) != Some("MID1") {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Unknown merchant" })),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "href": "https://checkout.clover.example/sess-1",
            "checkoutSessionId": "sess-1"
        })),
    )
}

/// Line items are only included when expanded, as Clover does.
async fn clover_order(
    Path((_mid, order_id)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Value> {
    let (state, total, name) = match order_id.as_str() {
        "PAID1" => ("paid", 1376, "REF-CLV"),
        "PAIDBIG" => ("paid", 50000, "REF-BIG"),
        _ => ("open", 1376, "REF-CLV"),
    };
    let mut order = json!({ "id": order_id, "state": state, "total": total });
    if query.get("expand").map(String::as_str) == Some("lineItems") {
        order["lineItems"] = json!({ "elements": [{ "name": name, "price": total }] });
    }
    Json(order)
}

async fn resend(
    State(seen): State<Seen>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        == Some("Bearer re_test");
    if !authorized {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "API key is invalid" })),
        );
    }
    seen.lock().unwrap().push(body);
    (StatusCode::OK, Json(json!({ "id": "email-1" })))
}

async fn spawn_provider() -> (String, Seen) {
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .route("/xml/v1/request.api", post(authorize_net))
        .route("/broken", post(html_error))
        .route("/invoicingcheckoutservice/v1/checkouts", post(clover_checkout))
        .route("/v3/merchants/{mid}/orders/{order_id}", get(clover_order))
        .route("/emails", post(resend))
        .with_state(seen.clone());

    let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), seen)
}

fn checkout_request(reference_id: &str) -> HostedCheckoutRequest {
    HostedCheckoutRequest {
        reference_id: reference_id.into(),
        order_number: "ORD-20240405-AAAA0001".into(),
        amount_cents: 1376,
        description: "Farm Land Deli Order ORD-TEST".into(),
        return_url: "http://localhost:3000/api/checkout/redirect?referenceId=x&target=web&sig=00"
            .into(),
    }
}

fn authorize_config(base: &str, api_path: &str, key: &str) -> AuthorizeNetConfig {
    AuthorizeNetConfig {
        login_id: "login".into(),
        transaction_key: key.into(),
        api_url: format!("{base}{api_path}"),
        hosted_page_url: "https://test.authorize.net/payment/payment".into(),
    }
}

fn lookup<'a>(reference_id: &'a str, transaction_id: Option<&'a str>) -> StatusLookup<'a> {
    lookup_order(reference_id, "ORD-20240405-AAAA0001", transaction_id)
}

fn lookup_order<'a>(
    reference_id: &'a str,
    order_number: &'a str,
    transaction_id: Option<&'a str>,
) -> StatusLookup<'a> {
    StatusLookup {
        reference_id,
        order_number,
        amount_cents: 1376,
        checkout_id: None,
        transaction_id,
        created_at: Utc::now(),
    }
}

#[tokio::test]
async fn authorize_net_issues_hosted_page_token() {
    let (base, seen) = spawn_provider().await;
    let gateway = AuthorizeNetGateway::new(
        reqwest::Client::new(),
        authorize_config(&base, "/xml/v1/request.api", "key"),
    );

    let checkout = gateway
        .create_checkout(&checkout_request("REF-ANET"))
        .await
        .unwrap();
    assert_eq!(checkout.checkout_id, "tok-123");
    assert_eq!(
        checkout.checkout_url,
        "https://test.authorize.net/payment/payment/tok-123"
    );

    let sent = seen.lock().unwrap()[0].clone();
    let txn = &sent["getHostedPaymentPageRequest"]["transactionRequest"];
    assert_eq!(txn["amount"], "13.76");
    assert_eq!(txn["order"]["invoiceNumber"], "ORD20240405AAAA0001");
}

#[tokio::test]
async fn authorize_net_rejection_and_html_pages_are_errors() {
    let (base, _) = spawn_provider().await;
    let rejected = AuthorizeNetGateway::new(
        reqwest::Client::new(),
        authorize_config(&base, "/xml/v1/request.api", "wrong"),
    )
    .create_checkout(&checkout_request("REF-BAD"))
    .await
    .unwrap_err();
    assert!(matches!(&rejected, GatewayError::Rejected(text) if text.contains("E00007")));

    let html = AuthorizeNetGateway::new(
        reqwest::Client::new(),
        authorize_config(&base, "/broken", "key"),
    )
    .create_checkout(&checkout_request("REF-HTML"))
    .await
    .unwrap_err();
    match html {
        GatewayError::UnexpectedBody { status, snippet } => {
            assert_eq!(status, 502);
            assert!(snippet.contains("Bad Gateway"));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn authorize_net_status_by_id_or_invoice() {
    let (base, _) = spawn_provider().await;
    let gateway = AuthorizeNetGateway::new(
        reqwest::Client::new(),
        authorize_config(&base, "/xml/v1/request.api", "key"),
    );

    let by_id = gateway
        .transaction_status(&lookup("REF-ANY", Some("60123")))
        .await
        .unwrap();
    assert_eq!(
        by_id,
        TransactionStatus::Captured(GatewayPayment {
            transaction_id: Some("60123".into()),
            reference: Some("ORD20240405AAAA0001".into()),
            amount_cents: Some(1376),
        })
    );

    let by_invoice = gateway
        .transaction_status(&lookup_order("REF-ANY", "ORD-20240405-AAAA0001", None))
        .await
        .unwrap();
    assert_eq!(
        by_invoice,
        TransactionStatus::Captured(GatewayPayment {
            transaction_id: Some("9002".into()),
            reference: Some("ORD20240405AAAA0001".into()),
            amount_cents: Some(1376),
        })
    );

    let unknown = gateway
        .transaction_status(&lookup_order("REF-ANY", "ORD-20240405-BBBB0002", None))
        .await
        .unwrap();
    assert_eq!(unknown, TransactionStatus::Pending);
}

#[tokio::test]
async fn authorize_net_invoices_do_not_collide_on_long_references() {
    let (base, _) = spawn_provider().await;
    let gateway = AuthorizeNetGateway::new(
        reqwest::Client::new(),
        authorize_config(&base, "/xml/v1/request.api", "key"),
    );

    // Same first 20 characters, different orders.
    let paid = gateway
        .transaction_status(&lookup_order(
            "FLD-1712345678901-13.76",
            "ORD-20240405-AAAA0001",
            None,
        ))
        .await
        .unwrap();
    assert!(matches!(paid, TransactionStatus::Captured(_)));

    let other = gateway
        .transaction_status(&lookup_order(
            "FLD-1712345678901-13.99",
            "ORD-20240405-AAAA0002",
            None,
        ))
        .await
        .unwrap();
    assert_eq!(other, TransactionStatus::Pending);
    assert_eq!(
        gateway.order_reference("FLD-1712345678901-13.99", "ORD-20240405-AAAA0002"),
        "ORD20240405AAAA0002"
    );
}

#[tokio::test]
async fn clover_checkout_and_order_lookup() {
    let (base, seen) = spawn_provider().await;
    let config = CloverConfig {
        api_token: "tok".into(),
        merchant_id: "MID1".into(),
        api_base: base.clone(),
    };
    let gateway = CloverGateway::new(reqwest::Client::new(), config.clone());

    let checkout = gateway
        .create_checkout(&checkout_request("REF-CLV"))
        .await
        .unwrap();
    assert_eq!(checkout.checkout_id, "sess-1");
    assert_eq!(checkout.checkout_url, "https://checkout.clover.example/sess-1");

    let sent = seen.lock().unwrap()[0].clone();
    assert_eq!(sent["shoppingCart"]["lineItems"][0]["price"], 1376);
    assert!(
        sent["redirectUrls"]["failure"]
            .as_str()
            .unwrap()
            .ends_with("status=failure")
    );

    assert_eq!(
        gateway.transaction_status(&lookup("REF-CLV", None)).await.unwrap(),
        TransactionStatus::Pending
    );
    assert_eq!(
        gateway
            .transaction_status(&lookup("REF-CLV", Some("PAID1")))
            .await
            .unwrap(),
        TransactionStatus::Captured(GatewayPayment {
            transaction_id: Some("PAID1".into()),
            reference: Some("REF-CLV".into()),
            amount_cents: Some(1376),
        })
    );
    assert_eq!(
        gateway
            .transaction_status(&lookup("REF-CLV", Some("OPEN1")))
            .await
            .unwrap(),
        TransactionStatus::Pending
    );

    let wrong_merchant = CloverGateway::new(
        reqwest::Client::new(),
        CloverConfig {
            merchant_id: "OTHER".into(),
            ..config
        },
    );
    let err = wrong_merchant
        .create_checkout(&checkout_request("REF-CLV2"))
        .await
        .unwrap_err();
    assert!(matches!(&err, GatewayError::Rejected(text) if text.contains("Unknown merchant")));
}

#[tokio::test]
async fn clover_redirect_with_another_orders_id_leaves_order_unpaid() -> anyhow::Result<()> {
    let (base, _) = spawn_provider().await;
    let clover = CloverGateway::new(
        reqwest::Client::new(),
        CloverConfig {
            api_token: "tok".into(),
            merchant_id: "MID1".into(),
            api_base: base,
        },
    );
    let state = state_with(
        vec![Arc::new(clover) as Arc<dyn PaymentGateway>],
        Arc::new(RecordingMailer::default()),
    )
    .await?;
    let customer = create_user(&state, "customer", "big@example.com", 0).await?;

    checkout_service::create_transaction(
        &state,
        CreateTransactionRequest {
            amount: Some(Decimal::from_str("500.00")?),
            reference_id: Some("REF-BIG".into()),
            cart_items: Vec::new(),
            user_id: Some(customer.id),
            gateway: None,
            return_to: None,
        },
    )
    .await?;

    let callback = |order_id: &str| -> anyhow::Result<CallbackQuery> {
        Ok(CallbackQuery {
            reference_id: Some("REF-BIG".into()),
            target: Some(ReturnTarget::Web),
            sig: Some(state.signer.sign("REF-BIG", ReturnTarget::Web)?),
            order_id: Some(order_id.into()),
            ..Default::default()
        })
    };

    // PAID1 is a paid 13.76 Clover order for REF-CLV.
    let location = checkout_service::handle_callback(&state, callback("PAID1")?).await?;
    assert!(location.contains("status=pending"));
    let order = checkout_service::find_by_reference(&state.orm, "REF-BIG")
        .await?
        .unwrap();
    assert_eq!(order.status_id, OrderStatus::Pending);
    assert_eq!(order.gateway_transaction_id, None);
    assert_eq!(user_points(&state, customer.id).await?, 0);

    let location = checkout_service::handle_callback(&state, callback("PAIDBIG")?).await?;
    assert!(location.contains("status=paid"));
    assert_eq!(user_points(&state, customer.id).await?, 50);
    Ok(())
}

#[tokio::test]
async fn resend_mailer_posts_and_reports_rejections() {
    let (base, seen) = spawn_provider().await;
    let message = EmailMessage {
        to: "ada@example.com".into(),
        subject: "Your order is ready".into(),
        html: "<p>Come on by</p>".into(),
    };

    let mailer = ResendMailer::new(
        reqwest::Client::new(),
        "re_test".into(),
        base.clone(),
        "Farmland Deli <no-reply@farmlanddeli.com>".into(),
    );
    mailer.send(message.clone()).await.unwrap();
    let sent = seen.lock().unwrap()[0].clone();
    assert_eq!(sent["to"][0], "ada@example.com");
    assert_eq!(sent["subject"], "Your order is ready");

    let bad_key = ResendMailer::new(
        reqwest::Client::new(),
        "re_wrong".into(),
        base,
        "Farmland Deli <no-reply@farmlanddeli.com>".into(),
    );
    let err = bad_key.send(message).await.unwrap_err();
    assert!(err.to_string().contains("401"));
}
