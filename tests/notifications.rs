mod common;

use std::str::FromStr;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use common::{JWT_SECRET, auth_for, create_user, grant, setup};
use farmland_deli_api::{
    dto::{checkout::CreateTransactionRequest, notifications::SendNotificationRequest},
    error::AppError,
    events::OrderEventKind,
    routes::create_api_router,
    services::{auth_service::issue_token, checkout_service, notification_service},
};
use rust_decimal::Decimal;
use tower::ServiceExt;
use uuid::Uuid;

fn message(user_ids: Vec<Uuid>) -> SendNotificationRequest {
    SendNotificationRequest {
        user_ids,
        title: "Weekend special".into(),
        body: "Two-for-one heroes on Saturday".into(),
    }
}

#[tokio::test]
async fn sends_to_known_users_and_counts_the_rest() -> anyhow::Result<()> {
    let app = setup().await?;
    let admin = create_user(&app.state, "admin", "admin@example.com", 0).await?;
    let ada = create_user(&app.state, "customer", "ada@example.com", 0).await?;
    let bounce = create_user(&app.state, "customer", "bounce@example.com", 0).await?;
    app.mailer.reject("bounce@example.com");

    let resp = notification_service::send_notification(
        &app.state,
        &auth_for(&admin),
        message(vec![ada.id, bounce.id, Uuid::new_v4()]),
    )
    .await?
    .into_data()
    .unwrap();
    assert_eq!(resp.sent, 1);
    assert_eq!(resp.skipped, 2);

    let sent = app.mailer.messages();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "ada@example.com");
    assert!(sent[0].html.contains("Two-for-one heroes"));
    Ok(())
}

#[tokio::test]
async fn repeated_user_ids_are_emailed_once() -> anyhow::Result<()> {
    let app = setup().await?;
    let admin = create_user(&app.state, "admin", "admin@example.com", 0).await?;
    let ada = create_user(&app.state, "customer", "ada@example.com", 0).await?;
    let missing = Uuid::new_v4();

    let resp = notification_service::send_notification(
        &app.state,
        &auth_for(&admin),
        message(vec![ada.id, ada.id, missing, ada.id, missing]),
    )
    .await?
    .into_data()
    .unwrap();
    assert_eq!(resp.sent, 1);
    assert_eq!(resp.skipped, 1);
    assert_eq!(app.mailer.messages().len(), 1);
    Ok(())
}

#[tokio::test]
async fn rejects_incomplete_or_unmatched_requests() -> anyhow::Result<()> {
    let app = setup().await?;
    let admin = create_user(&app.state, "admin", "admin@example.com", 0).await?;
    let ada = create_user(&app.state, "customer", "ada@example.com", 0).await?;
    let admin = auth_for(&admin);

    let mut blank_title = message(vec![ada.id]);
    blank_title.title = "   ".into();
    for req in [message(Vec::new()), blank_title] {
        let err = notification_service::send_notification(&app.state, &admin, req)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    let err = notification_service::send_notification(&app.state, &admin, message(vec![Uuid::new_v4()]))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));
    assert!(app.mailer.messages().is_empty());
    Ok(())
}

#[tokio::test]
async fn only_admins_send_notifications() -> anyhow::Result<()> {
    let app = setup().await?;
    let staff = create_user(&app.state, "staff", "staff@example.com", 0).await?;
    grant(&app.state, staff.id, "users").await?;
    let ada = create_user(&app.state, "customer", "ada@example.com", 0).await?;

    let err = notification_service::send_notification(&app.state, &auth_for(&staff), message(vec![ada.id]))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));
    Ok(())
}

#[tokio::test]
async fn order_activity_reaches_recent_feed_and_subscribers() -> anyhow::Result<()> {
    let app = setup().await?;
    let staff = create_user(&app.state, "staff", "kitchen@example.com", 0).await?;
    let customer = create_user(&app.state, "customer", "hungry@example.com", 0).await?;

    let err = notification_service::recent_order_notifications(&app.state, &auth_for(&staff))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));
    grant(&app.state, staff.id, "orders").await?;

    let mut rx = notification_service::subscribe_order_notifications(&app.state, &auth_for(&staff)).await?;
    let created = checkout_service::create_transaction(
        &app.state,
        CreateTransactionRequest {
            amount: Some(Decimal::from_str("8.25")?),
            reference_id: Some("REF-FEED".into()),
            cart_items: Vec::new(),
            user_id: Some(customer.id),
            gateway: None,
            return_to: None,
        },
    )
    .await?;

    let event = rx.recv().await?;
    assert_eq!(event.kind, OrderEventKind::Created);
    assert_eq!(event.order_number, created.order_number);

    let recent = notification_service::recent_order_notifications(&app.state, &auth_for(&staff))
        .await?;
    assert_eq!(recent.meta.as_ref().and_then(|m| m.total), Some(1));
    assert_eq!(recent.into_data().unwrap().items[0].order_number, created.order_number);
    Ok(())
}

#[tokio::test]
async fn notification_routes_require_a_valid_token() -> anyhow::Result<()> {
    let app = setup().await?;
    let admin = create_user(&app.state, "admin", "admin@example.com", 0).await?;
    let router = Router::new()
        .nest("/api", create_api_router())
        .with_state(app.state.clone());

    let anonymous = router
        .clone()
        .oneshot(Request::get("/api/admin/notifications/recent").body(Body::empty())?)
        .await?;
    assert_eq!(anonymous.status(), StatusCode::BAD_REQUEST);

    let token = issue_token(JWT_SECRET, admin.id, "admin")?;
    let authorized = router
        .oneshot(
            Request::get("/api/admin/notifications/recent")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(authorized.status(), StatusCode::OK);
    Ok(())
}
