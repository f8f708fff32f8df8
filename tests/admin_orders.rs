mod common;

use std::str::FromStr;

use common::{TestApp, auth_for, create_product, create_user, setup};
use farmland_deli_api::{
    dto::{
        checkout::{CartItemInput, CreateTransactionRequest},
        orders::OrderList,
        users::UpdateUserRequest,
    },
    entity::users::Model as UserModel,
    error::AppError,
    models::OrderStatus,
    routes::params::OrderListQuery,
    services::{checkout_service, order_service, user_service},
};
use rust_decimal::Decimal;
use uuid::Uuid;

async fn customer_named(
    app: &TestApp,
    admin: &UserModel,
    email: &str,
    name: &str,
) -> anyhow::Result<UserModel> {
    let customer = create_user(&app.state, "customer", email, 0).await?;
    user_service::update_user(
        &app.state,
        &auth_for(admin),
        customer.id,
        UpdateUserRequest {
            name: Some(name.into()),
            email: None,
            phone: None,
        },
    )
    .await?;
    Ok(customer)
}

async fn checkout(
    app: &TestApp,
    reference_id: &str,
    amount: &str,
    user_id: Uuid,
    cart_items: Vec<CartItemInput>,
) -> anyhow::Result<String> {
    let created = checkout_service::create_transaction(
        &app.state,
        CreateTransactionRequest {
            amount: Some(Decimal::from_str(amount)?),
            reference_id: Some(reference_id.into()),
            cart_items,
            user_id: Some(user_id),
            gateway: None,
            return_to: None,
        },
    )
    .await?;
    Ok(created.order_number)
}

fn references(list: &OrderList) -> Vec<&str> {
    list.items.iter().map(|o| o.payment_reference.as_str()).collect()
}

#[tokio::test]
async fn order_list_filters_by_status_customer_and_search() -> anyhow::Result<()> {
    let app = setup().await?;
    let admin = create_user(&app.state, "admin", "admin@example.com", 0).await?;
    let staff = create_user(&app.state, "staff", "staff@example.com", 0).await?;
    let ada = customer_named(&app, &admin, "ada@example.com", "Ada Lovelace").await?;
    let grace = customer_named(&app, &admin, "grace@example.com", "Grace Hopper").await?;

    let ada_number = checkout(&app, "REF-ADA", "12.00", ada.id, Vec::new()).await?;
    checkout(&app, "REF-GRACE", "10.00", grace.id, Vec::new()).await?;
    app.gateway.capture();
    checkout_service::check_payment_status(&app.state, Some("REF-ADA")).await?;
    let auth = auth_for(&admin);

    let all = order_service::list_orders(&app.state, &auth, OrderListQuery::default()).await?;
    assert_eq!(all.meta.as_ref().and_then(|m| m.total), Some(2));

    let paid = order_service::list_orders(
        &app.state,
        &auth,
        OrderListQuery {
            status: Some(OrderStatus::Paid),
            ..Default::default()
        },
    )
    .await?
    .into_data()
    .unwrap();
    assert_eq!(references(&paid), vec!["REF-ADA"]);

    let pending = order_service::list_orders(
        &app.state,
        &auth,
        OrderListQuery {
            status: Some(OrderStatus::Pending),
            ..Default::default()
        },
    )
    .await?
    .into_data()
    .unwrap();
    assert_eq!(references(&pending), vec!["REF-GRACE"]);

    // Customer name comes from the joined user row.
    let by_name = order_service::list_orders(
        &app.state,
        &auth,
        OrderListQuery {
            q: Some("HOPPER".into()),
            ..Default::default()
        },
    )
    .await?
    .into_data()
    .unwrap();
    assert_eq!(references(&by_name), vec!["REF-GRACE"]);

    let suffix = ada_number.rsplit('-').next().unwrap_or_default().to_lowercase();
    let by_number = order_service::list_orders(
        &app.state,
        &auth,
        OrderListQuery {
            q: Some(suffix),
            ..Default::default()
        },
    )
    .await?
    .into_data()
    .unwrap();
    assert_eq!(references(&by_number), vec!["REF-ADA"]);

    let by_customer = order_service::list_orders(
        &app.state,
        &auth,
        OrderListQuery {
            user_id: Some(grace.id),
            ..Default::default()
        },
    )
    .await?
    .into_data()
    .unwrap();
    assert_eq!(references(&by_customer), vec!["REF-GRACE"]);

    let err = order_service::list_orders(&app.state, &auth_for(&staff), OrderListQuery::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));
    Ok(())
}

#[tokio::test]
async fn order_detail_lists_lines_with_subtotals() -> anyhow::Result<()> {
    let app = setup().await?;
    let admin = create_user(&app.state, "admin", "admin@example.com", 0).await?;
    let ada = customer_named(&app, &admin, "ada@example.com", "Ada Lovelace").await?;
    let club = create_product(&app.state, "Turkey Club", 1099, None).await?;
    let coffee = create_product(&app.state, "Cold Brew", 450, None).await?;

    checkout(
        &app,
        "REF-DETAIL",
        "26.48",
        ada.id,
        vec![
            CartItemInput {
                product_id: club.id.to_string(),
                quantity: 2,
            },
            CartItemInput {
                product_id: coffee.id.to_string(),
                quantity: 1,
            },
        ],
    )
    .await?;
    let order = checkout_service::find_by_reference(&app.state.orm, "REF-DETAIL")
        .await?
        .unwrap();

    let detail = order_service::get_order(&app.state, &auth_for(&admin), order.id)
        .await?
        .into_data()
        .unwrap();
    assert_eq!(detail.order.total, Decimal::from_str("26.48")?);
    assert_eq!(detail.order.status, OrderStatus::Pending);
    assert_eq!(detail.customer_name.as_deref(), Some("Ada Lovelace"));
    assert_eq!(detail.customer_email.as_deref(), Some("ada@example.com"));
    assert_eq!(detail.items.len(), 2);

    let club_line = detail
        .items
        .iter()
        .find(|line| line.product_id == club.id)
        .unwrap();
    assert_eq!(club_line.product_name.as_deref(), Some("Turkey Club"));
    assert_eq!(club_line.quantity, 2);
    assert_eq!(club_line.unit_price, Decimal::from_str("10.99")?);
    assert_eq!(club_line.subtotal, Decimal::from_str("21.98")?);
    assert_eq!(detail.items_total, Decimal::from_str("26.48")?);

    let err = order_service::get_order(&app.state, &auth_for(&admin), Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));
    Ok(())
}
