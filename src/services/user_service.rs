use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
    sea_query::{Expr, Query},
};
use uuid::Uuid;

use crate::{
    audit,
    dto::users::{RedeemPointsRequest, RedeemPointsResponse, UpdateUserRequest, UserList},
    entity::{
        orders::{Column as OrderCol, Entity as Orders},
        users::{ActiveModel, Column, Entity as Users, Model as UserModel},
    },
    error::{AppError, AppResult},
    mail,
    middleware::auth::{AdminModule, AuthUser, ensure_module},
    models::User,
    response::{ApiResponse, Meta},
    routes::params::{SearchQuery, like_pattern},
    services::{auth_service::normalize_email, contains_ci},
    state::AppState,
};

/// `q` matches name, email, or the number of any order the user placed.
pub async fn list_users(
    state: &AppState,
    user: &AuthUser,
    query: SearchQuery,
) -> AppResult<ApiResponse<UserList>> {
    ensure_module(state, user, AdminModule::Users).await?;
    let (page, limit, offset) = query.pagination().normalize();

    let mut condition = Condition::all();
    if let Some(pattern) = like_pattern(query.q.as_deref()) {
        let with_matching_order = Query::select()
            .column(OrderCol::UserId)
            .from(Orders)
            .and_where(contains_ci((Orders, OrderCol::OrderNumber), &pattern))
            .to_owned();
        condition = condition.add(
            Condition::any()
                .add(contains_ci((Users, Column::Name), &pattern))
                .add(contains_ci((Users, Column::Email), &pattern))
                .add(Column::Id.in_subquery(with_matching_order)),
        );
    }

    let finder = Users::find()
        .filter(condition)
        .order_by_desc(Column::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(User::from)
        .collect();

    Ok(ApiResponse::success(
        "Users",
        UserList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

pub async fn get_user(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<User>> {
    ensure_module(state, user, AdminModule::Users).await?;
    let found = find_user(state, id).await?;
    Ok(ApiResponse::success("User", found.into(), None))
}

pub async fn update_user(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateUserRequest,
) -> AppResult<ApiResponse<User>> {
    ensure_module(state, user, AdminModule::Users).await?;
    let existing = find_user(state, id).await?;

    let mut active: ActiveModel = existing.into();
    if let Some(name) = payload.name {
        active.name = Set(name.trim().to_string());
    }
    if let Some(email) = payload.email {
        let email = normalize_email(&email);
        if !email.contains('@') {
            return Err(AppError::BadRequest("A valid email is required".into()));
        }
        let taken = Users::find()
            .filter(Column::Email.eq(email.as_str()))
            .filter(Column::Id.ne(id))
            .count(&state.orm)
            .await?;
        if taken > 0 {
            return Err(AppError::Conflict("Email is already taken".into()));
        }
        active.email = Set(email);
    }
    if let Some(phone) = payload.phone {
        let phone = phone.trim().to_string();
        active.phone = Set(Some(phone).filter(|p| !p.is_empty()));
    }
    let updated = active.update(&state.orm).await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "user_update",
        "users",
        serde_json::json!({ "user_id": id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Updated",
        updated.into(),
        Some(Meta::empty()),
    ))
}

/// Debits loyalty points. The balance can never go below zero: the debit is
/// a single `points = points - n WHERE points >= n` update.
pub async fn redeem_points(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: RedeemPointsRequest,
) -> AppResult<ApiResponse<RedeemPointsResponse>> {
    ensure_module(state, user, AdminModule::Users).await?;
    let points = payload.points;
    if points <= 0 {
        return Err(AppError::BadRequest("points must be greater than 0".into()));
    }

    let customer = find_user(state, id).await?;
    if points > customer.points {
        return Err(AppError::BadRequest(format!(
            "Insufficient points: balance is {}",
            customer.points
        )));
    }

    let result = Users::update_many()
        .col_expr(Column::Points, Expr::col(Column::Points).sub(points))
        .filter(Column::Id.eq(id))
        .filter(Column::Points.gte(points))
        .exec(&state.orm)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::BadRequest("Insufficient points".into()));
    }

    let customer = find_user(state, id).await?;
    tracing::info!(user_id = %id, redeemed = points, remaining = customer.points, "points redeemed");
    audit::record(
        &state.orm,
        Some(user.user_id),
        "points_redeem",
        "users",
        serde_json::json!({ "user_id": id, "points": points }),
    )
    .await;

    let email = mail::redemption_email(&customer.email, &customer.name, points, customer.points);
    if let Err(err) = state.mailer.send(email).await {
        tracing::warn!(user_id = %id, error = %err, "redemption email failed");
    }

    Ok(ApiResponse::success(
        "Points redeemed",
        RedeemPointsResponse {
            user_id: id,
            redeemed: points,
            remaining: customer.points,
        },
        Some(Meta::empty()),
    ))
}

async fn find_user(state: &AppState, id: Uuid) -> AppResult<UserModel> {
    Users::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)
}
