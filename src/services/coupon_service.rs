use chrono::Utc;
use sea_orm::{
    ActiveEnum, ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, sea_query::Expr,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::coupons::{CouponList, CreateCouponRequest, UpdateCouponRequest},
    entity::{
        coupons::{ActiveModel, Column, Entity as Coupons, Model as CouponModel},
        users::Entity as Users,
    },
    error::{AppError, AppResult},
    middleware::auth::{AdminModule, AuthUser, ensure_module},
    models::{Coupon, CouponStatus},
    response::{ApiResponse, Meta},
    routes::params::{CouponQuery, like_pattern},
    services::contains_ci,
    state::AppState,
};

pub async fn list_coupons(
    state: &AppState,
    user: &AuthUser,
    query: CouponQuery,
) -> AppResult<ApiResponse<CouponList>> {
    ensure_module(state, user, AdminModule::Coupons).await?;
    let (page, limit, offset) = query.pagination().normalize();

    let mut condition = Condition::all();
    if let Some(status) = query.status {
        condition = condition.add(Column::Status.eq(status.to_value()));
    }
    if let Some(user_id) = query.user_id {
        condition = condition.add(Column::UserId.eq(user_id));
    }
    if let Some(pattern) = like_pattern(query.q.as_deref()) {
        condition = condition.add(
            Condition::any()
                .add(contains_ci((Coupons, Column::CouponCode), &pattern))
                .add(contains_ci((Coupons, Column::RewardTitle), &pattern)),
        );
    }

    let finder = Coupons::find()
        .filter(condition)
        .order_by_desc(Column::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Coupon::from)
        .collect();

    Ok(ApiResponse::success(
        "Coupons",
        CouponList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

pub async fn get_coupon(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Coupon>> {
    ensure_module(state, user, AdminModule::Coupons).await?;
    let coupon = find_coupon(state, id).await?;
    Ok(ApiResponse::success("Coupon", coupon.into(), None))
}

pub async fn create_coupon(
    state: &AppState,
    user: &AuthUser,
    payload: CreateCouponRequest,
) -> AppResult<ApiResponse<Coupon>> {
    ensure_module(state, user, AdminModule::Coupons).await?;

    let reward_title = payload.reward_title.trim().to_string();
    if reward_title.is_empty() {
        return Err(AppError::BadRequest("reward_title is required".into()));
    }
    if payload.points_used < 0 {
        return Err(AppError::BadRequest("points_used cannot be negative".into()));
    }
    Users::find_by_id(payload.user_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::BadRequest("Unknown user".into()))?;

    let coupon_code = match payload.coupon_code.map(|c| c.trim().to_uppercase()) {
        Some(code) if !code.is_empty() => code,
        _ => generate_coupon_code(),
    };
    let taken = Coupons::find()
        .filter(Column::CouponCode.eq(coupon_code.as_str()))
        .count(&state.orm)
        .await?;
    if taken > 0 {
        return Err(AppError::Conflict(format!(
            "Coupon code {coupon_code} already exists"
        )));
    }

    let now = Utc::now();
    let coupon = ActiveModel {
        id: Set(Uuid::new_v4()),
        coupon_code: Set(coupon_code),
        order_number: Set(payload.order_number.filter(|n| !n.trim().is_empty())),
        user_id: Set(payload.user_id),
        reward_title: Set(reward_title),
        reward_description: Set(payload.reward_description),
        points_used: Set(payload.points_used),
        status: Set(CouponStatus::Active),
        expiration_date: Set(payload.expiration_date.fixed_offset()),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&state.orm)
    .await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "coupon_create",
        "coupons",
        serde_json::json!({ "coupon_id": coupon.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Coupon created",
        coupon.into(),
        Some(Meta::empty()),
    ))
}

pub async fn update_coupon(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateCouponRequest,
) -> AppResult<ApiResponse<Coupon>> {
    ensure_module(state, user, AdminModule::Coupons).await?;
    let existing = find_coupon(state, id).await?;

    let mut active: ActiveModel = existing.into();
    if let Some(title) = payload.reward_title {
        let title = title.trim().to_string();
        if title.is_empty() {
            return Err(AppError::BadRequest("reward_title cannot be empty".into()));
        }
        active.reward_title = Set(title);
    }
    if let Some(description) = payload.reward_description {
        active.reward_description = Set(Some(description));
    }
    if let Some(status) = payload.status {
        active.status = Set(status);
    }
    if let Some(expiration) = payload.expiration_date {
        active.expiration_date = Set(expiration.fixed_offset());
    }
    active.updated_at = Set(Utc::now().into());

    let coupon = active.update(&state.orm).await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "coupon_update",
        "coupons",
        serde_json::json!({ "coupon_id": id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Updated",
        coupon.into(),
        Some(Meta::empty()),
    ))
}

pub async fn delete_coupon(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_module(state, user, AdminModule::Coupons).await?;
    let result = Coupons::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    audit::record(
        &state.orm,
        Some(user.user_id),
        "coupon_delete",
        "coupons",
        serde_json::json!({ "coupon_id": id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

/// Marks an active, unexpired coupon as used. A coupon found past its
/// expiration date is flipped to expired instead.
pub async fn redeem_coupon(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Coupon>> {
    ensure_module(state, user, AdminModule::Coupons).await?;
    let coupon = find_coupon(state, id).await?;

    if coupon.status != CouponStatus::Active {
        return Err(AppError::BadRequest(format!(
            "Coupon is already {}",
            coupon.status.to_value()
        )));
    }

    let expired = coupon.expiration_date.with_timezone(&Utc) <= Utc::now();
    let next = if expired {
        CouponStatus::Expired
    } else {
        CouponStatus::Used
    };

    let result = Coupons::update_many()
        .col_expr(Column::Status, Expr::value(next.to_value()))
        .col_expr(Column::UpdatedAt, Expr::value(Utc::now().fixed_offset()))
        .filter(Column::Id.eq(id))
        .filter(Column::Status.eq(CouponStatus::Active.to_value()))
        .exec(&state.orm)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::BadRequest("Coupon is no longer active".into()));
    }
    if expired {
        return Err(AppError::BadRequest("Coupon has expired".into()));
    }

    audit::record(
        &state.orm,
        Some(user.user_id),
        "coupon_redeem",
        "coupons",
        serde_json::json!({ "coupon_id": id, "coupon_code": coupon.coupon_code }),
    )
    .await;

    let coupon = find_coupon(state, id).await?;
    Ok(ApiResponse::success(
        "Coupon redeemed",
        coupon.into(),
        Some(Meta::empty()),
    ))
}

async fn find_coupon(state: &AppState, id: Uuid) -> AppResult<CouponModel> {
    Coupons::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)
}

/// `FLD-` plus ten uppercase hex characters.
pub fn generate_coupon_code() -> String {
    let raw: String = Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(10)
        .collect();
    format!("FLD-{}", raw.to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::generate_coupon_code;

    #[test]
    fn coupon_codes_have_prefix() {
        let code = generate_coupon_code();
        assert!(code.starts_with("FLD-"));
        assert_eq!(code.len(), 14);
        assert_eq!(code, code.to_uppercase());
    }
}
