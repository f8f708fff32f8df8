use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::promotions::{CreatePromotionRequest, PromotionList, UpdatePromotionRequest},
    entity::promotions::{ActiveModel, Column, Entity as Promotions},
    error::{AppError, AppResult},
    middleware::auth::{AdminModule, AuthUser, ensure_module},
    models::Promotion,
    response::{ApiResponse, Meta},
    routes::params::PromotionQuery,
    state::AppState,
};

pub async fn list_promotions(
    state: &AppState,
    query: PromotionQuery,
) -> AppResult<ApiResponse<PromotionList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut finder = Promotions::find().order_by_desc(Column::CreatedAt);
    if query.active_only {
        finder = finder.filter(Column::Active.eq(true));
    }

    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Promotion::from)
        .collect();

    Ok(ApiResponse::success(
        "Promotions",
        PromotionList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

pub async fn create_promotion(
    state: &AppState,
    user: &AuthUser,
    payload: CreatePromotionRequest,
) -> AppResult<ApiResponse<Promotion>> {
    ensure_module(state, user, AdminModule::Promotions).await?;
    let title = non_empty(&payload.title, "title")?;
    let image_url = image_url(&payload.image_url)?;

    let promotion = ActiveModel {
        id: Set(Uuid::new_v4()),
        title: Set(title),
        image_url: Set(image_url),
        active: Set(payload.active.unwrap_or(true)),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "promotion_create",
        "promotions",
        serde_json::json!({ "promotion_id": promotion.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Promotion created",
        promotion.into(),
        Some(Meta::empty()),
    ))
}

pub async fn update_promotion(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdatePromotionRequest,
) -> AppResult<ApiResponse<Promotion>> {
    ensure_module(state, user, AdminModule::Promotions).await?;
    let existing = Promotions::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: ActiveModel = existing.into();
    if let Some(title) = payload.title {
        active.title = Set(non_empty(&title, "title")?);
    }
    if let Some(url) = payload.image_url {
        active.image_url = Set(image_url(&url)?);
    }
    if let Some(flag) = payload.active {
        active.active = Set(flag);
    }
    let promotion = active.update(&state.orm).await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "promotion_update",
        "promotions",
        serde_json::json!({ "promotion_id": id, "active": promotion.active }),
    )
    .await;

    Ok(ApiResponse::success(
        "Updated",
        promotion.into(),
        Some(Meta::empty()),
    ))
}

pub async fn delete_promotion(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_module(state, user, AdminModule::Promotions).await?;
    let result = Promotions::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    audit::record(
        &state.orm,
        Some(user.user_id),
        "promotion_delete",
        "promotions",
        serde_json::json!({ "promotion_id": id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

fn non_empty(value: &str, field: &str) -> AppResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::BadRequest(format!("{field} is required")));
    }
    Ok(value.to_string())
}

fn image_url(raw: &str) -> AppResult<String> {
    let raw = non_empty(raw, "image_url")?;
    match reqwest::Url::parse(&raw) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(raw),
        _ => Err(AppError::BadRequest("image_url must be an http(s) URL".into())),
    }
}
