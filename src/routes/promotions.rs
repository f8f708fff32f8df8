use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch},
};
use uuid::Uuid;

use crate::{
    dto::promotions::{CreatePromotionRequest, PromotionList, UpdatePromotionRequest},
    error::AppResult,
    middleware::auth::{AdminModule, AuthUser, ensure_module},
    models::Promotion,
    response::ApiResponse,
    routes::params::PromotionQuery,
    services::promotion_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_active_promotions))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_promotions).post(create_promotion))
        .route("/{id}", patch(update_promotion).delete(delete_promotion))
}

#[utoipa::path(
    get,
    path = "/api/promotions",
    params(PromotionQuery),
    responses(
        (status = 200, description = "Active promotions", body = ApiResponse<PromotionList>)
    ),
    tag = "Promotions"
)]
pub async fn list_active_promotions(
    State(state): State<AppState>,
    Query(mut query): Query<PromotionQuery>,
) -> AppResult<Json<ApiResponse<PromotionList>>> {
    query.active_only = true;
    Ok(Json(promotion_service::list_promotions(&state, query).await?))
}

#[utoipa::path(
    get,
    path = "/api/admin/promotions",
    params(PromotionQuery),
    responses(
        (status = 200, description = "All promotions", body = ApiResponse<PromotionList>),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Promotions"
)]
pub async fn list_promotions(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<PromotionQuery>,
) -> AppResult<Json<ApiResponse<PromotionList>>> {
    ensure_module(&state, &user, AdminModule::Promotions).await?;
    Ok(Json(promotion_service::list_promotions(&state, query).await?))
}

#[utoipa::path(
    post,
    path = "/api/admin/promotions",
    request_body = CreatePromotionRequest,
    responses(
        (status = 201, description = "Create promotion", body = ApiResponse<Promotion>),
        (status = 400, description = "Missing title or bad image URL"),
    ),
    security(("bearer_auth" = [])),
    tag = "Promotions"
)]
pub async fn create_promotion(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreatePromotionRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Promotion>>)> {
    let resp = promotion_service::create_promotion(&state, &user, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    patch,
    path = "/api/admin/promotions/{id}",
    params(("id" = Uuid, Path, description = "Promotion ID")),
    request_body = UpdatePromotionRequest,
    responses(
        (status = 200, description = "Updated promotion", body = ApiResponse<Promotion>),
        (status = 404, description = "Promotion not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Promotions"
)]
pub async fn update_promotion(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePromotionRequest>,
) -> AppResult<Json<ApiResponse<Promotion>>> {
    let resp = promotion_service::update_promotion(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/admin/promotions/{id}",
    params(("id" = Uuid, Path, description = "Promotion ID")),
    responses(
        (status = 200, description = "Deleted promotion"),
        (status = 404, description = "Promotion not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Promotions"
)]
pub async fn delete_promotion(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = promotion_service::delete_promotion(&state, &user, id).await?;
    Ok(Json(resp))
}
