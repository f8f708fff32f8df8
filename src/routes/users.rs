use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post, put},
};
use uuid::Uuid;

use crate::{
    dto::users::{
        RedeemPointsRequest, RedeemPointsResponse, UpdateRoleRequest, UpdateUserRequest,
        UserList, UserRole, UserRoleList,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::User,
    response::ApiResponse,
    routes::params::SearchQuery,
    services::{role_service, user_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users))
        .route("/{id}", get(get_user).patch(update_user))
        .route("/{id}/redeem", post(redeem_points))
}

pub fn roles_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_roles))
        .route("/{id}", put(update_role))
}

#[utoipa::path(
    get,
    path = "/api/admin/users",
    params(SearchQuery),
    responses(
        (status = 200, description = "Search users by name, email or order number", body = ApiResponse<UserList>),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn list_users(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<ApiResponse<UserList>>> {
    Ok(Json(user_service::list_users(&state, &user, query).await?))
}

#[utoipa::path(
    get,
    path = "/api/admin/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Get user", body = ApiResponse<User>),
        (status = 404, description = "User not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn get_user(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<User>>> {
    Ok(Json(user_service::get_user(&state, &user, id).await?))
}

#[utoipa::path(
    patch,
    path = "/api/admin/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated user", body = ApiResponse<User>),
        (status = 409, description = "Email already taken"),
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn update_user(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> AppResult<Json<ApiResponse<User>>> {
    Ok(Json(
        user_service::update_user(&state, &user, id, payload).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/api/admin/users/{id}/redeem",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = RedeemPointsRequest,
    responses(
        (status = 200, description = "Points debited", body = ApiResponse<RedeemPointsResponse>),
        (status = 400, description = "Non-positive amount or insufficient balance"),
        (status = 404, description = "User not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn redeem_points(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<RedeemPointsRequest>,
) -> AppResult<Json<ApiResponse<RedeemPointsResponse>>> {
    Ok(Json(
        user_service::redeem_points(&state, &user, id, payload).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/admin/roles",
    params(SearchQuery),
    responses(
        (status = 200, description = "Dashboard users and their permissions", body = ApiResponse<UserRoleList>),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Roles"
)]
pub async fn list_roles(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<ApiResponse<UserRoleList>>> {
    Ok(Json(role_service::list_roles(&state, &user, query).await?))
}

#[utoipa::path(
    put,
    path = "/api/admin/roles/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateRoleRequest,
    responses(
        (status = 200, description = "Role and permissions replaced", body = ApiResponse<UserRole>),
        (status = 400, description = "Unknown role or module"),
        (status = 404, description = "User not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Roles"
)]
pub async fn update_role(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateRoleRequest>,
) -> AppResult<Json<ApiResponse<UserRole>>> {
    Ok(Json(
        role_service::update_role(&state, &user, id, payload).await?,
    ))
}
