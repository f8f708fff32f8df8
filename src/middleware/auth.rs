use std::{fmt, str::FromStr};

use axum::{extract::FromRequestParts, http::header};
use jsonwebtoken::{DecodingKey, Validation, decode};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dto::auth::Claims,
    entity::user_permissions::{Column as PermCol, Entity as UserPermissions},
    error::AppError,
    state::AppState,
};

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_STAFF: &str = "staff";
pub const ROLE_CUSTOMER: &str = "customer";

pub const ROLES: [&str; 3] = [ROLE_ADMIN, ROLE_STAFF, ROLE_CUSTOMER];

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: String,
}

/// Dashboard sections a staff member can be granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AdminModule {
    Products,
    Categories,
    Orders,
    Promotions,
    Roles,
    Coupons,
    Users,
}

impl AdminModule {
    pub const ALL: [AdminModule; 7] = [
        AdminModule::Products,
        AdminModule::Categories,
        AdminModule::Orders,
        AdminModule::Promotions,
        AdminModule::Roles,
        AdminModule::Coupons,
        AdminModule::Users,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AdminModule::Products => "products",
            AdminModule::Categories => "categories",
            AdminModule::Orders => "orders",
            AdminModule::Promotions => "promotions",
            AdminModule::Roles => "roles",
            AdminModule::Coupons => "coupons",
            AdminModule::Users => "users",
        }
    }
}

impl fmt::Display for AdminModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdminModule {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AdminModule::ALL
            .into_iter()
            .find(|m| m.as_str() == s.trim())
            .ok_or_else(|| AppError::BadRequest(format!("Unknown module '{s}'")))
    }
}

pub fn ensure_role(user: &AuthUser, role: &str) -> Result<(), AppError> {
    if user.role != role {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

pub fn ensure_admin(user: &AuthUser) -> Result<(), AppError> {
    ensure_role(user, ROLE_ADMIN)
}

/// Admins reach every module; staff only the ones granted to them.
pub async fn ensure_module(
    state: &AppState,
    user: &AuthUser,
    module: AdminModule,
) -> Result<(), AppError> {
    if user.role == ROLE_ADMIN {
        return Ok(());
    }
    if user.role != ROLE_STAFF {
        return Err(AppError::Forbidden);
    }
    let granted = UserPermissions::find()
        .filter(PermCol::UserId.eq(user.user_id))
        .filter(PermCol::ModuleName.eq(module.as_str()))
        .count(&state.orm)
        .await?;
    if granted == 0 {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or_else(|| AppError::BadRequest("Missing Authorization header".into()))?;

        let auth_str = auth_header
            .to_str()
            .map_err(|_| AppError::BadRequest("Invalid Authorization header".into()))?;

        let token = auth_str
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::BadRequest("Invalid Authorization scheme".into()))?
            .trim();

        decode_token(token, &state.config.jwt_secret)
    }
}

pub fn decode_token(token: &str, secret: &str) -> Result<AuthUser, AppError> {
    let decoded = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::BadRequest("Invalid or expired token".into()))?;

    let user_id = Uuid::parse_str(&decoded.claims.sub)
        .map_err(|_| AppError::BadRequest("Invalid user id in token".into()))?;

    Ok(AuthUser {
        user_id,
        role: decoded.claims.role,
    })
}
