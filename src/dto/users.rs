use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::User;

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct UserList {
    #[schema(value_type = Vec<User>)]
    pub items: Vec<User>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RedeemPointsRequest {
    pub points: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RedeemPointsResponse {
    pub user_id: Uuid,
    pub redeemed: i32,
    pub remaining: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserRole {
    pub user: User,
    pub permissions: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct UserRoleList {
    #[schema(value_type = Vec<UserRole>)]
    pub items: Vec<UserRole>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateRoleRequest {
    pub role: String,
    #[serde(default)]
    pub permissions: Vec<String>,
}
