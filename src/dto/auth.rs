use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Self-service sign-up; accounts always start as customers.
#[derive(Deserialize, Debug, ToSchema)]
pub struct RegisterRequest {
    #[schema(example = "ada@example.com")]
    pub email: String,
    /// At least eight characters.
    pub password: String,
    #[schema(example = "Ada Lovelace")]
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "ada@example.com")]
    pub email: String,
    pub password: String,
}

/// Bearer token plus the role the dashboard uses to pick its menus.
#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    #[schema(example = "customer")]
    pub role: String,
}

/// JWT payload: `sub` is the user id.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub exp: usize,
}
