use axum::Router;

use crate::{
    routes::{categories, coupons, notifications, orders, products, promotions, users},
    state::AppState,
};

/// Everything under `/api/admin`. Authorization happens per operation in the
/// services (admin, or staff holding the module).
pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/products", products::admin_router())
        .nest("/categories", categories::admin_router())
        .nest("/promotions", promotions::admin_router())
        .nest("/coupons", coupons::router())
        .nest("/orders", orders::router())
        .nest("/users", users::router())
        .nest("/roles", users::roles_router())
        .nest("/notifications", notifications::admin_router())
}
