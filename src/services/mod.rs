pub mod auth_service;
pub mod category_service;
pub mod checkout_service;
pub mod coupon_service;
pub mod notification_service;
pub mod order_service;
pub mod product_service;
pub mod promotion_service;
pub mod role_service;
pub mod user_service;

use sea_orm::sea_query::{Expr, Func, IntoColumnRef, SimpleExpr};

/// `lower(col) LIKE pattern`; `pattern` comes from `params::like_pattern`.
pub(crate) fn contains_ci<C: IntoColumnRef>(col: C, pattern: &str) -> SimpleExpr {
    Expr::expr(Func::lower(Expr::col(col))).like(pattern)
}
