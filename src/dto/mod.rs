pub mod auth;
pub mod catalog;
pub mod checkout;
pub mod coupons;
pub mod notifications;
pub mod orders;
pub mod promotions;
pub mod users;
