pub mod audit_logs;
pub mod categories;
pub mod coupons;
pub mod order_line_items;
pub mod orders;
pub mod products;
pub mod promotions;
pub mod user_permissions;
pub mod users;

pub use audit_logs::Entity as AuditLogs;
pub use categories::Entity as Categories;
pub use coupons::Entity as Coupons;
pub use order_line_items::Entity as OrderLineItems;
pub use orders::Entity as Orders;
pub use products::Entity as Products;
pub use promotions::Entity as Promotions;
pub use user_permissions::Entity as UserPermissions;
pub use users::Entity as Users;
