use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::{LoginRequest, LoginResponse, RegisterRequest},
        catalog::{CategoryList, CategoryRequest, CreateProductRequest, ProductList, UpdateProductRequest},
        checkout::{
            CartItemInput, CreateTransactionRequest, CreateTransactionResponse,
            PaymentStatusResponse,
        },
        coupons::{CouponList, CreateCouponRequest, UpdateCouponRequest},
        notifications::{RecentNotifications, SendNotificationRequest, SendNotificationResponse},
        orders::{OrderDetail, OrderLineDetail, OrderList},
        promotions::{CreatePromotionRequest, PromotionList, UpdatePromotionRequest},
        users::{
            RedeemPointsRequest, RedeemPointsResponse, UpdateRoleRequest, UpdateUserRequest,
            UserList, UserRole, UserRoleList,
        },
    },
    events::{OrderEventKind, OrderNotification},
    middleware::auth::AdminModule,
    models::{Category, Coupon, CouponStatus, Order, OrderLineItem, OrderStatus, Product, Promotion, User},
    payments::{GatewayKind, ReturnTarget},
    response::{ApiResponse, Meta},
    routes::{
        auth, categories, checkout, coupons, health, notifications, orders, products, promotions,
        users,
    },
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::login,
        auth::register,
        products::list_products,
        products::get_product,
        products::create_product,
        products::update_product,
        products::delete_product,
        categories::list_categories,
        categories::get_category,
        categories::create_category,
        categories::update_category,
        categories::delete_category,
        promotions::list_active_promotions,
        promotions::list_promotions,
        promotions::create_promotion,
        promotions::update_promotion,
        promotions::delete_promotion,
        coupons::list_coupons,
        coupons::get_coupon,
        coupons::create_coupon,
        coupons::update_coupon,
        coupons::delete_coupon,
        coupons::redeem_coupon,
        orders::list_orders,
        orders::get_order,
        orders::mark_ready_for_pickup,
        orders::mark_delivered,
        users::list_users,
        users::get_user,
        users::update_user,
        users::redeem_points,
        users::list_roles,
        users::update_role,
        checkout::create_transaction,
        checkout::check_payment_status,
        checkout::verify_payment,
        checkout::gateway_redirect,
        notifications::send_notification,
        notifications::recent_notifications,
        notifications::stream_notifications
    ),
    components(
        schemas(
            User,
            Category,
            Product,
            Order,
            OrderLineItem,
            OrderStatus,
            Coupon,
            CouponStatus,
            Promotion,
            AdminModule,
            GatewayKind,
            ReturnTarget,
            OrderEventKind,
            OrderNotification,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            CreateProductRequest,
            UpdateProductRequest,
            ProductList,
            CategoryRequest,
            CategoryList,
            CartItemInput,
            CreateTransactionRequest,
            CreateTransactionResponse,
            PaymentStatusResponse,
            CreateCouponRequest,
            UpdateCouponRequest,
            CouponList,
            CreatePromotionRequest,
            UpdatePromotionRequest,
            PromotionList,
            OrderList,
            OrderDetail,
            OrderLineDetail,
            UpdateUserRequest,
            UserList,
            RedeemPointsRequest,
            RedeemPointsResponse,
            UserRole,
            UserRoleList,
            UpdateRoleRequest,
            SendNotificationRequest,
            SendNotificationResponse,
            RecentNotifications,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<OrderDetail>,
            ApiResponse<OrderList>,
            ApiResponse<User>
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Products", description = "Menu products"),
        (name = "Categories", description = "Menu categories"),
        (name = "Promotions", description = "Promotional banners"),
        (name = "Coupons", description = "Reward coupons"),
        (name = "Orders", description = "Order administration"),
        (name = "Users", description = "Customers and loyalty points"),
        (name = "Roles", description = "Dashboard roles and permissions"),
        (name = "Checkout", description = "Hosted checkout and payment reconciliation"),
        (name = "Notifications", description = "Customer email and live order notifications"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
