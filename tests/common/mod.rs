#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use chrono::Utc;
use farmland_deli_api::{
    config::{AppConfig, EmailConfig},
    entity::{
        AuditLogs, Categories, Coupons, OrderLineItems, Orders, Products, Promotions,
        UserPermissions, Users,
        categories::{ActiveModel as CategoryActive, Model as CategoryModel},
        products::{ActiveModel as ProductActive, Model as ProductModel},
        user_permissions::ActiveModel as PermissionActive,
        users::{ActiveModel as UserActive, Model as UserModel},
    },
    events::OrderEvents,
    mail::{EmailMessage, MailError, Mailer},
    middleware::auth::AuthUser,
    payments::{
        CallbackSigner, GatewayError, GatewayKind, GatewayPayment, GatewayRegistry,
        HostedCheckout, HostedCheckoutRequest, PaymentGateway, SandboxGateway, StatusLookup,
        TransactionStatus,
    },
    state::AppState,
};
use sea_orm::{
    ActiveModelTrait, ConnectOptions, ConnectionTrait, Database, DatabaseConnection, EntityTrait,
    Schema, Set,
};
use uuid::Uuid;

pub const CALLBACK_SECRET: &str = "test-callback-secret";
pub const JWT_SECRET: &str = "test-jwt-secret";
pub const SITE_URL: &str = "https://deli.example.com";
pub const APP_SCHEME: &str = "farmlanddeli";

#[derive(Debug, Clone)]
enum Outcome {
    Pending,
    Paid,
    Declined(String),
    Unavailable(String),
}

/// Gateway double. The payment it reports for the order being looked up
/// follows the outcome the test sets; ids registered with `file_payment`
/// answer with that payment instead, like a real gateway would.
pub struct FakeGateway {
    kind: GatewayKind,
    outcome: Mutex<Outcome>,
    filed: Mutex<HashMap<String, GatewayPayment>>,
    checkout_delay: Mutex<Duration>,
    pub lookups: Mutex<Vec<String>>,
}

impl FakeGateway {
    pub fn new(kind: GatewayKind) -> Arc<Self> {
        Arc::new(Self {
            kind,
            outcome: Mutex::new(Outcome::Pending),
            filed: Mutex::new(HashMap::new()),
            checkout_delay: Mutex::new(Duration::ZERO),
            lookups: Mutex::new(Vec::new()),
        })
    }

    pub fn capture(&self) {
        *self.outcome.lock().unwrap() = Outcome::Paid;
    }

    pub fn decline(&self, reason: &str) {
        *self.outcome.lock().unwrap() = Outcome::Declined(reason.to_string());
    }

    /// Makes `create_checkout` take a while, so concurrent checkouts overlap.
    pub fn slow_checkouts(&self, delay: Duration) {
        *self.checkout_delay.lock().unwrap() = delay;
    }

    pub fn fail_lookups(&self, reason: &str) {
        *self.outcome.lock().unwrap() = Outcome::Unavailable(reason.to_string());
    }

    /// A captured payment the gateway holds under `transaction_id`.
    pub fn file_payment(&self, transaction_id: &str, reference: &str, amount_cents: i64) {
        self.filed.lock().unwrap().insert(
            transaction_id.to_string(),
            GatewayPayment {
                transaction_id: Some(transaction_id.to_string()),
                reference: Some(reference.to_string()),
                amount_cents: Some(amount_cents),
            },
        );
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.lock().unwrap().len()
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    fn kind(&self) -> GatewayKind {
        self.kind
    }

    async fn create_checkout(
        &self,
        request: &HostedCheckoutRequest,
    ) -> Result<HostedCheckout, GatewayError> {
        let delay = *self.checkout_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(HostedCheckout {
            checkout_id: format!("fake-{}", request.reference_id),
            checkout_url: format!("https://pay.example.com/{}", request.reference_id),
        })
    }

    async fn transaction_status(
        &self,
        lookup: &StatusLookup<'_>,
    ) -> Result<TransactionStatus, GatewayError> {
        self.lookups
            .lock()
            .unwrap()
            .push(lookup.reference_id.to_string());

        if let Some(filed) = lookup
            .transaction_id
            .and_then(|id| self.filed.lock().unwrap().get(id).cloned())
        {
            return Ok(TransactionStatus::Captured(filed));
        }

        let payment = GatewayPayment {
            transaction_id: Some(
                lookup
                    .transaction_id
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("fake-{}", lookup.reference_id)),
            ),
            reference: Some(lookup.reference_id.to_string()),
            amount_cents: Some(lookup.amount_cents),
        };
        let outcome = self.outcome.lock().unwrap().clone();
        match outcome {
            Outcome::Pending => Ok(TransactionStatus::Pending),
            Outcome::Paid => Ok(TransactionStatus::Captured(payment)),
            Outcome::Declined(reason) => Ok(TransactionStatus::Declined { payment, reason }),
            Outcome::Unavailable(reason) => Err(GatewayError::Rejected(reason)),
        }
    }
}

#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<EmailMessage>>,
    pub fail_for: Mutex<Vec<String>>,
}

impl RecordingMailer {
    pub fn messages(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn reject(&self, address: &str) {
        self.fail_for.lock().unwrap().push(address.to_string());
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), MailError> {
        if self.fail_for.lock().unwrap().contains(&message.to) {
            return Err(MailError::Rejected {
                status: 422,
                body: "invalid recipient".into(),
            });
        }
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}

pub struct TestApp {
    pub state: AppState,
    pub gateway: Arc<FakeGateway>,
    pub mailer: Arc<RecordingMailer>,
}

pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".into(),
        host: "127.0.0.1".into(),
        port: 3000,
        jwt_secret: JWT_SECRET.into(),
        public_url: "http://localhost:3000".into(),
        site_url: SITE_URL.into(),
        app_deep_link_scheme: APP_SCHEME.into(),
        callback_secret: CALLBACK_SECRET.into(),
        allowed_origins: Vec::new(),
        default_gateway: GatewayKind::Clover,
        authorize_net: None,
        clover: None,
        sandbox: None,
        email: EmailConfig {
            resend_api_key: None,
            resend_api_url: "http://localhost:9".into(),
            from: "Farmland Deli <test@farmlanddeli.com>".into(),
        },
    }
}

/// In-memory SQLite with the full schema, a controllable Clover stand-in as
/// the default gateway and an instant sandbox gateway.
pub async fn setup() -> anyhow::Result<TestApp> {
    let gateway = FakeGateway::new(GatewayKind::Clover);
    let mailer = Arc::new(RecordingMailer::default());
    let state = state_with(
        vec![
            gateway.clone() as Arc<dyn PaymentGateway>,
            Arc::new(SandboxGateway::new(Duration::ZERO)),
        ],
        mailer.clone(),
    )
    .await?;

    Ok(TestApp {
        state,
        gateway,
        mailer,
    })
}

/// State over a fresh database with the given gateways; the first one is the
/// default.
pub async fn state_with(
    gateways: Vec<Arc<dyn PaymentGateway>>,
    mailer: Arc<dyn Mailer>,
) -> anyhow::Result<AppState> {
    let default_kind = gateways
        .first()
        .map(|g| g.kind())
        .unwrap_or(GatewayKind::Sandbox);
    let mut registry = GatewayRegistry::new(default_kind);
    for gateway in gateways {
        registry.register(gateway);
    }

    Ok(AppState {
        orm: memory_db().await?,
        config: Arc::new(test_config()),
        gateways: registry,
        signer: CallbackSigner::new(CALLBACK_SECRET),
        mailer,
        events: OrderEvents::new(),
    })
}

async fn memory_db() -> anyhow::Result<DatabaseConnection> {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let db = Database::connect(options).await?;

    let backend = db.get_database_backend();
    let schema = Schema::new(backend);
    // Parents before children.
    db.execute(backend.build(&schema.create_table_from_entity(Users)))
        .await?;
    db.execute(backend.build(&schema.create_table_from_entity(UserPermissions)))
        .await?;
    db.execute(backend.build(&schema.create_table_from_entity(Categories)))
        .await?;
    db.execute(backend.build(&schema.create_table_from_entity(Products)))
        .await?;
    db.execute(backend.build(&schema.create_table_from_entity(Orders)))
        .await?;
    db.execute(backend.build(&schema.create_table_from_entity(OrderLineItems)))
        .await?;
    db.execute(backend.build(&schema.create_table_from_entity(Coupons)))
        .await?;
    db.execute(backend.build(&schema.create_table_from_entity(Promotions)))
        .await?;
    db.execute(backend.build(&schema.create_table_from_entity(AuditLogs)))
        .await?;
    Ok(db)
}

pub async fn create_user(
    state: &AppState,
    role: &str,
    email: &str,
    points: i32,
) -> anyhow::Result<UserModel> {
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        email: Set(email.to_string()),
        name: Set(format!("Test {role}")),
        phone: Set(None),
        password_hash: Set("not-a-real-hash".into()),
        role: Set(role.to_string()),
        points: Set(points),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await?;
    Ok(user)
}

pub async fn grant(state: &AppState, user_id: Uuid, module: &str) -> anyhow::Result<()> {
    PermissionActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        module_name: Set(module.to_string()),
    }
    .insert(&state.orm)
    .await?;
    Ok(())
}

pub async fn create_category(state: &AppState, name: &str) -> anyhow::Result<CategoryModel> {
    let category = CategoryActive {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await?;
    Ok(category)
}

pub async fn create_product(
    state: &AppState,
    name: &str,
    price_cents: i64,
    category_id: Option<Uuid>,
) -> anyhow::Result<ProductModel> {
    let product = ProductActive {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        description: Set(None),
        price: Set(price_cents),
        category_id: Set(category_id),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await?;
    Ok(product)
}

pub async fn user_points(state: &AppState, id: Uuid) -> anyhow::Result<i32> {
    let user = Users::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| anyhow::anyhow!("user {id} missing"))?;
    Ok(user.points)
}

pub fn auth_for(user: &UserModel) -> AuthUser {
    AuthUser {
        user_id: user.id,
        role: user.role.clone(),
    }
}
