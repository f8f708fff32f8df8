use farmland_deli_api::{
    config::AppConfig,
    db::{create_orm_conn, create_pool, run_migrations},
    services::auth_service::hash_password,
};
use uuid::Uuid;

const MENU: &[(&str, &[(&str, &str, i64)])] = &[
    (
        "Sandwiches",
        &[
            ("Turkey Club", "Roast turkey, bacon, lettuce and tomato on toasted sourdough", 1099),
            ("Italian Hero", "Salami, capicola, provolone and peppers on a seeded roll", 1249),
            ("Chopped Cheese", "Griddled beef, onions and melted cheese on a hero", 999),
        ],
    ),
    (
        "Breakfast",
        &[
            ("Bacon Egg & Cheese", "Two eggs, bacon and american cheese on a kaiser roll", 649),
            ("Everything Bagel", "Toasted with cream cheese", 375),
        ],
    ),
    (
        "Drinks",
        &[
            ("Cold Brew", "16oz house cold brew", 450),
            ("Fresh Orange Juice", "Squeezed to order", 525),
        ],
    ),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().with_target(false).init();

    let config = AppConfig::from_env()?;
    let orm = create_orm_conn(&config.database_url).await?;
    run_migrations(&orm).await?;

    let pool = create_pool(&config.database_url).await?;
    let admin_id = ensure_user(&pool, "admin@farmlanddeli.com", "Deli Admin", "admin12345", "admin", 0).await?;
    let staff_id = ensure_user(&pool, "staff@farmlanddeli.com", "Counter Staff", "staff12345", "staff", 0).await?;
    grant(&pool, staff_id, &["orders", "coupons"]).await?;
    let customer_id =
        ensure_user(&pool, "customer@example.com", "Sample Customer", "customer123", "customer", 25).await?;
    seed_menu(&pool).await?;

    tracing::info!(%admin_id, %staff_id, %customer_id, "seed completed");
    Ok(())
}

async fn ensure_user(
    pool: &sqlx::PgPool,
    email: &str,
    name: &str,
    password: &str,
    role: &str,
    points: i32,
) -> anyhow::Result<Uuid> {
    let password_hash = hash_password(password)?;

    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, name, password_hash, role, points)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role, name = EXCLUDED.name
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(name)
    .bind(password_hash)
    .bind(role)
    .bind(points)
    .fetch_one(pool)
    .await?;

    tracing::info!(email, role, "ensured user");
    Ok(id)
}

async fn grant(pool: &sqlx::PgPool, user_id: Uuid, modules: &[&str]) -> anyhow::Result<()> {
    for module in modules {
        sqlx::query(
            r#"
            INSERT INTO user_permissions (id, user_id, module_name)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, module_name) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(module)
        .execute(pool)
        .await?;
    }
    Ok(())
}

async fn seed_menu(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    for (category, products) in MENU {
        let existing: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM categories WHERE name = $1")
            .bind(category)
            .fetch_optional(pool)
            .await?;
        let category_id = match existing {
            Some((id,)) => id,
            None => {
                let id = Uuid::new_v4();
                sqlx::query("INSERT INTO categories (id, name) VALUES ($1, $2)")
                    .bind(id)
                    .bind(category)
                    .execute(pool)
                    .await?;
                id
            }
        };

        for (name, description, price) in products.iter() {
            sqlx::query(
                r#"
                INSERT INTO products (id, name, description, price, category_id)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (name) DO NOTHING
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(name)
            .bind(description)
            .bind(price)
            .bind(category_id)
            .execute(pool)
            .await?;
        }
    }

    tracing::info!("seeded menu");
    Ok(())
}
