use std::{env, time::Duration};

use anyhow::Context;

use crate::payments::GatewayKind;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    /// Externally reachable base URL of this API; gateway return URLs point here.
    pub public_url: String,
    /// Public base URL of the customer site, used for return URLs and the
    /// order confirmation page.
    pub site_url: String,
    pub app_deep_link_scheme: String,
    pub callback_secret: String,
    pub allowed_origins: Vec<String>,
    pub default_gateway: GatewayKind,
    pub authorize_net: Option<AuthorizeNetConfig>,
    pub clover: Option<CloverConfig>,
    pub sandbox: Option<SandboxConfig>,
    pub email: EmailConfig,
}

#[derive(Debug, Clone)]
pub struct AuthorizeNetConfig {
    pub login_id: String,
    pub transaction_key: String,
    pub api_url: String,
    pub hosted_page_url: String,
}

#[derive(Debug, Clone)]
pub struct CloverConfig {
    pub api_token: String,
    pub merchant_id: String,
    pub api_base: String,
}

#[derive(Debug, Clone)]
pub struct SandboxConfig {
    pub confirm_after: Duration,
}

#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub resend_api_key: Option<String>,
    pub resend_api_url: String,
    pub from: String,
}

const AUTHORIZE_SANDBOX_API: &str = "https://apitest.authorize.net/xml/v1/request.api";
const AUTHORIZE_PRODUCTION_API: &str = "https://api.authorize.net/xml/v1/request.api";
const AUTHORIZE_SANDBOX_PAGE: &str = "https://test.authorize.net/payment/payment";
const AUTHORIZE_PRODUCTION_PAGE: &str = "https://accept.authorize.net/payment/payment";

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET is not set")?;
        let public_url = env::var("PUBLIC_API_URL")
            .unwrap_or_else(|_| format!("http://{host}:{port}"))
            .trim_end_matches('/')
            .to_string();
        let site_url = env::var("SITE_URL")
            .context("SITE_URL is not set")?
            .trim_end_matches('/')
            .to_string();
        let app_deep_link_scheme =
            env::var("APP_DEEP_LINK_SCHEME").unwrap_or_else(|_| "farmlanddeli".to_string());
        let callback_secret =
            env::var("CALLBACK_SIGNING_SECRET").context("CALLBACK_SIGNING_SECRET is not set")?;
        let allowed_origins = env::var("ALLOWED_ORIGINS")
            .map(|raw| parse_list(&raw))
            .unwrap_or_default();

        let default_gateway = match env::var("PAYMENT_DEFAULT_GATEWAY") {
            Ok(raw) => raw
                .parse::<GatewayKind>()
                .map_err(|e| anyhow::anyhow!("PAYMENT_DEFAULT_GATEWAY: {e}"))?,
            Err(_) => GatewayKind::AuthorizeNet,
        };

        Ok(Self {
            database_url,
            host,
            port,
            jwt_secret,
            public_url,
            site_url,
            app_deep_link_scheme,
            callback_secret,
            allowed_origins,
            default_gateway,
            authorize_net: authorize_net_from_env(),
            clover: clover_from_env(),
            sandbox: sandbox_from_env(),
            email: EmailConfig {
                resend_api_key: env::var("RESEND_API_KEY").ok().filter(|k| !k.is_empty()),
                resend_api_url: env::var("RESEND_API_URL")
                    .unwrap_or_else(|_| "https://api.resend.com".to_string())
                    .trim_end_matches('/')
                    .to_string(),
                from: env::var("EMAIL_FROM")
                    .unwrap_or_else(|_| "Farmland Deli <no-reply@farmlanddeli.com>".to_string()),
            },
        })
    }
}

fn authorize_net_from_env() -> Option<AuthorizeNetConfig> {
    let login_id = env::var("AUTHORIZE_LOGIN_ID").ok()?;
    let transaction_key = env::var("AUTHORIZE_TRANSACTION_KEY").ok()?;
    let sandbox = env::var("AUTHORIZE_ENV")
        .map(|v| v.eq_ignore_ascii_case("sandbox"))
        .unwrap_or(true);
    let (default_api, hosted_page_url) = if sandbox {
        (AUTHORIZE_SANDBOX_API, AUTHORIZE_SANDBOX_PAGE)
    } else {
        (AUTHORIZE_PRODUCTION_API, AUTHORIZE_PRODUCTION_PAGE)
    };
    Some(AuthorizeNetConfig {
        login_id,
        transaction_key,
        api_url: env::var("AUTHORIZE_API_URL").unwrap_or_else(|_| default_api.to_string()),
        hosted_page_url: hosted_page_url.to_string(),
    })
}

fn clover_from_env() -> Option<CloverConfig> {
    Some(CloverConfig {
        api_token: env::var("CLOVER_API_TOKEN").ok()?,
        merchant_id: env::var("CLOVER_MID").ok()?,
        api_base: env::var("CLOVER_API_BASE")
            .unwrap_or_else(|_| "https://api.clover.com".to_string())
            .trim_end_matches('/')
            .to_string(),
    })
}

fn sandbox_from_env() -> Option<SandboxConfig> {
    let enabled = env::var("PAYMENT_SANDBOX_ENABLED")
        .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
        .unwrap_or(false);
    if !enabled {
        return None;
    }
    let secs = env::var("PAYMENT_SANDBOX_CONFIRM_SECS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(5);
    Some(SandboxConfig {
        confirm_after: Duration::from_secs(secs),
    })
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
