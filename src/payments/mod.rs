//! Hosted-checkout payment gateways.
//!
//! Every gateway hands the customer off to a page it hosts and later answers
//! "what happened to this payment?". The service never sees card data.

use std::{collections::HashMap, fmt, str::FromStr, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::config::AppConfig;

pub mod authorize_net;
pub mod clover;
pub mod sandbox;
pub mod signing;

pub use authorize_net::AuthorizeNetGateway;
pub use clover::CloverGateway;
pub use sandbox::SandboxGateway;
pub use signing::{CallbackSigner, ReturnTarget};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GatewayKind {
    AuthorizeNet,
    Clover,
    Sandbox,
}

impl GatewayKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayKind::AuthorizeNet => "authorize_net",
            GatewayKind::Clover => "clover",
            GatewayKind::Sandbox => "sandbox",
        }
    }
}

impl fmt::Display for GatewayKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GatewayKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "authorize_net" | "authorize" | "authorizenet" => Ok(GatewayKind::AuthorizeNet),
            "clover" => Ok(GatewayKind::Clover),
            "sandbox" => Ok(GatewayKind::Sandbox),
            other => Err(format!("unknown payment gateway '{other}'")),
        }
    }
}

/// What the service asks a gateway for when a customer checks out.
#[derive(Debug, Clone)]
pub struct HostedCheckoutRequest {
    pub reference_id: String,
    pub order_number: String,
    pub amount_cents: i64,
    pub description: String,
    /// Signed URL the gateway sends the customer back to.
    pub return_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostedCheckout {
    /// Gateway handle for the checkout (Authorize.Net token, Clover session id).
    pub checkout_id: String,
    pub checkout_url: String,
}

/// Everything known locally about a payment attempt.
#[derive(Debug, Clone)]
pub struct StatusLookup<'a> {
    pub reference_id: &'a str,
    pub order_number: &'a str,
    pub amount_cents: i64,
    pub checkout_id: Option<&'a str>,
    /// Gateway transaction (or gateway order) id to ask about, if one is known.
    pub transaction_id: Option<&'a str>,
    pub created_at: DateTime<Utc>,
}

/// What the gateway has on file for a payment it found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GatewayPayment {
    pub transaction_id: Option<String>,
    /// Invoice number or line-item name the payment was filed under.
    pub reference: Option<String>,
    pub amount_cents: Option<i64>,
}

impl GatewayPayment {
    /// Both the gateway reference and the amount must be present and equal.
    pub fn matches(&self, reference: &str, amount_cents: i64) -> bool {
        self.reference.as_deref() == Some(reference) && self.amount_cents == Some(amount_cents)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionStatus {
    Pending,
    Captured(GatewayPayment),
    Declined {
        payment: GatewayPayment,
        reason: String,
    },
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("payment gateway request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("payment gateway returned an unparsable response (HTTP {status}): {snippet}")]
    UnexpectedBody { status: u16, snippet: String },

    #[error("payment gateway rejected the request: {0}")]
    Rejected(String),

    #[error("payment gateway response is missing {0}")]
    MissingField(&'static str),
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn kind(&self) -> GatewayKind;

    /// The reference this gateway files an order's payment under.
    fn order_reference(&self, reference_id: &str, _order_number: &str) -> String {
        reference_id.to_string()
    }

    async fn create_checkout(
        &self,
        request: &HostedCheckoutRequest,
    ) -> Result<HostedCheckout, GatewayError>;

    async fn transaction_status(
        &self,
        lookup: &StatusLookup<'_>,
    ) -> Result<TransactionStatus, GatewayError>;
}

/// Gateways available to this process, keyed by kind.
#[derive(Clone)]
pub struct GatewayRegistry {
    gateways: HashMap<GatewayKind, Arc<dyn PaymentGateway>>,
    default_kind: GatewayKind,
}

impl GatewayRegistry {
    pub fn new(default_kind: GatewayKind) -> Self {
        Self {
            gateways: HashMap::new(),
            default_kind,
        }
    }

    pub fn from_config(config: &AppConfig, http: reqwest::Client) -> Self {
        let mut registry = Self::new(config.default_gateway);
        if let Some(authorize) = &config.authorize_net {
            registry.register(Arc::new(AuthorizeNetGateway::new(
                http.clone(),
                authorize.clone(),
            )));
        }
        if let Some(clover) = &config.clover {
            registry.register(Arc::new(CloverGateway::new(http.clone(), clover.clone())));
        }
        if let Some(sandbox) = &config.sandbox {
            tracing::warn!(
                confirm_after_secs = sandbox.confirm_after.as_secs(),
                "sandbox payment gateway enabled; its payments confirm on a timer"
            );
            registry.register(Arc::new(SandboxGateway::new(sandbox.confirm_after)));
        }
        registry
    }

    pub fn register(&mut self, gateway: Arc<dyn PaymentGateway>) {
        self.gateways.insert(gateway.kind(), gateway);
    }

    pub fn default_kind(&self) -> GatewayKind {
        self.default_kind
    }

    pub fn get(&self, kind: GatewayKind) -> Option<Arc<dyn PaymentGateway>> {
        self.gateways.get(&kind).cloned()
    }

    pub fn kinds(&self) -> Vec<GatewayKind> {
        let mut kinds: Vec<_> = self.gateways.keys().copied().collect();
        kinds.sort_by_key(|k| k.as_str());
        kinds
    }
}

const SNIPPET_LEN: usize = 300;

pub(crate) fn snippet(body: &str) -> String {
    body.chars().take(SNIPPET_LEN).collect()
}

/// Parses a gateway JSON body, turning HTML/XML error pages into a diagnostic.
pub(crate) fn parse_json_body<T: serde::de::DeserializeOwned>(
    status: reqwest::StatusCode,
    body: &str,
) -> Result<T, GatewayError> {
    // Authorize.Net prefixes its JSON with a byte order mark.
    let trimmed = body.trim_start_matches('\u{feff}').trim();
    serde_json::from_str(trimmed).map_err(|_| GatewayError::UnexpectedBody {
        status: status.as_u16(),
        snippet: snippet(trimmed),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_kind_accepts_aliases() {
        assert_eq!("authorize".parse::<GatewayKind>(), Ok(GatewayKind::AuthorizeNet));
        assert_eq!(" Clover ".parse::<GatewayKind>(), Ok(GatewayKind::Clover));
        assert!("paypal".parse::<GatewayKind>().is_err());
    }

    #[test]
    fn html_error_page_becomes_unexpected_body() {
        let body = "<!DOCTYPE html><html><body>Bad gateway</body></html>";
        let err = parse_json_body::<serde_json::Value>(reqwest::StatusCode::BAD_GATEWAY, body)
            .unwrap_err();
        match err {
            GatewayError::UnexpectedBody { status, snippet } => {
                assert_eq!(status, 502);
                assert!(snippet.starts_with("<!DOCTYPE html>"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn byte_order_mark_is_ignored() {
        let body = "\u{feff}{\"token\":\"abc\"}";
        let value: serde_json::Value =
            parse_json_body(reqwest::StatusCode::OK, body).expect("json");
        assert_eq!(value["token"], "abc");
    }

    #[test]
    fn payment_must_match_reference_and_amount() {
        let payment = GatewayPayment {
            transaction_id: Some("T1".into()),
            reference: Some("REF-1".into()),
            amount_cents: Some(1376),
        };
        assert!(payment.matches("REF-1", 1376));
        assert!(!payment.matches("REF-2", 1376));
        assert!(!payment.matches("REF-1", 1375));
        assert!(!GatewayPayment::default().matches("REF-1", 1376));
    }

    #[test]
    fn snippet_is_bounded() {
        let long = "x".repeat(1000);
        assert_eq!(snippet(&long).len(), SNIPPET_LEN);
    }
}
