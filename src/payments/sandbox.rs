use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use super::{
    GatewayError, GatewayKind, GatewayPayment, HostedCheckout, HostedCheckoutRequest,
    PaymentGateway, StatusLookup, TransactionStatus,
};

/// Local stand-in for a hosted checkout, for demos and end-to-end testing.
///
/// The "checkout page" is the return URL itself, and a payment counts as
/// captured once `confirm_after` has elapsed since the order was created.
/// Only registered when explicitly enabled in configuration.
pub struct SandboxGateway {
    confirm_after: Duration,
}

impl SandboxGateway {
    pub fn new(confirm_after: Duration) -> Self {
        Self { confirm_after }
    }
}

#[async_trait]
impl PaymentGateway for SandboxGateway {
    fn kind(&self) -> GatewayKind {
        GatewayKind::Sandbox
    }

    async fn create_checkout(
        &self,
        request: &HostedCheckoutRequest,
    ) -> Result<HostedCheckout, GatewayError> {
        Ok(HostedCheckout {
            checkout_id: format!("sandbox-{}", request.reference_id),
            checkout_url: request.return_url.clone(),
        })
    }

    async fn transaction_status(
        &self,
        lookup: &StatusLookup<'_>,
    ) -> Result<TransactionStatus, GatewayError> {
        let age = Utc::now().signed_duration_since(lookup.created_at);
        let confirmed = age
            .to_std()
            .map(|age| age >= self.confirm_after)
            .unwrap_or(self.confirm_after.is_zero());
        if confirmed {
            Ok(TransactionStatus::Captured(GatewayPayment {
                transaction_id: Some(format!("sandbox-{}", lookup.reference_id)),
                reference: Some(lookup.reference_id.to_string()),
                amount_cents: Some(lookup.amount_cents),
            }))
        } else {
            Ok(TransactionStatus::Pending)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(created_secs_ago: i64) -> StatusLookup<'static> {
        StatusLookup {
            reference_id: "LOCALTEST",
            order_number: "ORD-20240405-9F3A1C2B",
            amount_cents: 1376,
            checkout_id: None,
            transaction_id: None,
            created_at: Utc::now() - chrono::Duration::seconds(created_secs_ago),
        }
    }

    #[tokio::test]
    async fn pending_until_delay_elapses() {
        let gateway = SandboxGateway::new(Duration::from_secs(5));
        assert_eq!(
            gateway.transaction_status(&lookup(1)).await.unwrap(),
            TransactionStatus::Pending
        );
        match gateway.transaction_status(&lookup(6)).await.unwrap() {
            TransactionStatus::Captured(payment) => assert!(payment.matches("LOCALTEST", 1376)),
            other => panic!("expected capture, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn checkout_returns_straight_to_return_url() {
        let gateway = SandboxGateway::new(Duration::ZERO);
        let checkout = gateway
            .create_checkout(&HostedCheckoutRequest {
                reference_id: "LOCALTEST".into(),
                order_number: "ORD-20240405-9F3A1C2B".into(),
                amount_cents: 1376,
                description: "Farm Land Deli Order".into(),
                return_url: "http://localhost:3000/api/checkout/redirect".into(),
            })
            .await
            .unwrap();
        assert_eq!(checkout.checkout_id, "sandbox-LOCALTEST");
        assert_eq!(
            checkout.checkout_url,
            "http://localhost:3000/api/checkout/redirect"
        );
    }
}
