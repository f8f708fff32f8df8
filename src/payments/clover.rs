//! Clover hosted checkout (invoicing checkout service) and order lookup.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{
    GatewayError, GatewayKind, GatewayPayment, HostedCheckout, HostedCheckoutRequest,
    PaymentGateway, StatusLookup, TransactionStatus, parse_json_body,
};
use crate::config::CloverConfig;

pub struct CloverGateway {
    http: reqwest::Client,
    config: CloverConfig,
}

impl CloverGateway {
    pub fn new(http: reqwest::Client, config: CloverConfig) -> Self {
        Self { http, config }
    }
}

#[async_trait]
impl PaymentGateway for CloverGateway {
    fn kind(&self) -> GatewayKind {
        GatewayKind::Clover
    }

    async fn create_checkout(
        &self,
        request: &HostedCheckoutRequest,
    ) -> Result<HostedCheckout, GatewayError> {
        let body = checkout_body(request);
        let response = self
            .http
            .post(format!(
                "{}/invoicingcheckoutservice/v1/checkouts",
                self.config.api_base
            ))
            .bearer_auth(&self.config.api_token)
            .header("X-Clover-Merchant-Id", &self.config.merchant_id)
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;
        let data: CheckoutResponse = parse_json_body(status, &text)?;

        if !status.is_success() {
            return Err(GatewayError::Rejected(
                data.message
                    .unwrap_or_else(|| format!("HTTP {}", status.as_u16())),
            ));
        }

        let checkout_url = data
            .checkout_page_url
            .or(data.href)
            .or(data.links.and_then(|l| l.checkout).map(|c| c.href))
            .ok_or(GatewayError::MissingField("checkout url"))?;
        let checkout_id = data
            .checkout_session_id
            .or(data.id)
            .unwrap_or_else(|| request.reference_id.clone());

        tracing::info!(reference_id = %request.reference_id, %checkout_id, "clover checkout created");
        Ok(HostedCheckout {
            checkout_id,
            checkout_url,
        })
    }

    async fn transaction_status(
        &self,
        lookup: &StatusLookup<'_>,
    ) -> Result<TransactionStatus, GatewayError> {
        // The Clover order id only arrives with the redirect; before that
        // there is nothing to ask about.
        let Some(order_id) = lookup.transaction_id else {
            return Ok(TransactionStatus::Pending);
        };

        let response = self
            .http
            .get(format!(
                "{}/v3/merchants/{}/orders/{}",
                self.config.api_base, self.config.merchant_id, order_id
            ))
            .query(&[("expand", "lineItems")])
            .bearer_auth(&self.config.api_token)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;
        let order: CloverOrder = parse_json_body(status, &text)?;
        if !status.is_success() {
            return Err(GatewayError::Rejected(
                order
                    .message
                    .unwrap_or_else(|| format!("HTTP {}", status.as_u16())),
            ));
        }
        Ok(order.into_status(order_id))
    }
}

fn checkout_body(request: &HostedCheckoutRequest) -> CheckoutBody<'_> {
    CheckoutBody {
        customer: serde_json::Map::new(),
        shopping_cart: ShoppingCart {
            line_items: vec![LineItem {
                name: &request.reference_id,
                price: request.amount_cents,
                unit_qty: 1,
            }],
        },
        redirect_urls: RedirectUrls {
            success: outcome_url(&request.return_url, "success"),
            failure: outcome_url(&request.return_url, "failure"),
            cancel: outcome_url(&request.return_url, "cancel"),
        },
    }
}

fn outcome_url(return_url: &str, outcome: &str) -> String {
    match reqwest::Url::parse(return_url) {
        Ok(mut url) => {
            url.query_pairs_mut().append_pair("status", outcome);
            url.to_string()
        }
        Err(_) => return_url.to_string(),
    }
}

pub fn map_order_state(state: &str, payment: GatewayPayment) -> TransactionStatus {
    match state.to_ascii_lowercase().as_str() {
        "paid" => TransactionStatus::Captured(payment),
        "refunded" | "declined" | "cancelled" => TransactionStatus::Declined {
            payment,
            reason: state.to_string(),
        },
        _ => TransactionStatus::Pending,
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckoutBody<'a> {
    customer: serde_json::Map<String, serde_json::Value>,
    shopping_cart: ShoppingCart<'a>,
    redirect_urls: RedirectUrls,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ShoppingCart<'a> {
    line_items: Vec<LineItem<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LineItem<'a> {
    name: &'a str,
    /// Cents.
    price: i64,
    unit_qty: i32,
}

#[derive(Serialize)]
struct RedirectUrls {
    success: String,
    failure: String,
    cancel: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckoutResponse {
    id: Option<String>,
    checkout_session_id: Option<String>,
    href: Option<String>,
    checkout_page_url: Option<String>,
    #[serde(rename = "_links")]
    links: Option<CheckoutLinks>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CheckoutLinks {
    checkout: Option<Link>,
}

#[derive(Debug, Deserialize)]
struct Link {
    href: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CloverOrder {
    state: Option<String>,
    /// Cents.
    total: Option<i64>,
    line_items: Option<OrderLineItems>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OrderLineItems {
    #[serde(default)]
    elements: Vec<OrderLineItem>,
}

#[derive(Debug, Deserialize)]
struct OrderLineItem {
    name: Option<String>,
}

impl CloverOrder {
    /// Checkouts carry a single line item named after the reference id.
    fn into_status(self, order_id: &str) -> TransactionStatus {
        let reference = self
            .line_items
            .and_then(|items| items.elements.into_iter().next())
            .and_then(|item| item.name);
        let payment = GatewayPayment {
            transaction_id: Some(order_id.to_string()),
            reference,
            amount_cents: self.total,
        };
        map_order_state(self.state.as_deref().unwrap_or_default(), payment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkout_body_sends_cents_and_outcome_urls() {
        let request = HostedCheckoutRequest {
            reference_id: "REF-1".into(),
            order_number: "ORD-20240405-9F3A1C2B".into(),
            amount_cents: 2599,
            description: "Farm Land Deli Order".into(),
            return_url: "https://deli.example.com/api/checkout/redirect?referenceId=REF-1&sig=ab"
                .into(),
        };
        let json = serde_json::to_value(checkout_body(&request)).unwrap();
        assert_eq!(json["shoppingCart"]["lineItems"][0]["price"], 2599);
        assert_eq!(json["shoppingCart"]["lineItems"][0]["unitQty"], 1);
        let success = json["redirectUrls"]["success"].as_str().unwrap();
        assert!(success.ends_with("&status=success"));
        assert!(success.contains("sig=ab"));
    }

    #[test]
    fn only_paid_orders_count_as_captured() {
        assert!(matches!(
            map_order_state("PAID", GatewayPayment::default()),
            TransactionStatus::Captured(_)
        ));
        assert_eq!(
            map_order_state("open", GatewayPayment::default()),
            TransactionStatus::Pending
        );
        assert_eq!(
            map_order_state("locked", GatewayPayment::default()),
            TransactionStatus::Pending
        );
    }

    #[test]
    fn order_reports_line_item_reference_and_total() {
        let order: CloverOrder = serde_json::from_str(
            r#"{"id":"O1","state":"paid","total":2599,"lineItems":{"elements":[{"name":"REF-1"}]}}"#,
        )
        .unwrap();
        assert_eq!(
            order.into_status("O1"),
            TransactionStatus::Captured(GatewayPayment {
                transaction_id: Some("O1".into()),
                reference: Some("REF-1".into()),
                amount_cents: Some(2599),
            })
        );
    }
}
