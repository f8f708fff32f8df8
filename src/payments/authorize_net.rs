//! Authorize.Net Accept Hosted integration over the JSON API.
//!
//! The JSON API validates element order against the XML schema, so requests
//! are built from structs (field order preserved) rather than `json!` maps.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{
    GatewayError, GatewayKind, GatewayPayment, HostedCheckout, HostedCheckoutRequest,
    PaymentGateway, StatusLookup, TransactionStatus, parse_json_body,
};
use crate::{config::AuthorizeNetConfig, money::approx_cents};

/// Authorize.Net caps invoice numbers at 20 characters.
const INVOICE_NUMBER_MAX: usize = 20;
const UNSETTLED_PAGE_SIZE: &str = "100";

pub struct AuthorizeNetGateway {
    http: reqwest::Client,
    config: AuthorizeNetConfig,
}

impl AuthorizeNetGateway {
    pub fn new(http: reqwest::Client, config: AuthorizeNetConfig) -> Self {
        Self { http, config }
    }

    fn auth(&self) -> MerchantAuthentication<'_> {
        MerchantAuthentication {
            name: &self.config.login_id,
            transaction_key: &self.config.transaction_key,
        }
    }

    async fn post<B: Serialize, R: serde::de::DeserializeOwned>(
        &self,
        body: &B,
    ) -> Result<R, GatewayError> {
        let response = self
            .http
            .post(&self.config.api_url)
            .json(body)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;
        tracing::debug!(%status, bytes = text.len(), "authorize.net response");
        parse_json_body(status, &text)
    }

    async fn transaction_details(
        &self,
        transaction_id: &str,
    ) -> Result<TransactionStatus, GatewayError> {
        let request = TransactionDetailsEnvelope {
            get_transaction_details_request: TransactionDetailsRequest {
                merchant_authentication: self.auth(),
                trans_id: transaction_id,
            },
        };
        let response: TransactionDetailsResponse = self.post(&request).await?;
        response.messages.ensure_ok()?;
        let transaction = response
            .transaction
            .ok_or(GatewayError::MissingField("transaction"))?;
        Ok(transaction.into_status())
    }

    /// Looks the payment up by invoice number among unsettled transactions.
    async fn find_unsettled(&self, invoice: &str) -> Result<TransactionStatus, GatewayError> {
        let request = UnsettledListEnvelope {
            get_unsettled_transaction_list_request: UnsettledListRequest {
                merchant_authentication: self.auth(),
                sorting: Sorting {
                    order_by: "submitTimeUTC",
                    order_descending: "true",
                },
                paging: Paging {
                    limit: UNSETTLED_PAGE_SIZE,
                    offset: "1",
                },
            },
        };
        let response: UnsettledListResponse = self.post(&request).await?;
        response.messages.ensure_ok()?;
        let found = response
            .transactions
            .unwrap_or_default()
            .into_iter()
            .find(|t| t.invoice_number.as_deref() == Some(invoice));
        Ok(found.map_or(TransactionStatus::Pending, TransactionSummary::into_status))
    }
}

#[async_trait]
impl PaymentGateway for AuthorizeNetGateway {
    fn kind(&self) -> GatewayKind {
        GatewayKind::AuthorizeNet
    }

    fn order_reference(&self, _reference_id: &str, order_number: &str) -> String {
        invoice_number(order_number)
    }

    async fn create_checkout(
        &self,
        request: &HostedCheckoutRequest,
    ) -> Result<HostedCheckout, GatewayError> {
        let invoice = invoice_number(&request.order_number);
        let body = hosted_page_request(self.auth(), request, &invoice);
        let response: HostedPageResponse = self.post(&body).await?;
        response.messages.ensure_ok()?;
        let token = response
            .token
            .filter(|t| !t.is_empty())
            .ok_or(GatewayError::MissingField("token"))?;

        tracing::info!(reference_id = %request.reference_id, "authorize.net hosted page token issued");
        Ok(HostedCheckout {
            checkout_url: format!("{}/{}", self.config.hosted_page_url, token),
            checkout_id: token,
        })
    }

    async fn transaction_status(
        &self,
        lookup: &StatusLookup<'_>,
    ) -> Result<TransactionStatus, GatewayError> {
        match lookup.transaction_id {
            Some(transaction_id) => self.transaction_details(transaction_id).await,
            None => self.find_unsettled(&invoice_number(lookup.order_number)).await,
        }
    }
}

/// Order numbers without separators: `ORD-20240101-ABCDEF12` files as
/// `ORD20240101ABCDEF12`, which fits the invoice field whole.
pub fn invoice_number(order_number: &str) -> String {
    order_number
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(INVOICE_NUMBER_MAX)
        .collect()
}

fn hosted_page_request<'a>(
    auth: MerchantAuthentication<'a>,
    request: &'a HostedCheckoutRequest,
    invoice: &'a str,
) -> HostedPageEnvelope<'a> {
    let return_options = serde_json::json!({
        "showReceipt": false,
        "url": request.return_url,
        "urlText": "Return to Farm Land Deli",
    });
    HostedPageEnvelope {
        get_hosted_payment_page_request: HostedPageRequest {
            merchant_authentication: auth,
            transaction_request: TransactionRequest {
                transaction_type: "authCaptureTransaction",
                amount: Decimal::new(request.amount_cents, 2).to_string(),
                order: OrderInfo {
                    invoice_number: invoice,
                    description: &request.description,
                },
            },
            hosted_payment_settings: HostedPaymentSettings {
                setting: vec![Setting {
                    setting_name: "hostedPaymentReturnOptions",
                    setting_value: return_options.to_string(),
                }],
            },
        },
    }
}

/// Maps an Authorize.Net `transactionStatus` onto the local view.
pub fn map_transaction_status(status: &str, payment: GatewayPayment) -> TransactionStatus {
    match status {
        "capturedPendingSettlement" | "settledSuccessfully" => TransactionStatus::Captured(payment),
        "declined" | "voided" | "expired" | "failedReview" | "generalError"
        | "settlementError" | "communicationError" | "couldNotVoid" => {
            TransactionStatus::Declined {
                payment,
                reason: status.to_string(),
            }
        }
        _ => TransactionStatus::Pending,
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MerchantAuthentication<'a> {
    name: &'a str,
    transaction_key: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HostedPageEnvelope<'a> {
    get_hosted_payment_page_request: HostedPageRequest<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HostedPageRequest<'a> {
    merchant_authentication: MerchantAuthentication<'a>,
    transaction_request: TransactionRequest<'a>,
    hosted_payment_settings: HostedPaymentSettings,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TransactionRequest<'a> {
    transaction_type: &'static str,
    amount: String,
    order: OrderInfo<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OrderInfo<'a> {
    invoice_number: &'a str,
    description: &'a str,
}

#[derive(Serialize)]
struct HostedPaymentSettings {
    setting: Vec<Setting>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Setting {
    setting_name: &'static str,
    setting_value: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TransactionDetailsEnvelope<'a> {
    get_transaction_details_request: TransactionDetailsRequest<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TransactionDetailsRequest<'a> {
    merchant_authentication: MerchantAuthentication<'a>,
    trans_id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UnsettledListEnvelope<'a> {
    get_unsettled_transaction_list_request: UnsettledListRequest<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UnsettledListRequest<'a> {
    merchant_authentication: MerchantAuthentication<'a>,
    sorting: Sorting,
    paging: Paging,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Sorting {
    order_by: &'static str,
    order_descending: &'static str,
}

#[derive(Serialize)]
struct Paging {
    limit: &'static str,
    offset: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Messages {
    result_code: String,
    #[serde(default)]
    message: Vec<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    code: String,
    text: String,
}

impl Messages {
    fn ensure_ok(&self) -> Result<(), GatewayError> {
        if self.result_code.eq_ignore_ascii_case("ok") {
            return Ok(());
        }
        let detail = self
            .message
            .iter()
            .map(|m| format!("{}: {}", m.code, m.text))
            .collect::<Vec<_>>()
            .join("; ");
        Err(GatewayError::Rejected(if detail.is_empty() {
            self.result_code.clone()
        } else {
            detail
        }))
    }
}

#[derive(Debug, Deserialize)]
struct HostedPageResponse {
    token: Option<String>,
    messages: Messages,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionSummary {
    trans_id: String,
    transaction_status: String,
    /// Present in the unsettled list.
    invoice_number: Option<String>,
    /// Present in transaction details.
    order: Option<TransactionOrder>,
    settle_amount: Option<Decimal>,
    auth_amount: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionOrder {
    invoice_number: Option<String>,
}

impl TransactionSummary {
    fn into_status(self) -> TransactionStatus {
        let payment = GatewayPayment {
            transaction_id: Some(self.trans_id),
            reference: self
                .invoice_number
                .or(self.order.and_then(|o| o.invoice_number)),
            amount_cents: self.settle_amount.or(self.auth_amount).and_then(approx_cents),
        };
        map_transaction_status(&self.transaction_status, payment)
    }
}

#[derive(Debug, Deserialize)]
struct TransactionDetailsResponse {
    transaction: Option<TransactionSummary>,
    messages: Messages,
}

#[derive(Debug, Deserialize)]
struct UnsettledListResponse {
    transactions: Option<Vec<TransactionSummary>>,
    messages: Messages,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_request() -> HostedCheckoutRequest {
        HostedCheckoutRequest {
            reference_id: "FLD-1712345678901-13.76".into(),
            order_number: "ORD-20240405-9F3A1C2B".into(),
            amount_cents: 1376,
            description: "Farm Land Deli Order".into(),
            return_url: "https://deli.example.com/api/checkout/verify-payment?referenceId=x".into(),
        }
    }

    #[test]
    fn hosted_page_request_keeps_schema_order() {
        let request = sample_request();
        let invoice = invoice_number(&request.order_number);
        let body = hosted_page_request(
            MerchantAuthentication {
                name: "login",
                transaction_key: "key",
            },
            &request,
            &invoice,
        );
        let json = serde_json::to_string(&body).unwrap();

        let auth = json.find("merchantAuthentication").unwrap();
        let txn = json.find("transactionRequest").unwrap();
        let settings = json.find("hostedPaymentSettings").unwrap();
        assert!(auth < txn && txn < settings);
        assert!(json.contains(r#""amount":"13.76""#));
        assert!(json.contains(r#""invoiceNumber":"ORD202404059F3A1C2B""#));
    }

    #[test]
    fn rejected_messages_carry_gateway_text() {
        let messages = Messages {
            result_code: "Error".into(),
            message: vec![Message {
                code: "E00007".into(),
                text: "User authentication failed due to invalid authentication values.".into(),
            }],
        };
        let err = messages.ensure_ok().unwrap_err();
        assert!(err.to_string().contains("E00007"));
    }

    #[test]
    fn invoice_numbers_fit_and_stay_distinct() {
        let a = invoice_number("ORD-20240405-9F3A1C2B");
        let b = invoice_number("ORD-20240405-9F3A1C2C");
        assert_eq!(a, "ORD202404059F3A1C2B");
        assert!(a.len() <= INVOICE_NUMBER_MAX);
        assert_ne!(a, b);
    }

    #[test]
    fn details_report_invoice_and_amount() {
        let body = r#"{
            "transId": "60",
            "transactionStatus": "settledSuccessfully",
            "order": { "invoiceNumber": "ORD202404059F3A1C2B" },
            "authAmount": 13.76,
            "settleAmount": 13.76
        }"#;
        let summary: TransactionSummary = serde_json::from_str(body).unwrap();
        assert_eq!(
            summary.into_status(),
            TransactionStatus::Captured(GatewayPayment {
                transaction_id: Some("60".into()),
                reference: Some("ORD202404059F3A1C2B".into()),
                amount_cents: Some(1376),
            })
        );
    }

    #[test]
    fn settled_and_declined_statuses_map() {
        assert!(matches!(
            map_transaction_status("settledSuccessfully", GatewayPayment::default()),
            TransactionStatus::Captured(_)
        ));
        assert!(matches!(
            map_transaction_status("declined", GatewayPayment::default()),
            TransactionStatus::Declined { .. }
        ));
        assert_eq!(
            map_transaction_status("FDSPendingReview", GatewayPayment::default()),
            TransactionStatus::Pending
        );
    }
}
