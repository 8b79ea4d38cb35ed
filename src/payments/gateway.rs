// N-Genius hosted-payment-page gateway client
//
// The gateway flow: create an order against the outlet, send the shopper
// to the returned payment page, then read the order back after the
// redirect and map its payment state onto our payment status. All calls
// carry a bearer token obtained from the identity endpoint and cached
// until shortly before expiry.

use std::time::{Duration, Instant};

use axum::async_trait;
use serde_json::{json, Value};
use tokio::sync::RwLock;

use crate::config::GatewayConfig;
use crate::payments::error::PaymentError;

/// Gateway payment states accepted as a successful capture. AUTHORISED
/// appears in both spellings depending on the acquiring bank.
pub const SUCCESS_STATES: [&str; 4] = ["CAPTURED", "PURCHASED", "AUTHORISED", "AUTHORIZED"];

/// Parameters for opening a hosted-payment session.
#[derive(Debug, Clone)]
pub struct GatewayOrderRequest {
    /// Amount in minor units (fils).
    pub amount_minor: i64,
    pub currency: String,
    pub merchant_order_reference: String,
    pub redirect_url: String,
    pub cancel_url: String,
}

/// A hosted-payment session the shopper can be redirected to.
#[derive(Debug, Clone)]
pub struct GatewaySession {
    pub reference: String,
    pub payment_url: String,
}

/// The gateway's view of an order after the shopper returns.
#[derive(Debug, Clone)]
pub struct GatewayOrderState {
    pub state: String,
    pub raw: Value,
}

impl GatewayOrderState {
    /// Extract the state from a gateway order document: the embedded
    /// payment's state when present, the order-level state otherwise.
    pub fn from_document(raw: Value) -> Self {
        let state = raw
            .pointer("/_embedded/payment/0/state")
            .or_else(|| raw.get("state"))
            .and_then(Value::as_str)
            .unwrap_or("UNKNOWN")
            .to_uppercase();
        Self { state, raw }
    }

    pub fn is_success(&self) -> bool {
        SUCCESS_STATES.contains(&self.state.as_str())
    }

    /// Human-readable failure reason, if the gateway supplied one.
    pub fn failure_message(&self) -> String {
        self.raw
            .pointer("/_embedded/payment/0/authResponse/resultMessage")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("Payment not completed (state {})", self.state))
    }
}

/// External payment gateway operations, mockable for tests.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_hosted_order(
        &self,
        request: &GatewayOrderRequest,
    ) -> Result<GatewaySession, PaymentError>;

    async fn order_state(&self, gateway_ref: &str) -> Result<GatewayOrderState, PaymentError>;

    async fn refund(
        &self,
        gateway_ref: &str,
        amount_minor: i64,
        currency: &str,
    ) -> Result<(), PaymentError>;
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// Live N-Genius client.
pub struct NgeniusGateway {
    client: reqwest::Client,
    config: GatewayConfig,
    token: RwLock<Option<CachedToken>>,
}

impl NgeniusGateway {
    pub fn new(config: GatewayConfig) -> Result<Self, PaymentError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            config,
            token: RwLock::new(None),
        })
    }

    /// Bearer token for the outlet, cached until a minute before expiry.
    async fn access_token(&self) -> Result<String, PaymentError> {
        {
            let cached = self.token.read().await;
            if let Some(cached) = cached.as_ref() {
                if cached.expires_at > Instant::now() {
                    return Ok(cached.token.clone());
                }
            }
        }

        let response = self
            .client
            .post(format!("{}/identity/auth/access-token", self.config.api_url))
            .header("Authorization", format!("Basic {}", self.config.api_key))
            .header("Content-Type", "application/vnd.ni-identity.v1+json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PaymentError::GatewayError(format!(
                "token request failed with {}",
                response.status()
            )));
        }

        let body: Value = response.json().await?;
        let token = body
            .get("access_token")
            .and_then(Value::as_str)
            .ok_or_else(|| PaymentError::GatewayError("token response missing access_token".to_string()))?
            .to_string();
        let expires_in = body.get("expires_in").and_then(Value::as_u64).unwrap_or(300);

        let mut cached = self.token.write().await;
        *cached = Some(CachedToken {
            token: token.clone(),
            expires_at: Instant::now() + Duration::from_secs(expires_in.saturating_sub(60)),
        });

        Ok(token)
    }

    fn orders_url(&self) -> String {
        format!(
            "{}/transactions/outlets/{}/orders",
            self.config.api_url, self.config.outlet_ref
        )
    }
}

#[async_trait]
impl PaymentGateway for NgeniusGateway {
    async fn create_hosted_order(
        &self,
        request: &GatewayOrderRequest,
    ) -> Result<GatewaySession, PaymentError> {
        let token = self.access_token().await?;

        let response = self
            .client
            .post(self.orders_url())
            .bearer_auth(token)
            .header("Content-Type", "application/vnd.ni-payment.v2+json")
            .json(&json!({
                "action": "SALE",
                "amount": {
                    "currencyCode": request.currency,
                    "value": request.amount_minor,
                },
                "merchantOrderReference": request.merchant_order_reference,
                "merchantAttributes": {
                    "redirectUrl": request.redirect_url,
                    "cancelUrl": request.cancel_url,
                    "skipConfirmationPage": true,
                },
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PaymentError::GatewayError(format!(
                "order creation failed with {}",
                response.status()
            )));
        }

        let body: Value = response.json().await?;
        parse_session(&body)
    }

    async fn order_state(&self, gateway_ref: &str) -> Result<GatewayOrderState, PaymentError> {
        let token = self.access_token().await?;

        let response = self
            .client
            .get(format!("{}/{}", self.orders_url(), gateway_ref))
            .bearer_auth(token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PaymentError::GatewayError(format!(
                "order lookup failed with {}",
                response.status()
            )));
        }

        let body: Value = response.json().await?;
        Ok(GatewayOrderState::from_document(body))
    }

    async fn refund(
        &self,
        gateway_ref: &str,
        amount_minor: i64,
        currency: &str,
    ) -> Result<(), PaymentError> {
        let token = self.access_token().await?;
        let state = self.order_state(gateway_ref).await?;

        let refund_url = state
            .raw
            .pointer("/_embedded/payment/0/_links/cnp:refund/href")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                PaymentError::GatewayError("order has no refund link".to_string())
            })?
            .to_string();

        let response = self
            .client
            .post(refund_url)
            .bearer_auth(token)
            .header("Content-Type", "application/vnd.ni-payment.v2+json")
            .json(&json!({
                "amount": {
                    "currencyCode": currency,
                    "value": amount_minor,
                },
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PaymentError::GatewayError(format!(
                "refund failed with {}",
                response.status()
            )));
        }

        Ok(())
    }
}

fn parse_session(body: &Value) -> Result<GatewaySession, PaymentError> {
    let reference = body
        .get("reference")
        .and_then(Value::as_str)
        .ok_or_else(|| PaymentError::GatewayError("order response missing reference".to_string()))?
        .to_string();

    let payment_url = body
        .pointer("/_links/payment/href")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            PaymentError::GatewayError("order response missing payment link".to_string())
        })?
        .to_string();

    Ok(GatewaySession {
        reference,
        payment_url,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_session_from_order_response() {
        let body = json!({
            "reference": "f9e8d7c6-b5a4-3210-fedc-ba9876543210",
            "_links": {
                "payment": { "href": "https://paypage.sandbox.ngenius-payments.com/?code=abc123" }
            }
        });

        let session = parse_session(&body).unwrap();
        assert_eq!(session.reference, "f9e8d7c6-b5a4-3210-fedc-ba9876543210");
        assert!(session.payment_url.contains("paypage"));
    }

    #[test]
    fn test_parse_session_missing_link_is_error() {
        let body = json!({ "reference": "abc" });
        assert!(parse_session(&body).is_err());
    }

    #[test]
    fn test_success_states_allow_both_authorised_spellings() {
        for state in ["CAPTURED", "PURCHASED", "AUTHORISED", "AUTHORIZED"] {
            let doc = json!({
                "_embedded": { "payment": [{ "state": state }] }
            });
            assert!(
                GatewayOrderState::from_document(doc).is_success(),
                "{state} should be a success state"
            );
        }
    }

    #[test]
    fn test_failed_state_is_not_success() {
        let doc = json!({
            "_embedded": { "payment": [{ "state": "FAILED" }] }
        });
        let state = GatewayOrderState::from_document(doc);
        assert!(!state.is_success());
        assert_eq!(state.state, "FAILED");
    }

    #[test]
    fn test_state_falls_back_to_order_level() {
        let doc = json!({ "state": "cancelled" });
        let state = GatewayOrderState::from_document(doc);
        assert_eq!(state.state, "CANCELLED");
        assert!(!state.is_success());
    }

    #[test]
    fn test_failure_message_prefers_gateway_reason() {
        let doc = json!({
            "_embedded": {
                "payment": [{
                    "state": "FAILED",
                    "authResponse": { "resultMessage": "Insufficient funds" }
                }]
            }
        });
        let state = GatewayOrderState::from_document(doc);
        assert_eq!(state.failure_message(), "Insufficient funds");
    }

    #[test]
    fn test_failure_message_default_names_state() {
        let doc = json!({ "state": "STARTED" });
        let state = GatewayOrderState::from_document(doc);
        assert!(state.failure_message().contains("STARTED"));
    }
}
