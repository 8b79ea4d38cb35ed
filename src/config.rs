// Runtime configuration loaded once in main and shared through AppState

use std::collections::HashMap;
use std::time::Duration;

/// Flat delivery fee lookup keyed by emirate.
///
/// Pickup orders never incur a charge; delivery orders pay the fee for
/// their emirate, falling back to `default_charge` for emirates without an
/// explicit entry.
#[derive(Debug, Clone)]
pub struct DeliveryCharges {
    charges: HashMap<String, i64>,
    default_charge: i64,
}

impl DeliveryCharges {
    pub fn new(charges: HashMap<String, i64>, default_charge: i64) -> Self {
        Self {
            charges,
            default_charge,
        }
    }

    /// Charge for a delivery to the given emirate, in whole currency units.
    pub fn for_emirate(&self, emirate: &str) -> i64 {
        self.charges
            .get(emirate.to_uppercase().as_str())
            .copied()
            .unwrap_or(self.default_charge)
    }
}

impl Default for DeliveryCharges {
    fn default() -> Self {
        let mut charges = HashMap::new();
        charges.insert("DUBAI".to_string(), 30);
        Self {
            charges,
            default_charge: 50,
        }
    }
}

/// Payment gateway settings (N-Genius style hosted-payment-page gateway).
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub api_url: String,
    pub outlet_ref: String,
    pub api_key: String,
    /// Bounded timeout for every outbound gateway request.
    pub request_timeout: Duration,
    pub web_redirect_url: String,
    pub web_cancel_url: String,
    pub mobile_redirect_url: String,
    pub mobile_cancel_url: String,
}

impl GatewayConfig {
    /// Load gateway configuration from environment variables.
    ///
    /// `API_URL` is the public base URL of this service, used to build the
    /// callback redirect URLs the gateway sends the shopper back to.
    pub fn from_env() -> Self {
        let api_base =
            std::env::var("API_URL").unwrap_or_else(|_| "http://localhost:8080".to_string());

        Self {
            api_url: std::env::var("GATEWAY_API_URL")
                .unwrap_or_else(|_| "https://api-gateway.sandbox.ngenius-payments.com".to_string()),
            outlet_ref: std::env::var("GATEWAY_OUTLET_REF").unwrap_or_default(),
            api_key: std::env::var("GATEWAY_API_KEY").unwrap_or_default(),
            request_timeout: Duration::from_secs(10),
            web_redirect_url: format!("{}/api/payments/callback", api_base),
            web_cancel_url: format!("{}/api/payments/callback?cancelled=true", api_base),
            mobile_redirect_url: format!("{}/api/payments/mobile-callback", api_base),
            mobile_cancel_url: format!("{}/api/payments/mobile-callback?cancelled=true", api_base),
        }
    }
}

/// Base URL of the storefront, used for post-payment redirects.
pub fn frontend_url() -> String {
    std::env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_delivery_charges() {
        let charges = DeliveryCharges::default();
        assert_eq!(charges.for_emirate("DUBAI"), 30);
        assert_eq!(charges.for_emirate("SHARJAH"), 50);
        assert_eq!(charges.for_emirate("ABU_DHABI"), 50);
    }

    #[test]
    fn test_emirate_lookup_is_case_insensitive() {
        let charges = DeliveryCharges::default();
        assert_eq!(charges.for_emirate("Dubai"), 30);
        assert_eq!(charges.for_emirate("dubai"), 30);
    }

    #[test]
    fn test_configured_table_overrides_defaults() {
        let mut table = HashMap::new();
        table.insert("DUBAI".to_string(), 25);
        table.insert("SHARJAH".to_string(), 40);
        let charges = DeliveryCharges::new(table, 60);
        assert_eq!(charges.for_emirate("DUBAI"), 25);
        assert_eq!(charges.for_emirate("SHARJAH"), 40);
        assert_eq!(charges.for_emirate("FUJAIRAH"), 60);
    }
}
