use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::Duration;
use tracing::{debug, error};

use crate::config::RazorpayConfig;
use crate::error::ServiceError;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: u64,
    pub currency: String,
    #[serde(default)]
    pub receipt: Option<String>,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Serialize)]
struct CreateGatewayOrder<'a> {
    amount: u64,
    currency: &'a str,
    receipt: &'a str,
}

/// Razorpay signs `"{order_id}|{payment_id}"` with the key secret.
pub fn verify_signature(key_secret: &str, order_id: &str, payment_id: &str, signature: &str) -> bool {
    let Ok(mut mac) = HmacSha256::new_from_slice(key_secret.as_bytes()) else {
        return false;
    };
    mac.update(format!("{}|{}", order_id, payment_id).as_bytes());
    let Ok(expected) = hex::decode(signature) else {
        return false;
    };
    mac.verify_slice(&expected).is_ok()
}

#[derive(Clone)]
pub struct RazorpayClient {
    http: reqwest::Client,
    config: RazorpayConfig,
}

impl RazorpayClient {
    pub fn new(config: RazorpayConfig) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| ServiceError::Internal(format!("payment client: {}", e)))?;
        Ok(RazorpayClient { http, config })
    }

    pub fn key_id(&self) -> &str {
        &self.config.key_id
    }

    pub fn verify(&self, order_id: &str, payment_id: &str, signature: &str) -> bool {
        verify_signature(&self.config.key_secret, order_id, payment_id, signature)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.config.api_url.trim_end_matches('/'), path)
    }

    pub async fn create_order(
        &self,
        amount: u64,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayOrder, ServiceError> {
        debug!("Creating gateway order for receipt {}", receipt);

        self.http
            .post(self.url("orders"))
            .basic_auth(&self.config.key_id, Some(&self.config.key_secret))
            .json(&CreateGatewayOrder { amount, currency, receipt })
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| {
                error!("Gateway order creation failed for {}: {}", receipt, e);
                ServiceError::Upstream("Unable to start online payment".to_string())
            })?
            .json()
            .await
            .map_err(|e| {
                error!("Unexpected gateway response for {}: {}", receipt, e);
                ServiceError::Upstream("Unable to start online payment".to_string())
            })
    }

    pub async fn fetch_order(&self, gateway_order_id: &str) -> Result<GatewayOrder, ServiceError> {
        debug!("Fetching gateway order {}", gateway_order_id);

        self.http
            .get(self.url(&format!("orders/{}", gateway_order_id)))
            .basic_auth(&self.config.key_id, Some(&self.config.key_secret))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| {
                error!("Gateway order lookup failed for {}: {}", gateway_order_id, e);
                ServiceError::PaymentFailed("Payment failed".to_string())
            })?
            .json()
            .await
            .map_err(|e| {
                error!("Unexpected gateway response for {}: {}", gateway_order_id, e);
                ServiceError::PaymentFailed("Payment failed".to_string())
            })
    }
}

/// Online checkout is optional; without credentials every online call fails cleanly.
pub struct Payments {
    client: Option<RazorpayClient>,
    currency: String,
}

impl Payments {
    pub fn new(client: Option<RazorpayClient>, currency: &str) -> Self {
        Payments {
            client,
            currency: currency.to_string(),
        }
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn gateway(&self) -> Result<&RazorpayClient, ServiceError> {
        self.client.as_ref().ok_or_else(|| {
            error!("Online payment attempted without gateway credentials");
            ServiceError::Upstream("Payment gateway not configured".to_string())
        })
    }
}
