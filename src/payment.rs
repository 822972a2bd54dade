use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::{Id, Money};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSessionRequest {
    pub amount: Money,
    pub currency: String,
    pub booking_id: Id,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("payment provider error: {0}")]
pub struct PaymentError(pub String);

/// Abstract payment provider. Returns the client secret for the session.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout_session(&self, request: CheckoutSessionRequest) -> Result<String, PaymentError>;
}

/// Gateway for deployments without online payment; every call fails.
#[derive(Debug, Default)]
pub struct DisabledGateway;

#[async_trait]
impl PaymentGateway for DisabledGateway {
    async fn create_checkout_session(&self, _request: CheckoutSessionRequest) -> Result<String, PaymentError> {
        Err(PaymentError("online payment is not configured".into()))
    }
}
