//! Payment gateway over REST (no SDK)

use super::{PaymentError, PaymentGateway, PaymentIntent, PaymentOutcome};
use async_trait::async_trait;
use serde::Deserialize;
use shared::models::PaymentMethod;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct IntentResponse {
    id: String,
    #[serde(default)]
    redirect_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ConfirmResponse {
    status: String,
    #[serde(default)]
    failure_reason: Option<String>,
}

/// Gateway speaking a small intent/confirm JSON API with a bearer secret
#[derive(Debug, Clone)]
pub struct HttpPaymentGateway {
    http: reqwest::Client,
    base_url: String,
    secret: String,
}

impl HttpPaymentGateway {
    pub fn new(
        base_url: impl Into<String>,
        secret: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, PaymentError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            secret: secret.into(),
        })
    }

    async fn post_json(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, PaymentError> {
        let resp = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.secret)
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        let value: serde_json::Value = resp.json().await?;
        if !status.is_success() {
            let message = value["error"]
                .as_str()
                .map(String::from)
                .unwrap_or_else(|| format!("HTTP {status}"));
            return Err(PaymentError::Rejected(message));
        }
        Ok(value)
    }
}

fn parse_intent(value: serde_json::Value) -> Result<PaymentIntent, PaymentError> {
    let resp: IntentResponse = serde_json::from_value(value.clone())
        .map_err(|e| PaymentError::InvalidResponse(e.to_string()))?;
    if resp.id.trim().is_empty() {
        return Err(PaymentError::InvalidResponse("empty intent id".to_string()));
    }
    Ok(PaymentIntent {
        id: resp.id,
        redirect_url: resp.redirect_url,
        details: Some(value),
    })
}

fn parse_confirm(value: serde_json::Value) -> Result<PaymentOutcome, PaymentError> {
    let resp: ConfirmResponse =
        serde_json::from_value(value).map_err(|e| PaymentError::InvalidResponse(e.to_string()))?;
    match resp.status.as_str() {
        "succeeded" => Ok(PaymentOutcome::Succeeded),
        "failed" | "canceled" => Ok(PaymentOutcome::Failed(
            resp.failure_reason.unwrap_or(resp.status),
        )),
        other => Err(PaymentError::InvalidResponse(format!(
            "unexpected intent status: {other}"
        ))),
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn create_intent(
        &self,
        order_id: i64,
        amount: f64,
        method: PaymentMethod,
    ) -> Result<PaymentIntent, PaymentError> {
        let body = serde_json::json!({
            "order_id": order_id,
            "amount": amount,
            "payment_method": method,
        });
        parse_intent(self.post_json("/v1/payment_intents", &body).await?)
    }

    async fn confirm(&self, intent_id: &str) -> Result<PaymentOutcome, PaymentError> {
        let path = format!("/v1/payment_intents/{intent_id}/confirm");
        parse_confirm(self.post_json(&path, &serde_json::json!({})).await?)
    }
}

/// Used when no gateway is configured; every call fails
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredGateway;

#[async_trait]
impl PaymentGateway for UnconfiguredGateway {
    async fn create_intent(
        &self,
        _order_id: i64,
        _amount: f64,
        _method: PaymentMethod,
    ) -> Result<PaymentIntent, PaymentError> {
        Err(PaymentError::NotConfigured)
    }

    async fn confirm(&self, _intent_id: &str) -> Result<PaymentOutcome, PaymentError> {
        Err(PaymentError::NotConfigured)
    }
}
