use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::PhoneError;

/// Suffix the gateway uses to route a target through WhatsApp.
const WHATSAPP_CHANNEL_SUFFIX: &str = "|a";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendOutcome {
    pub delivered: bool,
    pub raw_response: Option<String>,
}

impl SendOutcome {
    fn failed(raw_response: Option<String>) -> Self {
        Self {
            delivered: false,
            raw_response,
        }
    }
}

/// Outbound messaging gateway. Implementations resolve every failure into a
/// `SendOutcome` instead of an error.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn send(&self, phone: &str, message: &str) -> SendOutcome;
}

/// Turns a free-form phone number into the gateway's `0xxxxxxxxx|a` target.
pub fn normalize_target(raw: &str) -> Result<String, PhoneError> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() < 10 {
        return Err(PhoneError::TooShort {
            raw: raw.to_string(),
            digits: digits.len(),
        });
    }

    let local = if digits.len() >= 12 && digits.starts_with("62") {
        format!("0{}", &digits[2..])
    } else if !digits.starts_with('0') {
        format!("0{digits}")
    } else {
        digits
    };

    Ok(format!("{local}{WHATSAPP_CHANNEL_SUFFIX}"))
}

#[derive(Serialize)]
struct SendPayload<'a> {
    target: &'a str,
    message: &'a str,
}

/// HTTP client for the Fonnte WhatsApp API.
pub struct FonnteGateway {
    client: reqwest::Client,
    url: String,
    api_key: String,
}

impl FonnteGateway {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let api_key = api_key.into();
        if api_key.is_empty() {
            tracing::warn!("gateway API key is empty; every send will likely be rejected");
        }
        Ok(Self {
            client,
            url: url.into(),
            api_key,
        })
    }
}

#[async_trait]
impl Gateway for FonnteGateway {
    async fn send(&self, phone: &str, message: &str) -> SendOutcome {
        let target = match normalize_target(phone) {
            Ok(target) => target,
            Err(err) => {
                tracing::warn!("{err}");
                return SendOutcome::failed(None);
            }
        };

        tracing::debug!(%target, "sending WhatsApp message");
        let response = self
            .client
            .post(&self.url)
            .header("Authorization", &self.api_key)
            .json(&SendPayload {
                target: &target,
                message,
            })
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(%target, "gateway request failed: {err}");
                return SendOutcome::failed(None);
            }
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => Some(body),
            Err(err) => {
                tracing::warn!(%target, "failed to read gateway response body: {err}");
                None
            }
        };

        if status == reqwest::StatusCode::OK {
            tracing::info!(%target, "WhatsApp message delivered to gateway");
            SendOutcome {
                delivered: true,
                raw_response: body,
            }
        } else {
            tracing::warn!(
                %target,
                status = status.as_u16(),
                body = body.as_deref().unwrap_or_default(),
                "gateway rejected message"
            );
            SendOutcome::failed(body)
        }
    }
}
