// SPDX-FileCopyrightText: 2026 Turnkey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SMS delivery for verification codes, with manual-link fallback.
//!
//! Implements [`NotificationChannel`] over a generic HTTP SMS gateway.
//! Delivery is best-effort: any provider failure degrades to a
//! manually-shareable deep link built from the send context. Deployments
//! without a gateway use [`ManualLink`], which always falls back.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use turnkey_config::model::SmsConfig;
use turnkey_core::types::{Delivery, HealthStatus, Phone};
use turnkey_core::{NotificationChannel, TurnkeyError};

/// Build the manual verification deep link for a send context.
fn fallback_link(base_url: &str, context: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), context)
}

/// Request body understood by the gateway.
#[derive(Debug, Serialize)]
struct GatewayRequest<'a> {
    to: &'a str,
    message: &'a str,
    sender_id: &'a str,
}

/// Response body returned by the gateway on success.
#[derive(Debug, Deserialize)]
struct GatewayResponse {
    #[serde(default)]
    message_id: Option<String>,
}

/// HTTP SMS gateway channel.
pub struct SmsGateway {
    http: reqwest::Client,
    gateway_url: String,
    api_key: String,
    config: SmsConfig,
}

impl SmsGateway {
    /// Creates a gateway channel. Requires `sms.gateway_url` and
    /// `sms.api_key` to be configured.
    pub fn new(config: SmsConfig) -> Result<Self, TurnkeyError> {
        let gateway_url = config
            .gateway_url
            .clone()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| {
                TurnkeyError::Config("sms.gateway_url is required for the SMS gateway".into())
            })?;
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                TurnkeyError::Config("sms.api_key is required for the SMS gateway".into())
            })?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TurnkeyError::Channel {
                message: "failed to build HTTP client".into(),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            http,
            gateway_url,
            api_key,
            config,
        })
    }
}

#[async_trait]
impl NotificationChannel for SmsGateway {
    fn name(&self) -> &str {
        "sms-gateway"
    }

    async fn send(
        &self,
        to: &Phone,
        message: &str,
        context: &str,
    ) -> Result<Delivery, TurnkeyError> {
        let body = GatewayRequest {
            to: to.as_str(),
            message,
            sender_id: &self.config.sender_id,
        };

        let response = self
            .http
            .post(&self.gateway_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => {
                let parsed: GatewayResponse = resp.json().await.unwrap_or(GatewayResponse {
                    message_id: None,
                });
                debug!(
                    to = %to,
                    provider_id = parsed.message_id.as_deref().unwrap_or("-"),
                    "sms accepted by gateway"
                );
                Ok(Delivery::Sent {
                    provider_id: parsed.message_id,
                })
            }
            Ok(resp) => {
                warn!(to = %to, status = %resp.status(), "gateway rejected sms, falling back");
                Ok(Delivery::Fallback {
                    link: fallback_link(&self.config.fallback_base_url, context),
                })
            }
            Err(e) => {
                warn!(to = %to, error = %e, "gateway unreachable, falling back");
                Ok(Delivery::Fallback {
                    link: fallback_link(&self.config.fallback_base_url, context),
                })
            }
        }
    }

    async fn health_check(&self) -> Result<HealthStatus, TurnkeyError> {
        match self.http.get(&self.gateway_url).send().await {
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Degraded(format!(
                "gateway unreachable, sends will fall back: {e}"
            ))),
        }
    }
}

/// Channel for deployments without an SMS provider: every send produces
/// the manual deep link.
pub struct ManualLink {
    fallback_base_url: String,
}

impl ManualLink {
    pub fn new(fallback_base_url: impl Into<String>) -> Self {
        Self {
            fallback_base_url: fallback_base_url.into(),
        }
    }
}

#[async_trait]
impl NotificationChannel for ManualLink {
    fn name(&self) -> &str {
        "manual-link"
    }

    async fn send(
        &self,
        to: &Phone,
        _message: &str,
        context: &str,
    ) -> Result<Delivery, TurnkeyError> {
        let link = fallback_link(&self.fallback_base_url, context);
        debug!(to = %to, %link, "manual-link delivery");
        Ok(Delivery::Fallback { link })
    }
}

/// Pick the channel implied by configuration: the gateway when one is
/// configured, the manual link otherwise.
pub fn from_config(
    config: &SmsConfig,
) -> Result<std::sync::Arc<dyn NotificationChannel>, TurnkeyError> {
    if config.gateway_url.is_some() {
        Ok(std::sync::Arc::new(SmsGateway::new(config.clone())?))
    } else {
        Ok(std::sync::Arc::new(ManualLink::new(
            config.fallback_base_url.clone(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_partial_json, header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn config(gateway_url: Option<String>) -> SmsConfig {
        SmsConfig {
            gateway_url,
            api_key: Some("test-key".into()),
            sender_id: "TURNKY".into(),
            fallback_base_url: "https://verify.example/v/".into(),
            timeout_secs: 2,
        }
    }

    fn phone() -> Phone {
        Phone::normalize("9876543210").unwrap()
    }

    #[tokio::test]
    async fn successful_send_reports_provider_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(serde_json::json!({
                "to": "9876543210",
                "sender_id": "TURNKY",
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "message_id": "prov-42",
                })),
            )
            .mount(&server)
            .await;

        let gateway = SmsGateway::new(config(Some(server.uri()))).unwrap();
        let delivery = gateway.send(&phone(), "123456 is your code", "rec-1").await.unwrap();
        assert_eq!(
            delivery,
            Delivery::Sent {
                provider_id: Some("prov-42".into())
            }
        );
    }

    #[tokio::test]
    async fn provider_error_falls_back_with_link() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let gateway = SmsGateway::new(config(Some(server.uri()))).unwrap();
        let delivery = gateway.send(&phone(), "123456", "rec-7").await.unwrap();
        assert_eq!(
            delivery,
            Delivery::Fallback {
                link: "https://verify.example/v/rec-7".into()
            }
        );
    }

    #[tokio::test]
    async fn unreachable_gateway_falls_back() {
        // Nothing listens on this port.
        let gateway = SmsGateway::new(config(Some("http://127.0.0.1:1".into()))).unwrap();
        let delivery = gateway.send(&phone(), "123456", "rec-9").await.unwrap();
        assert!(matches!(delivery, Delivery::Fallback { .. }));
    }

    #[tokio::test]
    async fn manual_link_always_falls_back() {
        let channel = ManualLink::new("https://verify.example/v");
        let delivery = channel.send(&phone(), "123456", "rec-3").await.unwrap();
        assert_eq!(
            delivery,
            Delivery::Fallback {
                link: "https://verify.example/v/rec-3".into()
            }
        );
    }

    #[test]
    fn gateway_requires_credentials() {
        let mut c = config(Some("https://sms.example/send".into()));
        c.api_key = None;
        assert!(SmsGateway::new(c).is_err());
        assert!(SmsGateway::new(config(None)).is_err());
    }

    #[tokio::test]
    async fn from_config_picks_channel() {
        let with_gateway = from_config(&config(Some("https://sms.example/send".into()))).unwrap();
        assert_eq!(with_gateway.name(), "sms-gateway");

        let without = from_config(&config(None)).unwrap();
        assert_eq!(without.name(), "manual-link");
    }
}
