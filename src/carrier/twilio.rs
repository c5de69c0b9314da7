// ABOUTME: Twilio carrier handler: message submission through the Messages REST endpoint
// ABOUTME: Form-encoded POST with basic auth; non-2xx answers surface as rejections

use crate::carrier::{CarrierError, CarrierHandler};
use crate::config::TwilioConfig;
use crate::message::MsgQueueItem;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Tag under which the handler registers (spec Section 6).
pub const TWILIO_TAG: &str = "twilio";

const DEFAULT_API_BASE: &str = "https://api.twilio.com";

pub struct TwilioHandler {
    http: reqwest::Client,
    account_sid: String,
    auth_token: String,
    api_base: String,
}

impl TwilioHandler {
    /// Build a handler with its own pooled HTTP client. The timeout applies
    /// per request; the client itself is internally thread-safe, so the
    /// router can dispatch concurrently without further locking.
    pub fn new(config: &TwilioConfig, timeout: Duration) -> Result<Self, CarrierError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(TwilioHandler {
            http,
            account_sid: config.account_sid.clone(),
            auth_token: config.auth_token.clone(),
            api_base: config
                .api_base
                .clone()
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
        })
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.api_base, self.account_sid
        )
    }

    async fn post_message(&self, form: &[(&str, &str)]) -> Result<(), CarrierError> {
        let response = self
            .http
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(form)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(CarrierError::Rejected(format!("{status}: {body}")))
    }
}

#[async_trait]
impl CarrierHandler for TwilioHandler {
    async fn send_sms(&self, msg: &MsgQueueItem) -> Result<(), CarrierError> {
        let body = msg.content.text().unwrap_or_default();
        debug!(log_id = %msg.log_id, to = %msg.to, "submitting SMS to twilio");
        self.post_message(&[
            ("To", msg.to.as_str()),
            ("From", msg.from.as_str()),
            ("Body", body),
        ])
        .await
    }

    async fn send_mms(&self, msg: &MsgQueueItem) -> Result<(), CarrierError> {
        // The MM4 envelope is opaque to the gateway; what Twilio accepts on
        // this endpoint is the textual body, so the part payload is passed
        // through as-is.
        let body = msg
            .content
            .envelope()
            .map(|envelope| String::from_utf8_lossy(&envelope.body).into_owned())
            .unwrap_or_default();
        debug!(log_id = %msg.log_id, to = %msg.to, "submitting MMS to twilio");
        self.post_message(&[
            ("To", msg.to.as_str()),
            ("From", msg.from.as_str()),
            ("Body", body.as_str()),
        ])
        .await
    }
}
