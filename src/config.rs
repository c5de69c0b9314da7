// ABOUTME: Flat configuration record assembled by the binary and consumed by the gateway

use std::collections::HashMap;
use std::time::Duration;

/// Everything the composition root needs to wire a gateway process.
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    /// SMPP listener bind address.
    pub smpp_bind: String,
    /// MM4 listener bind address.
    pub mm4_bind: String,
    /// AMQP broker URL.
    pub amqp_url: String,
    /// Hostname announced in MM4 banners and HELO lines.
    pub local_host: String,
    /// Per-request timeout for carrier HTTP calls.
    pub carrier_timeout: Duration,
    /// Require exact number matches when attributing outbound sources;
    /// the default containment rule tolerates missing country codes.
    pub strict_number_match: bool,
    /// MM4 peer address per client username, for outbound MMS delivery.
    pub mm4_peers: HashMap<String, String>,
    /// Twilio credentials; absent means no twilio handler is registered.
    pub twilio: Option<TwilioConfig>,
}

#[derive(Clone, Debug)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    /// Override for tests and regional endpoints.
    pub api_base: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        GatewayConfig {
            smpp_bind: "0.0.0.0:2775".to_string(),
            mm4_bind: "0.0.0.0:2566".to_string(),
            amqp_url: "amqp://127.0.0.1:5672/%2f".to_string(),
            local_host: "smsgate.local".to_string(),
            carrier_timeout: Duration::from_secs(20),
            strict_number_match: false,
            mm4_peers: HashMap::new(),
            twilio: None,
        }
    }
}
