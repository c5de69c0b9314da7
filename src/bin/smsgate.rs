// ABOUTME: Gateway binary: parses flags, installs logging, loads boot data, runs the gateway
// ABOUTME: Carrier credentials come from the environment so they never land in process listings

pub(crate) use argh::FromArgs;
use smsgate::Gateway;
use smsgate::addressing::Client;
use smsgate::config::{GatewayConfig, TwilioConfig};
use std::error::Error;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

/// Carrier-facing SMS/MMS gateway
#[derive(FromArgs)]
struct CliArgs {
    /// whether or not to enable debug logging
    #[argh(switch, short = 'd')]
    debugging: bool,

    /// the SMPP listener bind address (default: 0.0.0.0:2775)
    #[argh(option)]
    smpp_bind: Option<String>,

    /// the MM4 listener bind address (default: 0.0.0.0:2566)
    #[argh(option)]
    mm4_bind: Option<String>,

    /// the AMQP broker URL (default: amqp://127.0.0.1:5672/%2f)
    #[argh(option)]
    amqp_url: Option<String>,

    /// the hostname announced on MM4 banners
    #[argh(option)]
    local_host: Option<String>,

    /// require exact number matches for outbound source attribution
    #[argh(switch)]
    strict_numbers: bool,

    /// path to the JSON file with client and number records
    #[argh(option, short = 'c')]
    clients: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli_args: CliArgs = argh::from_env();

    let level = if cli_args.debugging {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let mut config = GatewayConfig::default();
    if let Some(smpp_bind) = cli_args.smpp_bind {
        config.smpp_bind = smpp_bind;
    }
    if let Some(mm4_bind) = cli_args.mm4_bind {
        config.mm4_bind = mm4_bind;
    }
    if let Some(amqp_url) = cli_args.amqp_url {
        config.amqp_url = amqp_url;
    }
    if let Some(local_host) = cli_args.local_host {
        config.local_host = local_host;
    }
    config.strict_number_match = cli_args.strict_numbers;
    config.twilio = twilio_from_env();
    if config.twilio.is_none() {
        warn!("TWILIO_ACCOUNT_SID/TWILIO_AUTH_TOKEN unset, no twilio handler registered");
    }

    let raw = std::fs::read(&cli_args.clients)?;
    let clients: Vec<Client> = serde_json::from_slice(&raw)?;
    info!(
        clients = clients.len(),
        numbers = clients.iter().map(|c| c.numbers.len()).sum::<usize>(),
        "loaded address records"
    );

    Gateway::new(config, clients)?.run().await?;
    Ok(())
}

fn twilio_from_env() -> Option<TwilioConfig> {
    let account_sid = std::env::var("TWILIO_ACCOUNT_SID").ok()?;
    let auth_token = std::env::var("TWILIO_AUTH_TOKEN").ok()?;
    Some(TwilioConfig {
        account_sid,
        auth_token,
        api_base: std::env::var("TWILIO_API_BASE").ok(),
    })
}
