mod handler;
mod transcript;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chatwire_protocol::ChatId;
use chatwire_stream::{DEFAULT_HOST, DEFAULT_PORT, SubscriptionConfig, SubscriptionState, subscribe};
use clap::{Parser, ValueEnum};
use parking_lot::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::handler::TailHandler;
use crate::transcript::Transcript;

#[derive(Debug, Parser)]
#[command(name = "chatwire-tail")]
#[command(about = "Follow one chat subscription and log its transcript")]
struct Cli {
    #[arg(long, env = "CHATWIRE_CHAT_ID")]
    chat_id: String,
    #[arg(long, env = "CHATWIRE_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,
    #[arg(long, env = "CHATWIRE_HOST", default_value = DEFAULT_HOST)]
    host: String,
    /// Full base URL; overrides --host and --port.
    #[arg(long, env = "CHATWIRE_BASE_URL")]
    base_url: Option<String>,
    #[arg(long, env = "CHATWIRE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
    #[arg(long, default_value_t = 10)]
    connect_timeout_secs: u64,
    #[arg(long, value_enum, default_value_t = LogFormat::Compact)]
    log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Compact,
    Json,
}

impl Cli {
    fn subscription_config(&self) -> SubscriptionConfig {
        let mut config = SubscriptionConfig::new(self.chat_id.as_str(), self.port)
            .host(&self.host)
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs));
        if let Some(base_url) = &self.base_url {
            config = config.base_url(base_url);
        }
        if let Some(api_key) = &self.api_key {
            config = config.api_key(api_key);
        }
        config
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let transcript = Arc::new(Mutex::new(Transcript::new(ChatId::from(cli.chat_id.as_str()))));
    let handle = subscribe(
        cli.subscription_config(),
        TailHandler::new(transcript.clone()),
    )
    .context("failed to start subscription")?;
    info!(chat_id = %cli.chat_id, "subscription started");

    let token = handle.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, closing subscription");
            token.cancel();
        }
    });

    let state = handle.wait().await;
    let transcript = transcript.lock();
    info!(
        ?state,
        title = %transcript.thread().title,
        messages = transcript.messages().len(),
        runtime = %transcript.runtime().state,
        last_seq = transcript.last_seq().map(|seq| seq.as_str()).unwrap_or_default(),
        "subscription ended"
    );

    if state == SubscriptionState::Errored {
        bail!("subscription for chat {} failed", cli.chat_id);
    }
    Ok(())
}
