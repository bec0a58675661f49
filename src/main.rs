mod api;
mod bulk;
#[cfg(test)]
mod testing;

use clap::{Parser, Subcommand};
use herald_channels::WhatsAppChannel;
use herald_core::{config, traits::Messenger};
use herald_store::Store;
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

#[derive(Parser)]
#[command(
    name = "herald",
    version,
    about = "Herald - WhatsApp outreach service"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file.
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the service: connect WhatsApp and serve the HTTP API.
    Start,
    /// Print the persisted session status.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load(&cli.config)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(cfg.herald.log_level.clone())
            }),
        )
        .init();

    match cli.command {
        Commands::Start => {
            // The database is the one hard dependency - refuse to start
            // without it. Everything else self-heals.
            let store = Store::new(&cfg.store).await?;

            let Some(wa) = cfg.channel.whatsapp.clone().filter(|w| w.enabled) else {
                anyhow::bail!(
                    "No channels enabled. Enable [channel.whatsapp] in {}.",
                    cli.config
                );
            };

            let channel = WhatsAppChannel::new(
                wa.clone(),
                &cfg.herald.deployment_id,
                &cfg.herald.data_dir,
                store.clone(),
            );
            let messenger: Arc<dyn Messenger> = Arc::new(channel);

            println!("{} - starting...", cfg.herald.name);
            messenger.connect().await?;

            let state = api::ApiState {
                messenger: messenger.clone(),
                store,
                deployment_id: cfg.herald.deployment_id.clone(),
                country_code: wa.country_code.clone(),
                bulk: cfg.bulk.clone(),
                api_key: if cfg.api.api_key.is_empty() {
                    None
                } else {
                    Some(cfg.api.api_key.clone())
                },
                uptime: Instant::now(),
            };

            api::serve(state, &cfg.api).await;

            if let Err(e) = messenger.stop().await {
                warn!("channel shutdown failed: {e}");
            }
        }
        Commands::Status => {
            println!("{} - Status Check\n", cfg.herald.name);
            println!("Config: {}", cli.config);

            let store = Store::new(&cfg.store).await?;
            match store.get_session(&cfg.herald.deployment_id).await? {
                Some(s) => {
                    println!(
                        "  session: {}",
                        if s.connected {
                            "connected"
                        } else {
                            "disconnected"
                        }
                    );
                    if let Some(phone) = s.phone_number {
                        println!("  phone: {phone}");
                    }
                    println!("  qr pending: {}", s.qr_code.is_some());
                    println!("  pairing code pending: {}", s.pairing_code.is_some());
                    println!("  last activity: {}", s.last_activity);
                }
                None => println!("  session: none"),
            }

            match cfg.channel.whatsapp {
                Some(ref wa) if wa.enabled => {
                    println!("  whatsapp: enabled (country code {})", wa.country_code)
                }
                Some(_) => println!("  whatsapp: disabled"),
                None => println!("  whatsapp: not configured"),
            }
        }
    }

    Ok(())
}
