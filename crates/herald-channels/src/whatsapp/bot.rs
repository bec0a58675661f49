//! Bot lifecycle -- building, running, and reconnecting the WhatsApp bot.

use super::{events, Shared};
use crate::retry::RetryPolicy;
use herald_core::{
    error::HeraldError,
    types::{CloseReason, ConnectionState},
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use whatsapp_rust::bot::Bot;
use whatsapp_rust::pair_code::{PairCodeOptions, PlatformId};
use whatsapp_rust_sqlite_storage::SqliteStore;
use whatsapp_rust_tokio_transport::TokioWebSocketTransportFactory;
use whatsapp_rust_ureq_http_client::UreqHttpClient;

/// Build a WhatsApp bot with the shared event handler and run it in the
/// background.
///
/// Used for the initial handshake, reconnects, and the pair-code flow --
/// the event handler updates the same `Arc`-wrapped fields regardless of
/// which bot instance is running. When `pair_number` is set the bot is
/// built with the pair-code login flow instead of QR.
pub(super) async fn run_bot(shared: Shared, pair_number: Option<String>) -> Result<(), HeraldError> {
    let db_path = shared.session_db_path();

    info!("WhatsApp bot building (session: {db_path})...");

    let backend = Arc::new(
        SqliteStore::new(&db_path)
            .await
            .map_err(|e| HeraldError::Channel(format!("whatsapp store init failed: {e}")))?,
    );

    let ev_shared = shared.clone();

    let mut builder = Bot::builder()
        .with_backend(backend)
        .with_transport_factory(TokioWebSocketTransportFactory::new())
        .with_http_client(UreqHttpClient::new())
        .with_device_props(
            Some(shared.config.device_name.clone()),
            None,
            Some(waproto::whatsapp::device_props::PlatformType::Desktop),
        );

    if let Some(number) = pair_number {
        builder = builder.with_pair_code(PairCodeOptions {
            phone_number: number,
            show_push_notification: true,
            custom_code: None,
            platform_id: PlatformId::Chrome,
            platform_display: shared.config.device_name.clone(),
        });
    }

    let mut bot = builder
        .on_event(move |event, client| {
            let shared = ev_shared.clone();
            async move {
                events::handle_event(shared, event, client).await;
            }
        })
        .build()
        .await
        .map_err(|e| HeraldError::Channel(format!("whatsapp bot build failed: {e}")))?;

    // Store client reference immediately so sends work as soon as the
    // connection opens.
    *shared.client.lock().await = Some(bot.client());

    // Run bot in background.
    let _handle = bot
        .run()
        .await
        .map_err(|e| HeraldError::Channel(format!("whatsapp bot run failed: {e}")))?;

    info!("WhatsApp bot started");
    Ok(())
}

/// Schedule reconnect attempts per the configured retry policy.
///
/// One supervisor task per close; it keeps trying until a handshake starts
/// or the policy is exhausted. Attempts that lose the `Connecting` guard to
/// another caller stop silently.
pub(super) fn schedule_reconnect(shared: Shared) {
    tokio::spawn(async move {
        let policy = RetryPolicy::new(
            Duration::from_secs(shared.config.reconnect_delay_secs),
            shared.config.max_reconnect_attempts,
        );

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let Some(delay) = policy.next_delay(attempt) else {
                warn!("whatsapp reconnect giving up after {} attempts", attempt - 1);
                break;
            };

            info!(
                "whatsapp reconnecting in {}s (attempt {attempt})",
                delay.as_secs()
            );
            tokio::time::sleep(delay).await;

            if !shared.try_begin_connect().await {
                break;
            }
            if let Err(e) = shared.store.record_connecting(&shared.deployment_id).await {
                warn!("failed to persist connecting state: {e}");
            }

            match run_bot(shared.clone(), None).await {
                Ok(()) => break,
                Err(e) => {
                    error!("whatsapp reconnect attempt {attempt} failed: {e}");
                    shared
                        .set_state(ConnectionState::Closed(CloseReason::ConnectionLost))
                        .await;
                }
            }
        }
    });
}
