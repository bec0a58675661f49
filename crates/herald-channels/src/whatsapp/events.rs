//! Connection lifecycle event handling.
//!
//! Every handler persists the transition in the session record before
//! touching in-process state, so the HTTP status endpoints always reflect
//! the last observed lifecycle event.

use super::{bot, qr, Shared};
use herald_core::types::{CloseReason, ConnectionState};
use std::sync::Arc;
use tracing::{debug, info, warn};
use wacore::types::events::Event;
use whatsapp_rust::client::Client;

/// Dispatch a `whatsapp-rust` event against the shared channel state.
pub(super) async fn handle_event(shared: Shared, event: Event, client: Arc<Client>) {
    match event {
        Event::PairingQrCode { code, .. } => on_qr(&shared, &code).await,
        Event::PairingCode { code, .. } => on_pairing_code(&shared, code).await,
        Event::PairSuccess(info) => {
            info!("WhatsApp pairing successful");
            *shared.pair_phone.lock().await = Some(info.id.user.clone());
        }
        Event::Connected(_) => on_connected(&shared, client).await,
        Event::Disconnected(_) => on_close(&shared, CloseReason::ConnectionLost).await,
        Event::LoggedOut(_) => on_close(&shared, CloseReason::LoggedOut).await,
        _ => {}
    }
}

/// A login QR was issued: render it and persist the lifecycle metadata.
async fn on_qr(shared: &Shared, code: &str) {
    info!("WhatsApp QR code generated (scan to pair)");
    debug!("QR data: {code}");

    match qr::qr_data_url(code) {
        Ok(data_url) => {
            if let Err(e) = shared.store.record_qr(&shared.deployment_id, &data_url).await {
                warn!("failed to persist QR code: {e}");
            }
        }
        Err(e) => warn!("QR rendering failed: {e}"),
    }
}

/// A pairing code was issued: forward it to the waiting request, if any.
async fn on_pairing_code(shared: &Shared, code: String) {
    info!("WhatsApp pairing code issued");
    if let Some(sender) = shared.pair_code_tx.lock().await.as_ref() {
        let _ = sender.send(code).await;
    }
}

async fn on_connected(shared: &Shared, client: Arc<Client>) {
    info!("WhatsApp connected");

    *shared.client.lock().await = Some(client);
    shared.set_state(ConnectionState::Open).await;

    let phone = shared.pair_phone.lock().await.take();
    if let Err(e) = shared
        .store
        .record_connected(&shared.deployment_id, phone.as_deref())
        .await
    {
        warn!("failed to persist connected state: {e}");
    }
}

/// Connection closed. A logout invalidates the stored credentials, so all
/// session artifacts are dropped and the next attempt starts from a fresh
/// QR; any other close keeps them and just flags the session disconnected.
/// Either way exactly one reconnect supervisor is scheduled.
async fn on_close(shared: &Shared, reason: CloseReason) {
    let state = shared.state().await;
    if !state.is_open() {
        // Teardown paths (reset, pair-code restart) disconnect on purpose.
        debug!("ignoring close event while {}", state.label());
        return;
    }

    *shared.client.lock().await = None;
    shared.set_state(ConnectionState::Closed(reason)).await;

    match reason {
        CloseReason::LoggedOut => {
            warn!("WhatsApp logged out -- session invalidated");
            let session_dir = shared.session_dir();
            if std::path::Path::new(&session_dir).exists() {
                info!("deleting stale WhatsApp session at {session_dir}");
                let _ = std::fs::remove_dir_all(&session_dir);
            }
            if let Err(e) = shared.store.clear_session(&shared.deployment_id).await {
                warn!("failed to clear session record: {e}");
            }
        }
        CloseReason::ConnectionLost => {
            warn!("WhatsApp disconnected");
            if let Err(e) = shared.store.record_disconnected(&shared.deployment_id).await {
                warn!("failed to persist disconnected state: {e}");
            }
        }
    }

    bot::schedule_reconnect(shared.clone());
}
