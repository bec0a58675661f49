//! Messenger trait implementation for WhatsApp.

use super::send::{retry_send, split_message};
use super::{bot, WhatsAppChannel};
use async_trait::async_trait;
use chrono::Utc;
use herald_core::{
    error::HeraldError,
    phone::to_jid,
    traits::Messenger,
    types::{CloseReason, ConnectionState, SendError},
};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info};
use wacore_binary::jid::Jid;

/// How long a pairing-code request waits for the library to issue a code.
const PAIRING_CODE_WAIT_SECS: u64 = 30;

impl WhatsAppChannel {
    fn parse_jid(&self, number: &str) -> Result<Jid, SendError> {
        let jid_str = to_jid(number);
        jid_str
            .parse()
            .map_err(|e| SendError::Other(format!("invalid whatsapp JID '{jid_str}': {e}")))
    }

    /// Tear down any in-flight bot so a fresh one can be built.
    async fn teardown(&self) {
        if let Some(client) = self.shared.client.lock().await.take() {
            client.disconnect().await;
        }
        self.shared.set_state(ConnectionState::Idle).await;
    }
}

#[async_trait]
impl Messenger for WhatsAppChannel {
    fn name(&self) -> &str {
        "whatsapp"
    }

    async fn connect(&self) -> Result<(), HeraldError> {
        if !self.shared.try_begin_connect().await {
            info!("whatsapp connection already open or in flight");
            return Ok(());
        }

        if let Err(e) = self
            .shared
            .store
            .record_connecting(&self.shared.deployment_id)
            .await
        {
            tracing::warn!("failed to persist connecting state: {e}");
        }

        // Initialization failures are never terminal: log, mark closed, and
        // let the retry policy take over.
        if let Err(e) = bot::run_bot(self.shared.clone(), None).await {
            error!("whatsapp initialization failed: {e}");
            self.shared
                .set_state(ConnectionState::Closed(CloseReason::ConnectionLost))
                .await;
            bot::schedule_reconnect(self.shared.clone());
        }

        Ok(())
    }

    async fn state(&self) -> ConnectionState {
        self.shared.state().await
    }

    async fn send_text(&self, number: &str, text: &str) -> Result<(), SendError> {
        let client_guard = self.shared.client.lock().await;
        let client = client_guard.as_ref().ok_or(SendError::NotConnected)?;
        if !self.shared.state().await.is_open() {
            return Err(SendError::NotConnected);
        }

        let jid = self.parse_jid(number)?;

        let chunks = split_message(text, 4096);
        for chunk in chunks {
            let msg = waproto::whatsapp::Message {
                conversation: Some(chunk.to_string()),
                ..Default::default()
            };
            retry_send(client, &jid, msg).await?;
        }

        Ok(())
    }

    async fn send_image(
        &self,
        number: &str,
        image: &[u8],
        caption: &str,
    ) -> Result<(), SendError> {
        let client_guard = self.shared.client.lock().await;
        let client = client_guard.as_ref().ok_or(SendError::NotConnected)?;
        if !self.shared.state().await.is_open() {
            return Err(SendError::NotConnected);
        }

        let jid = self.parse_jid(number)?;

        let upload = client
            .upload(image.to_vec(), whatsapp_rust::download::MediaType::Image)
            .await
            .map_err(|e| SendError::Other(format!("image upload failed: {e}")))?;

        let msg = waproto::whatsapp::Message {
            image_message: Some(Box::new(waproto::whatsapp::message::ImageMessage {
                mimetype: Some("image/png".to_string()),
                caption: Some(caption.to_string()),
                url: Some(upload.url),
                direct_path: Some(upload.direct_path),
                media_key: Some(upload.media_key),
                file_enc_sha256: Some(upload.file_enc_sha256),
                file_sha256: Some(upload.file_sha256),
                file_length: Some(upload.file_length),
                ..Default::default()
            })),
            ..Default::default()
        };

        retry_send(client, &jid, msg).await?;
        Ok(())
    }

    async fn is_registered(&self, number: &str) -> Result<bool, SendError> {
        let client_guard = self.shared.client.lock().await;
        let client = client_guard.as_ref().ok_or(SendError::NotConnected)?;

        let result = client
            .contacts()
            .is_on_whatsapp(&[number])
            .await
            .map_err(|e| SendError::Other(format!("registration check failed: {e}")))?;

        Ok(!result.is_empty())
    }

    async fn request_pairing_code(&self, number: &str) -> Result<String, HeraldError> {
        if self.shared.state().await.is_open() {
            return Err(HeraldError::Channel(
                "already connected; start a new session first".into(),
            ));
        }

        let (tx, mut rx) = mpsc::channel::<String>(1);
        *self.shared.pair_code_tx.lock().await = Some(tx);

        // The pair-code flow is configured at bot build time, so any QR
        // handshake in flight is torn down and a fresh bot started.
        self.teardown().await;
        self.shared.try_begin_connect().await;

        if let Err(e) = bot::run_bot(self.shared.clone(), Some(number.to_string())).await {
            self.shared
                .set_state(ConnectionState::Closed(CloseReason::ConnectionLost))
                .await;
            return Err(e);
        }

        let code = tokio::time::timeout(Duration::from_secs(PAIRING_CODE_WAIT_SECS), rx.recv())
            .await
            .map_err(|_| HeraldError::Channel("timed out waiting for pairing code".into()))?
            .ok_or_else(|| HeraldError::Channel("pairing channel closed unexpectedly".into()))?;

        let expires_at = (Utc::now()
            + chrono::Duration::seconds(self.shared.config.pairing_expiry_secs as i64))
        .format("%Y-%m-%d %H:%M:%S")
        .to_string();

        self.shared
            .store
            .record_pairing_code(&self.shared.deployment_id, &code, number, &expires_at)
            .await?;

        Ok(code)
    }

    async fn reset_session(&self) -> Result<(), HeraldError> {
        info!("resetting whatsapp session");

        self.teardown().await;

        let session_dir = self.shared.session_dir();
        if std::path::Path::new(&session_dir).exists() {
            info!("deleting stale WhatsApp session at {session_dir}");
            let _ = std::fs::remove_dir_all(&session_dir);
        }

        self.shared
            .store
            .clear_session(&self.shared.deployment_id)
            .await?;

        self.connect().await
    }

    async fn stop(&self) -> Result<(), HeraldError> {
        info!("WhatsApp channel stopped");
        self.teardown().await;
        Ok(())
    }
}
