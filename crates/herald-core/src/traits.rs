use crate::{
    error::HeraldError,
    types::{ConnectionState, SendError},
};
use async_trait::async_trait;

/// Messaging client trait -- the one seam between the HTTP surface / bulk
/// engine and the WhatsApp library.
///
/// Request handlers receive an `Arc<dyn Messenger>` by dependency injection;
/// tests substitute a mock. All numbers passed in are already normalized
/// (see [`crate::phone::format_phone_number`]).
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Human-readable channel name.
    fn name(&self) -> &str;

    /// Begin or resume the connection handshake.
    ///
    /// No-op if an attempt is already in flight. Failures are logged and
    /// retried internally -- never surfaced as terminal to the caller.
    async fn connect(&self) -> Result<(), HeraldError>;

    /// Current connection lifecycle state.
    async fn state(&self) -> ConnectionState;

    /// Send a text message to a normalized number.
    async fn send_text(&self, number: &str, text: &str) -> Result<(), SendError>;

    /// Send a PNG/JPEG image with a caption to a normalized number.
    async fn send_image(&self, number: &str, image: &[u8], caption: &str)
        -> Result<(), SendError>;

    /// Whether the number has a WhatsApp account.
    async fn is_registered(&self, number: &str) -> Result<bool, SendError>;

    /// Request a pairing code that links a phone without scanning a QR.
    async fn request_pairing_code(&self, number: &str) -> Result<String, HeraldError>;

    /// Discard all local session state and restart the handshake,
    /// forcing a fresh QR on the next attempt.
    async fn reset_session(&self) -> Result<(), HeraldError>;

    /// Graceful shutdown.
    async fn stop(&self) -> Result<(), HeraldError>;
}
