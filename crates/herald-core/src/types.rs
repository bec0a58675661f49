use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a connection closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// The device was unlinked -- session credentials are invalid.
    LoggedOut,
    /// Transport dropped or handshake failed; credentials may still be good.
    ConnectionLost,
}

/// Connection lifecycle state for the single WhatsApp client.
///
/// `Connecting` doubles as the re-entrancy guard: a second `connect()`
/// while a handshake is in flight is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Closed(CloseReason),
}

impl ConnectionState {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    pub fn is_connecting(&self) -> bool {
        matches!(self, Self::Connecting)
    }

    /// Human-readable label for status output.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed(CloseReason::LoggedOut) => "logged_out",
            Self::Closed(CloseReason::ConnectionLost) => "closed",
        }
    }
}

/// Per-destination send failure.
///
/// `NotRegistered` is a structured replacement for matching on error message
/// substrings -- the bulk loop uses it to mark a contact inactive.
#[derive(Debug, Clone, Error)]
pub enum SendError {
    #[error("whatsapp not connected")]
    NotConnected,

    #[error("{0} is not registered on whatsapp")]
    NotRegistered(String),

    #[error("send failed: {0}")]
    Other(String),
}
