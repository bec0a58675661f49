//! WhatsApp channel -- pure Rust implementation via `whatsapp-rust`.
//!
//! Uses the WhatsApp Web protocol (Noise handshake + Signal encryption).
//! Pairing is done by scanning a QR code or entering a pairing code.
//! Protocol session state is persisted to
//! `{data_dir}/whatsapp_session/whatsapp.db`.

mod bot;
mod channel;
mod events;
mod qr;
mod send;


pub use qr::{generate_qr_image, qr_data_url};

use herald_core::{
    config::{shellexpand, WhatsAppConfig},
    types::ConnectionState,
};
use herald_store::Store;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// Handles shared between the channel, the bot event callbacks, and the
/// reconnect supervisor. Everything is `Arc`-wrapped so a rebuilt bot keeps
/// updating the same state.
#[derive(Clone)]
pub(crate) struct Shared {
    pub(crate) config: WhatsAppConfig,
    pub(crate) deployment_id: String,
    pub(crate) data_dir: String,
    pub(crate) store: Store,
    /// Client handle for sending messages -- set once the bot is built.
    pub(crate) client: Arc<Mutex<Option<Arc<whatsapp_rust::client::Client>>>>,
    /// Connection lifecycle state; `Connecting` doubles as the re-entrancy
    /// guard for `connect()`.
    pub(crate) state: Arc<Mutex<ConnectionState>>,
    /// Forwards pairing codes from the running bot to a waiting request.
    pub(crate) pair_code_tx: Arc<Mutex<Option<mpsc::Sender<String>>>>,
    /// Phone number captured from a pair-success event, recorded on connect.
    pub(crate) pair_phone: Arc<Mutex<Option<String>>>,
}

impl Shared {
    /// Claim the right to start a handshake. Returns `false` when one is
    /// already in flight or the connection is open.
    pub(crate) async fn try_begin_connect(&self) -> bool {
        let mut state = self.state.lock().await;
        match *state {
            ConnectionState::Connecting | ConnectionState::Open => false,
            _ => {
                *state = ConnectionState::Connecting;
                true
            }
        }
    }

    pub(crate) async fn set_state(&self, new: ConnectionState) {
        *self.state.lock().await = new;
    }

    pub(crate) async fn state(&self) -> ConnectionState {
        *self.state.lock().await
    }

    /// Directory holding the library's protocol session database.
    pub(crate) fn session_dir(&self) -> String {
        let dir = shellexpand(&self.data_dir);
        format!("{dir}/whatsapp_session")
    }

    /// Get the session database path, creating the directory if needed.
    pub(crate) fn session_db_path(&self) -> String {
        let session_dir = self.session_dir();
        let _ = std::fs::create_dir_all(&session_dir);
        format!("{session_dir}/whatsapp.db")
    }
}

/// WhatsApp channel using the WhatsApp Web protocol.
pub struct WhatsAppChannel {
    shared: Shared,
}

impl WhatsAppChannel {
    /// Create a new WhatsApp channel from config.
    pub fn new(config: WhatsAppConfig, deployment_id: &str, data_dir: &str, store: Store) -> Self {
        Self {
            shared: Shared {
                config,
                deployment_id: deployment_id.to_string(),
                data_dir: data_dir.to_string(),
                store,
                client: Arc::new(Mutex::new(None)),
                state: Arc::new(Mutex::new(ConnectionState::Idle)),
                pair_code_tx: Arc::new(Mutex::new(None)),
                pair_phone: Arc::new(Mutex::new(None)),
            },
        }
    }

    /// Check if the WhatsApp connection is currently open.
    pub async fn is_connected(&self) -> bool {
        self.shared.state().await.is_open()
    }
}
