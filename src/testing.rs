//! Test doubles shared by the bulk-engine and API tests.

use async_trait::async_trait;
use herald_core::{
    error::HeraldError,
    traits::Messenger,
    types::{CloseReason, ConnectionState, SendError},
};
use herald_store::Store;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// Create an in-memory store for testing.
pub async fn test_store() -> Store {
    let dir = std::env::temp_dir().join(format!("herald-test-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    Store::new(&herald_core::config::StoreConfig {
        db_path: dir.join("herald.db").to_string_lossy().to_string(),
    })
    .await
    .unwrap()
}

/// A mock messenger that records sends and can be scripted to fail.
pub struct MockMessenger {
    state: Mutex<ConnectionState>,
    texts: Mutex<Vec<(String, String)>>,
    images: Mutex<Vec<(String, Vec<u8>, String)>>,
    failures: Mutex<HashMap<String, SendError>>,
    unregistered: Mutex<HashSet<String>>,
    pairing_code: Mutex<Option<String>>,
    reset_calls: Mutex<u32>,
}

impl MockMessenger {
    fn with_state(state: ConnectionState) -> Self {
        Self {
            state: Mutex::new(state),
            texts: Mutex::new(Vec::new()),
            images: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
            unregistered: Mutex::new(HashSet::new()),
            pairing_code: Mutex::new(Some("ABCD1234".to_string())),
            reset_calls: Mutex::new(0),
        }
    }

    pub fn connected() -> Self {
        Self::with_state(ConnectionState::Open)
    }

    pub fn disconnected() -> Self {
        Self::with_state(ConnectionState::Closed(CloseReason::ConnectionLost))
    }

    /// Script a failure for sends to a specific normalized number.
    pub fn fail_number(&self, number: &str, err: SendError) {
        self.failures.lock().unwrap().insert(number.to_string(), err);
    }

    /// Mark a normalized number as not registered on the network.
    pub fn set_unregistered(&self, number: &str) {
        self.unregistered.lock().unwrap().insert(number.to_string());
    }

    pub fn sent_texts(&self) -> Vec<(String, String)> {
        self.texts.lock().unwrap().clone()
    }

    pub fn sent_images(&self) -> Vec<(String, Vec<u8>, String)> {
        self.images.lock().unwrap().clone()
    }

    pub fn reset_calls(&self) -> u32 {
        *self.reset_calls.lock().unwrap()
    }

    fn check_failure(&self, number: &str) -> Result<(), SendError> {
        if !self.state.lock().unwrap().is_open() {
            return Err(SendError::NotConnected);
        }
        if let Some(err) = self.failures.lock().unwrap().get(number) {
            return Err(err.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl Messenger for MockMessenger {
    fn name(&self) -> &str {
        "mock"
    }

    async fn connect(&self) -> Result<(), HeraldError> {
        Ok(())
    }

    async fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap()
    }

    async fn send_text(&self, number: &str, text: &str) -> Result<(), SendError> {
        self.check_failure(number)?;
        self.texts
            .lock()
            .unwrap()
            .push((number.to_string(), text.to_string()));
        Ok(())
    }

    async fn send_image(
        &self,
        number: &str,
        image: &[u8],
        caption: &str,
    ) -> Result<(), SendError> {
        self.check_failure(number)?;
        self.images
            .lock()
            .unwrap()
            .push((number.to_string(), image.to_vec(), caption.to_string()));
        Ok(())
    }

    async fn is_registered(&self, number: &str) -> Result<bool, SendError> {
        if !self.state.lock().unwrap().is_open() {
            return Err(SendError::NotConnected);
        }
        Ok(!self.unregistered.lock().unwrap().contains(number))
    }

    async fn request_pairing_code(&self, _number: &str) -> Result<String, HeraldError> {
        self.pairing_code
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| HeraldError::Channel("pairing unavailable".into()))
    }

    async fn reset_session(&self) -> Result<(), HeraldError> {
        *self.reset_calls.lock().unwrap() += 1;
        *self.state.lock().unwrap() = ConnectionState::Connecting;
        Ok(())
    }

    async fn stop(&self) -> Result<(), HeraldError> {
        Ok(())
    }
}
