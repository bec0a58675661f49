//! The per-deployment session record.
//!
//! One row keyed by deployment id, upserted on every connection lifecycle
//! event and deleted wholesale on logout or an explicit new-session request.

use super::Store;
use herald_core::error::HeraldError;
use serde::Serialize;

/// Snapshot of the persisted session state.
#[derive(Debug, Clone, Serialize)]
pub struct SessionRecord {
    pub deployment_id: String,
    pub connected: bool,
    pub qr_code: Option<String>,
    pub pairing_code: Option<String>,
    pub pairing_expires_at: Option<String>,
    pub phone_number: Option<String>,
    pub connection_type: Option<String>,
    pub last_activity: String,
}

impl Store {
    /// Fetch the session record for a deployment, if one exists.
    pub async fn get_session(
        &self,
        deployment_id: &str,
    ) -> Result<Option<SessionRecord>, HeraldError> {
        let row: Option<(
            String,
            i64,
            Option<String>,
            Option<String>,
            Option<String>,
            Option<String>,
            Option<String>,
            String,
        )> = sqlx::query_as(
            "SELECT deployment_id, connected, qr_code, pairing_code, pairing_expires_at, \
                    phone_number, connection_type, last_activity \
             FROM sessions WHERE deployment_id = ?",
        )
        .bind(deployment_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| HeraldError::Store(format!("get session failed: {e}")))?;

        Ok(row.map(
            |(
                deployment_id,
                connected,
                qr_code,
                pairing_code,
                pairing_expires_at,
                phone_number,
                connection_type,
                last_activity,
            )| SessionRecord {
                deployment_id,
                connected: connected != 0,
                qr_code,
                pairing_code,
                pairing_expires_at,
                phone_number,
                connection_type,
                last_activity,
            },
        ))
    }

    /// A handshake attempt started: mark disconnected and touch activity.
    pub async fn record_connecting(&self, deployment_id: &str) -> Result<(), HeraldError> {
        sqlx::query(
            "INSERT INTO sessions (deployment_id, connected, last_activity) \
             VALUES (?, 0, datetime('now')) \
             ON CONFLICT(deployment_id) DO UPDATE SET \
                connected = 0, last_activity = datetime('now')",
        )
        .bind(deployment_id)
        .execute(&self.pool)
        .await
        .map_err(|e| HeraldError::Store(format!("record connecting failed: {e}")))?;
        Ok(())
    }

    /// A login QR was issued: persist the rendered image and clear any
    /// previous pairing code.
    pub async fn record_qr(&self, deployment_id: &str, qr: &str) -> Result<(), HeraldError> {
        sqlx::query(
            "INSERT INTO sessions (deployment_id, connected, qr_code, connection_type, last_activity) \
             VALUES (?, 0, ?, 'qr', datetime('now')) \
             ON CONFLICT(deployment_id) DO UPDATE SET \
                connected = 0, qr_code = excluded.qr_code, pairing_code = NULL, \
                pairing_expires_at = NULL, connection_type = 'qr', \
                last_activity = datetime('now')",
        )
        .bind(deployment_id)
        .bind(qr)
        .execute(&self.pool)
        .await
        .map_err(|e| HeraldError::Store(format!("record qr failed: {e}")))?;
        Ok(())
    }

    /// A pairing code was issued for the given phone; QR is superseded.
    pub async fn record_pairing_code(
        &self,
        deployment_id: &str,
        code: &str,
        phone_number: &str,
        expires_at: &str,
    ) -> Result<(), HeraldError> {
        sqlx::query(
            "INSERT INTO sessions (deployment_id, connected, pairing_code, pairing_expires_at, \
                                   phone_number, connection_type, last_activity) \
             VALUES (?, 0, ?, ?, ?, 'pairing', datetime('now')) \
             ON CONFLICT(deployment_id) DO UPDATE SET \
                connected = 0, pairing_code = excluded.pairing_code, \
                pairing_expires_at = excluded.pairing_expires_at, \
                phone_number = excluded.phone_number, qr_code = NULL, \
                connection_type = 'pairing', last_activity = datetime('now')",
        )
        .bind(deployment_id)
        .bind(code)
        .bind(expires_at)
        .bind(phone_number)
        .execute(&self.pool)
        .await
        .map_err(|e| HeraldError::Store(format!("record pairing code failed: {e}")))?;
        Ok(())
    }

    /// The connection opened: clear login artifacts, record the
    /// authenticated phone number when known.
    pub async fn record_connected(
        &self,
        deployment_id: &str,
        phone_number: Option<&str>,
    ) -> Result<(), HeraldError> {
        sqlx::query(
            "INSERT INTO sessions (deployment_id, connected, phone_number, last_activity) \
             VALUES (?, 1, ?, datetime('now')) \
             ON CONFLICT(deployment_id) DO UPDATE SET \
                connected = 1, qr_code = NULL, pairing_code = NULL, \
                pairing_expires_at = NULL, \
                phone_number = COALESCE(excluded.phone_number, sessions.phone_number), \
                last_activity = datetime('now')",
        )
        .bind(deployment_id)
        .bind(phone_number)
        .execute(&self.pool)
        .await
        .map_err(|e| HeraldError::Store(format!("record connected failed: {e}")))?;
        Ok(())
    }

    /// The connection closed without a logout: credentials stay valid.
    pub async fn record_disconnected(&self, deployment_id: &str) -> Result<(), HeraldError> {
        sqlx::query(
            "INSERT INTO sessions (deployment_id, connected, last_activity) \
             VALUES (?, 0, datetime('now')) \
             ON CONFLICT(deployment_id) DO UPDATE SET \
                connected = 0, last_activity = datetime('now')",
        )
        .bind(deployment_id)
        .execute(&self.pool)
        .await
        .map_err(|e| HeraldError::Store(format!("record disconnected failed: {e}")))?;
        Ok(())
    }

    /// Logout or explicit new-session: drop the record entirely so the next
    /// attempt starts from a fresh QR.
    pub async fn clear_session(&self, deployment_id: &str) -> Result<(), HeraldError> {
        sqlx::query("DELETE FROM sessions WHERE deployment_id = ?")
            .bind(deployment_id)
            .execute(&self.pool)
            .await
            .map_err(|e| HeraldError::Store(format!("clear session failed: {e}")))?;
        Ok(())
    }
}
