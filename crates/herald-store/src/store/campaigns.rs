//! Named bulk jobs with sent/failed counters.

use super::Store;
use herald_core::error::HeraldError;
use serde::Serialize;
use uuid::Uuid;

/// A stored campaign.
#[derive(Debug, Clone, Serialize)]
pub struct Campaign {
    pub id: String,
    pub name: String,
    pub message: String,
    pub contacts: Vec<String>,
    pub sent: i64,
    pub failed: i64,
    pub status: String,
    pub created_at: String,
}

type CampaignRow = (String, String, String, String, i64, i64, String, String);

fn row_to_campaign(row: CampaignRow) -> Campaign {
    let (id, name, message, contacts, sent, failed, status, created_at) = row;
    Campaign {
        id,
        name,
        message,
        contacts: serde_json::from_str(&contacts).unwrap_or_default(),
        sent,
        failed,
        status,
        created_at,
    }
}

impl Store {
    /// Create a campaign in `draft` state.
    pub async fn create_campaign(
        &self,
        name: &str,
        message: &str,
        contacts: &[String],
    ) -> Result<Campaign, HeraldError> {
        let id = Uuid::new_v4().to_string();
        let encoded = serde_json::to_string(contacts)
            .map_err(|e| HeraldError::Store(format!("encode contacts failed: {e}")))?;

        sqlx::query("INSERT INTO campaigns (id, name, message, contacts) VALUES (?, ?, ?, ?)")
            .bind(&id)
            .bind(name)
            .bind(message)
            .bind(&encoded)
            .execute(&self.pool)
            .await
            .map_err(|e| HeraldError::Store(format!("create campaign failed: {e}")))?;

        self.get_campaign(&id)
            .await?
            .ok_or_else(|| HeraldError::Store("campaign vanished after insert".into()))
    }

    pub async fn get_campaign(&self, id: &str) -> Result<Option<Campaign>, HeraldError> {
        let row: Option<CampaignRow> = sqlx::query_as(
            "SELECT id, name, message, contacts, sent, failed, status, created_at \
             FROM campaigns WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| HeraldError::Store(format!("get campaign failed: {e}")))?;

        Ok(row.map(row_to_campaign))
    }

    pub async fn list_campaigns(&self) -> Result<Vec<Campaign>, HeraldError> {
        let rows: Vec<CampaignRow> = sqlx::query_as(
            "SELECT id, name, message, contacts, sent, failed, status, created_at \
             FROM campaigns ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| HeraldError::Store(format!("list campaigns failed: {e}")))?;

        Ok(rows.into_iter().map(row_to_campaign).collect())
    }

    pub async fn mark_campaign_running(&self, id: &str) -> Result<(), HeraldError> {
        sqlx::query("UPDATE campaigns SET status = 'running' WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| HeraldError::Store(format!("mark campaign running failed: {e}")))?;
        Ok(())
    }

    /// Persist final counters and complete the campaign.
    pub async fn record_campaign_result(
        &self,
        id: &str,
        sent: i64,
        failed: i64,
    ) -> Result<(), HeraldError> {
        sqlx::query("UPDATE campaigns SET sent = ?, failed = ?, status = 'completed' WHERE id = ?")
            .bind(sent)
            .bind(failed)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| HeraldError::Store(format!("record campaign result failed: {e}")))?;
        Ok(())
    }
}
