//! Contact upserts, listing, and stats.
//!
//! Every write is an upsert keyed on `phone_number` -- the PRIMARY KEY makes
//! duplicate contacts impossible even when sends race.

use super::Store;
use herald_core::error::HeraldError;
use serde::Serialize;

/// A stored contact.
#[derive(Debug, Clone, Serialize)]
pub struct Contact {
    pub phone_number: String,
    pub name: Option<String>,
    pub business_type: Option<String>,
    pub location: Option<String>,
    pub tags: Vec<String>,
    pub message_count: i64,
    pub status: String,
    pub last_contacted: Option<String>,
    pub source: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Fields accepted when creating a contact through the API.
#[derive(Debug, Clone, Default)]
pub struct NewContact {
    pub phone_number: String,
    pub name: Option<String>,
    pub business_type: Option<String>,
    pub location: Option<String>,
    pub tags: Vec<String>,
    pub source: Option<String>,
}

/// Aggregate counts for the stats endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ContactStats {
    pub total: i64,
    pub active: i64,
    pub inactive: i64,
    pub by_location: Vec<(Option<String>, i64)>,
}

pub(super) type ContactRow = (
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    String,
    i64,
    String,
    Option<String>,
    String,
    String,
    String,
);

pub(super) fn row_to_contact(row: ContactRow) -> Contact {
    let (
        phone_number,
        name,
        business_type,
        location,
        tags,
        message_count,
        status,
        last_contacted,
        source,
        created_at,
        updated_at,
    ) = row;
    Contact {
        phone_number,
        name,
        business_type,
        location,
        tags: serde_json::from_str(&tags).unwrap_or_default(),
        message_count,
        status,
        last_contacted,
        source,
        created_at,
        updated_at,
    }
}

const CONTACT_COLUMNS: &str = "phone_number, name, business_type, location, tags, \
     message_count, status, last_contacted, source, created_at, updated_at";

impl Store {
    /// Create or refresh a contact from API input. Existing rows keep their
    /// counters; descriptive fields are overwritten with the new values.
    pub async fn upsert_contact(&self, new: &NewContact) -> Result<Contact, HeraldError> {
        let tags = serde_json::to_string(&new.tags)
            .map_err(|e| HeraldError::Store(format!("encode tags failed: {e}")))?;
        let source = new.source.as_deref().unwrap_or("manual");

        sqlx::query(
            "INSERT INTO contacts (phone_number, name, business_type, location, tags, source) \
             VALUES (?, ?, ?, ?, ?, ?) \
             ON CONFLICT(phone_number) DO UPDATE SET \
                name = excluded.name, business_type = excluded.business_type, \
                location = excluded.location, tags = excluded.tags, \
                updated_at = datetime('now')",
        )
        .bind(&new.phone_number)
        .bind(&new.name)
        .bind(&new.business_type)
        .bind(&new.location)
        .bind(&tags)
        .bind(source)
        .execute(&self.pool)
        .await
        .map_err(|e| HeraldError::Store(format!("upsert contact failed: {e}")))?;

        self.get_contact(&new.phone_number)
            .await?
            .ok_or_else(|| HeraldError::Store("contact vanished after upsert".into()))
    }

    /// Fetch a single contact by phone number.
    pub async fn get_contact(&self, phone_number: &str) -> Result<Option<Contact>, HeraldError> {
        let row: Option<ContactRow> = sqlx::query_as(sqlx::AssertSqlSafe(format!(
            "SELECT {CONTACT_COLUMNS} FROM contacts WHERE phone_number = ?"
        )))
        .bind(phone_number)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| HeraldError::Store(format!("get contact failed: {e}")))?;

        Ok(row.map(row_to_contact))
    }

    /// Most recently contacted first.
    pub async fn list_contacts(&self, limit: i64) -> Result<Vec<Contact>, HeraldError> {
        let rows: Vec<ContactRow> = sqlx::query_as(sqlx::AssertSqlSafe(format!(
            "SELECT {CONTACT_COLUMNS} FROM contacts \
             ORDER BY last_contacted IS NULL, last_contacted DESC LIMIT ?"
        )))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| HeraldError::Store(format!("list contacts failed: {e}")))?;

        Ok(rows.into_iter().map(row_to_contact).collect())
    }

    /// Contacts selected for a bulk fallback: `active`, `new` (never
    /// messaged), or `all`.
    pub async fn contacts_for_send(&self, send_to: &str) -> Result<Vec<Contact>, HeraldError> {
        let sql = match send_to {
            "active" => format!(
                "SELECT {CONTACT_COLUMNS} FROM contacts WHERE status = 'active' \
                 ORDER BY phone_number"
            ),
            "new" => format!(
                "SELECT {CONTACT_COLUMNS} FROM contacts WHERE message_count = 0 \
                 ORDER BY phone_number"
            ),
            _ => format!("SELECT {CONTACT_COLUMNS} FROM contacts ORDER BY phone_number"),
        };

        let rows: Vec<ContactRow> = sqlx::query_as(sqlx::AssertSqlSafe(sql))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| HeraldError::Store(format!("contacts for send failed: {e}")))?;

        Ok(rows.into_iter().map(row_to_contact).collect())
    }

    /// Record a successful send: bump the counter, refresh last-contacted,
    /// and reactivate. Creates the row on first send.
    pub async fn record_send(&self, phone_number: &str) -> Result<(), HeraldError> {
        sqlx::query(
            "INSERT INTO contacts (phone_number, message_count, status, last_contacted, source) \
             VALUES (?, 1, 'active', datetime('now'), 'campaign') \
             ON CONFLICT(phone_number) DO UPDATE SET \
                message_count = message_count + 1, status = 'active', \
                last_contacted = datetime('now'), updated_at = datetime('now')",
        )
        .bind(phone_number)
        .execute(&self.pool)
        .await
        .map_err(|e| HeraldError::Store(format!("record send failed: {e}")))?;
        Ok(())
    }

    /// Set a contact's status (e.g. `inactive` when the number turns out not
    /// to be registered). Creates the row if needed.
    pub async fn mark_contact_status(
        &self,
        phone_number: &str,
        status: &str,
    ) -> Result<(), HeraldError> {
        sqlx::query(
            "INSERT INTO contacts (phone_number, status) VALUES (?, ?) \
             ON CONFLICT(phone_number) DO UPDATE SET \
                status = excluded.status, updated_at = datetime('now')",
        )
        .bind(phone_number)
        .bind(status)
        .execute(&self.pool)
        .await
        .map_err(|e| HeraldError::Store(format!("mark contact status failed: {e}")))?;
        Ok(())
    }

    /// Record a number surfaced by a detection sweep.
    pub async fn record_detected(&self, phone_number: &str) -> Result<(), HeraldError> {
        sqlx::query(
            "INSERT INTO contacts (phone_number, status, source) \
             VALUES (?, 'active', 'detection') \
             ON CONFLICT(phone_number) DO UPDATE SET \
                status = 'active', updated_at = datetime('now')",
        )
        .bind(phone_number)
        .execute(&self.pool)
        .await
        .map_err(|e| HeraldError::Store(format!("record detected failed: {e}")))?;
        Ok(())
    }

    /// Aggregate counts for the stats endpoint.
    pub async fn contact_stats(&self) -> Result<ContactStats, HeraldError> {
        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM contacts")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| HeraldError::Store(format!("contact stats failed: {e}")))?;

        let (active,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM contacts WHERE status = 'active'")
                .fetch_one(&self.pool)
                .await
                .map_err(|e| HeraldError::Store(format!("contact stats failed: {e}")))?;

        let by_location: Vec<(Option<String>, i64)> = sqlx::query_as(
            "SELECT location, COUNT(*) FROM contacts GROUP BY location ORDER BY COUNT(*) DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| HeraldError::Store(format!("contact stats failed: {e}")))?;

        Ok(ContactStats {
            total,
            active,
            inactive: total - active,
            by_location,
        })
    }
}
