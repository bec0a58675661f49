//! Filter-based contact groupings.
//!
//! A category is a saved filter predicate plus a cached contact count. The
//! count is refreshed whenever the category is resolved to its contacts.

use super::contacts::Contact;
use super::Store;
use herald_core::error::HeraldError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The filter predicate stored with a category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryFilters {
    #[serde(default)]
    pub business_types: Vec<String>,
    #[serde(default)]
    pub locations: Vec<String>,
    #[serde(default)]
    pub min_messages: i64,
    #[serde(default = "default_max_messages")]
    pub max_messages: i64,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub contacted_from: Option<String>,
    #[serde(default)]
    pub contacted_to: Option<String>,
}

fn default_max_messages() -> i64 {
    1000
}

fn default_status() -> String {
    "active".to_string()
}

impl Default for CategoryFilters {
    fn default() -> Self {
        Self {
            business_types: Vec::new(),
            locations: Vec::new(),
            min_messages: 0,
            max_messages: default_max_messages(),
            status: default_status(),
            contacted_from: None,
            contacted_to: None,
        }
    }
}

impl CategoryFilters {
    /// Whether a contact matches this predicate. Range filters run in SQL;
    /// the list/date filters are applied here.
    pub fn matches(&self, contact: &Contact) -> bool {
        if !self.business_types.is_empty() {
            match &contact.business_type {
                Some(bt) if self.business_types.contains(bt) => {}
                _ => return false,
            }
        }
        if !self.locations.is_empty() {
            match &contact.location {
                Some(loc) if self.locations.contains(loc) => {}
                _ => return false,
            }
        }
        if let Some(ref from) = self.contacted_from {
            match &contact.last_contacted {
                Some(lc) if lc.as_str() >= from.as_str() => {}
                _ => return false,
            }
        }
        if let Some(ref to) = self.contacted_to {
            match &contact.last_contacted {
                Some(lc) if lc.as_str() <= to.as_str() => {}
                _ => return false,
            }
        }
        true
    }
}

/// A stored category.
#[derive(Debug, Clone, Serialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub color: String,
    pub filters: CategoryFilters,
    pub contact_count: i64,
    pub created_at: String,
}

type CategoryRow = (String, String, Option<String>, String, String, i64, String);

fn row_to_category(row: CategoryRow) -> Category {
    let (id, name, description, color, filters, contact_count, created_at) = row;
    Category {
        id,
        name,
        description,
        color,
        filters: serde_json::from_str(&filters).unwrap_or_default(),
        contact_count,
        created_at,
    }
}

impl Store {
    /// Create a category (unique by name).
    pub async fn create_category(
        &self,
        name: &str,
        description: Option<&str>,
        color: Option<&str>,
        filters: &CategoryFilters,
    ) -> Result<Category, HeraldError> {
        let id = Uuid::new_v4().to_string();
        let encoded = serde_json::to_string(filters)
            .map_err(|e| HeraldError::Store(format!("encode filters failed: {e}")))?;

        sqlx::query(
            "INSERT INTO categories (id, name, description, color, filters) \
             VALUES (?, ?, ?, COALESCE(?, '#25D366'), ?)",
        )
        .bind(&id)
        .bind(name)
        .bind(description)
        .bind(color)
        .bind(&encoded)
        .execute(&self.pool)
        .await
        .map_err(|e| HeraldError::Store(format!("create category failed: {e}")))?;

        self.get_category(&id)
            .await?
            .ok_or_else(|| HeraldError::Store("category vanished after insert".into()))
    }

    pub async fn get_category(&self, id: &str) -> Result<Option<Category>, HeraldError> {
        let row: Option<CategoryRow> = sqlx::query_as(
            "SELECT id, name, description, color, filters, contact_count, created_at \
             FROM categories WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| HeraldError::Store(format!("get category failed: {e}")))?;

        Ok(row.map(row_to_category))
    }

    pub async fn list_categories(&self) -> Result<Vec<Category>, HeraldError> {
        let rows: Vec<CategoryRow> = sqlx::query_as(
            "SELECT id, name, description, color, filters, contact_count, created_at \
             FROM categories ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| HeraldError::Store(format!("list categories failed: {e}")))?;

        Ok(rows.into_iter().map(row_to_category).collect())
    }

    /// Resolve a category to its matching contacts and refresh the cached
    /// count.
    pub async fn contacts_in_category(
        &self,
        category: &Category,
    ) -> Result<Vec<Contact>, HeraldError> {
        let candidates = self
            .contacts_matching(&category.filters.status, category.filters.min_messages,
                category.filters.max_messages)
            .await?;

        let matched: Vec<Contact> = candidates
            .into_iter()
            .filter(|c| category.filters.matches(c))
            .collect();

        sqlx::query("UPDATE categories SET contact_count = ? WHERE id = ?")
            .bind(matched.len() as i64)
            .bind(&category.id)
            .execute(&self.pool)
            .await
            .map_err(|e| HeraldError::Store(format!("refresh category count failed: {e}")))?;

        Ok(matched)
    }

    /// Contacts passing the SQL-expressible part of a category filter.
    async fn contacts_matching(
        &self,
        status: &str,
        min_messages: i64,
        max_messages: i64,
    ) -> Result<Vec<Contact>, HeraldError> {
        let rows: Vec<super::contacts::ContactRow> = sqlx::query_as(
            "SELECT phone_number, name, business_type, location, tags, message_count, status, \
                    last_contacted, source, created_at, updated_at \
             FROM contacts \
             WHERE status = ? AND message_count BETWEEN ? AND ? \
             ORDER BY phone_number",
        )
        .bind(status)
        .bind(min_messages)
        .bind(max_messages)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| HeraldError::Store(format!("category contacts failed: {e}")))?;

        Ok(rows
            .into_iter()
            .map(super::contacts::row_to_contact)
            .collect())
    }
}
