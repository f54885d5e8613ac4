//! Opaque CRUD seam over the CRM's relational store.
//!
//! The schema and row-level access control live outside this pipeline;
//! everything here goes through [`CrmStore`]. The bundled
//! [`MemoryStore`] backs tests and the development server.

pub mod memory;
pub mod types;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

pub use memory::MemoryStore;
pub use types::{AccountCredentials, EmailLog, EmailStatus, EmailTemplate, Lead, NewEmailLog};

/// Backing-store failure. Opaque by design; callers decide whether to
/// surface it (dispatch preconditions) or swallow it (tracking updates).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// CRUD operations this pipeline needs from the CRM store.
///
/// Leads are returned in the store's stable order (insertion order for
/// the bundled implementation). The two `mark_*` calls are keyed writes
/// by tracking id: last write wins and a missing row is a no-op, so
/// concurrent open/click events race harmlessly.
#[async_trait]
pub trait CrmStore: Send + Sync {
    async fn template(&self, template_id: &str) -> Result<Option<EmailTemplate>, StoreError>;

    async fn campaign_leads(&self, campaign_id: &str) -> Result<Vec<Lead>, StoreError>;

    /// Fetch the decrypted credential record for a send account.
    async fn account_credentials(
        &self,
        account_id: &str,
    ) -> Result<Option<AccountCredentials>, StoreError>;

    async fn insert_email_log(&self, entry: NewEmailLog) -> Result<(), StoreError>;

    async fn mark_opened(&self, tracking_id: &str, at: DateTime<Utc>) -> Result<(), StoreError>;

    async fn mark_clicked(&self, tracking_id: &str, at: DateTime<Utc>) -> Result<(), StoreError>;
}
