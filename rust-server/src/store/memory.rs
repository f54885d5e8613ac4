//! In-memory `CrmStore` used by tests and the development server.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::types::{
    AccountCredentials, EmailLog, EmailStatus, EmailTemplate, Lead, NewEmailLog,
};
use super::{CrmStore, StoreError};

#[derive(Default)]
struct Inner {
    templates: HashMap<String, EmailTemplate>,
    accounts: HashMap<String, AccountCredentials>,
    /// Leads in insertion order; campaign filtering preserves it.
    leads: Vec<Lead>,
    logs: Vec<EmailLog>,
}

/// Insertion-ordered in-memory store.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_template(&self, template: EmailTemplate) {
        let mut inner = self.inner.lock().unwrap();
        inner.templates.insert(template.template_id.clone(), template);
    }

    pub fn add_account(&self, account: AccountCredentials) {
        let mut inner = self.inner.lock().unwrap();
        inner.accounts.insert(account.account_id.clone(), account);
    }

    pub fn add_lead(&self, lead: Lead) {
        self.inner.lock().unwrap().leads.push(lead);
    }

    /// Snapshot of all delivery-log rows, in insertion order.
    pub fn logs(&self) -> Vec<EmailLog> {
        self.inner.lock().unwrap().logs.clone()
    }

    pub fn log_by_tracking_id(&self, tracking_id: &str) -> Option<EmailLog> {
        self.inner
            .lock()
            .unwrap()
            .logs
            .iter()
            .find(|l| l.tracking_id == tracking_id)
            .cloned()
    }
}

#[async_trait]
impl CrmStore for MemoryStore {
    async fn template(&self, template_id: &str) -> Result<Option<EmailTemplate>, StoreError> {
        Ok(self.inner.lock().unwrap().templates.get(template_id).cloned())
    }

    async fn campaign_leads(&self, campaign_id: &str) -> Result<Vec<Lead>, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .leads
            .iter()
            .filter(|l| l.campaign_id == campaign_id)
            .cloned()
            .collect())
    }

    async fn account_credentials(
        &self,
        account_id: &str,
    ) -> Result<Option<AccountCredentials>, StoreError> {
        Ok(self.inner.lock().unwrap().accounts.get(account_id).cloned())
    }

    async fn insert_email_log(&self, entry: NewEmailLog) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.logs.push(EmailLog {
            log_id: Uuid::new_v4().to_string(),
            campaign_id: entry.campaign_id,
            lead_id: entry.lead_id,
            template_id: entry.template_id,
            sent_by: entry.sent_by,
            status: entry.status,
            tracking_id: entry.tracking_id,
            error: entry.error,
            sent_at: Utc::now(),
            opened_at: None,
            clicked_at: None,
        });
        Ok(())
    }

    async fn mark_opened(&self, tracking_id: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(log) = inner.logs.iter_mut().find(|l| l.tracking_id == tracking_id) {
            log.status = EmailStatus::Opened;
            log.opened_at = Some(at);
        }
        Ok(())
    }

    async fn mark_clicked(&self, tracking_id: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(log) = inner.logs.iter_mut().find(|l| l.tracking_id == tracking_id) {
            log.status = EmailStatus::Clicked;
            log.clicked_at = Some(at);
        }
        Ok(())
    }
}
