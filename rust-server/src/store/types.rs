//! Record types read and written through the CRM store.
//!
//! Leads, templates and send accounts are owned by their management
//! surfaces and are read-only here. Email logs are owned by this
//! pipeline: one row per send attempt, updated later by the tracking
//! endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A prospective contact targeted by a campaign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub lead_id: String,
    pub email: String,
    /// Full display name; merge tokens fall back to empty when absent.
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub campaign_id: String,
}

/// Reusable subject/HTML-body pair with merge tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailTemplate {
    pub template_id: String,
    pub org_id: String,
    pub subject: String,
    pub body_html: String,
}

/// Decrypted SMTP credentials for a send account.
///
/// `smtp_password` is `None` when the stored secret could not be
/// decrypted (missing key); resolution surfaces that as a recoverable
/// operator error rather than proceeding.
#[derive(Debug, Clone)]
pub struct AccountCredentials {
    pub account_id: String,
    pub org_id: String,
    pub from_name: Option<String>,
    pub from_email: Option<String>,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: Option<String>,
}

/// Delivery-log status, monotonic in engagement terms.
///
/// `clicked` may be recorded without an earlier `opened` (a link can be
/// clicked from a preview before the pixel fires); that is normal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailStatus {
    Sent,
    Failed,
    Opened,
    Clicked,
}

/// Durable per-recipient record of a send attempt and its engagement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailLog {
    pub log_id: String,
    pub campaign_id: String,
    pub lead_id: String,
    pub template_id: String,
    /// User id of the caller who dispatched the send.
    pub sent_by: Option<String>,
    pub status: EmailStatus,
    /// Opaque token minted per send attempt, immutable thereafter.
    pub tracking_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub sent_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opened_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clicked_at: Option<DateTime<Utc>>,
}

/// Insert shape for a new delivery-log row.
///
/// The store assigns the row id and the sent timestamp.
#[derive(Debug, Clone)]
pub struct NewEmailLog {
    pub campaign_id: String,
    pub lead_id: String,
    pub template_id: String,
    pub sent_by: Option<String>,
    pub status: EmailStatus,
    pub tracking_id: String,
    pub error: Option<String>,
}
