//! Mailtrail - bulk email dispatch and engagement tracking.
//!
//! This library implements the send pipeline of the Mailtrail CRM:
//! batch selection over a campaign's leads, merge-field
//! personalization, per-recipient link/pixel instrumentation, SMTP
//! transmission with per-recipient failure isolation, and the
//! delivery-log state machine (sent → opened / clicked / failed).
//!
//! ## Architecture
//!
//! ```text
//! POST /send/bulk → Dispatcher → merge → rewrite → SMTP → email_logs
//! GET  /open      ─┐
//! GET  /redirect  ─┴→ keyed updates on email_logs by tracking id
//! ```

pub mod auth;
pub mod batch;
pub mod config;
pub mod credentials;
pub mod dispatch;
pub mod error;
pub mod mailer;
pub mod merge;
pub mod store;
pub mod tracking;
pub mod web;

// Re-export commonly used types
pub use batch::Selection;
pub use config::Config;
pub use dispatch::{BulkSendReport, BulkSendRequest, SendOutcome};
pub use error::DispatchError;
pub use store::{CrmStore, MemoryStore};
pub use web::AppState;
