//! Dispatch: the per-batch send loop and the single test send.
//!
//! Precondition failures (credentials, template, selection) abort the
//! invocation before any transmission. Once the loop starts, failures
//! are isolated per recipient: every lead gets exactly one
//! delivery-log row and one entry in the report, and a refused send
//! never skips the leads after it.

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::Caller;
use crate::batch::{self, Selection};
use crate::credentials::{self, CredentialSource};
use crate::error::DispatchError;
use crate::mailer::{MailBody, MailTransport, MailTransportFactory, OutboundEmail};
use crate::merge::merge;
use crate::store::{CrmStore, EmailStatus, NewEmailLog};
use crate::tracking::instrument_body;

/// One bulk-send invocation.
#[derive(Debug)]
pub struct BulkSendRequest {
    pub campaign_id: String,
    pub template_id: String,
    pub email_account_id: String,
    pub selection: Selection,
}

/// Per-lead outcome of a bulk send.
#[derive(Debug, Clone, Serialize)]
pub struct SendOutcome {
    pub lead_id: String,
    pub ok: bool,
    pub tracking_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregated result of one bulk-send invocation. This is the sole
/// output; the invocation has no side effects beyond the delivery log.
#[derive(Debug, Serialize)]
pub struct BulkSendReport {
    pub total: usize,
    pub ok: usize,
    pub failed: usize,
    pub results: Vec<SendOutcome>,
}

/// Send one batch of a campaign through a stored send account.
pub async fn send_bulk(
    store: &dyn CrmStore,
    mailer: &dyn MailTransportFactory,
    public_base_url: &str,
    default_from_name: &str,
    caller: &Caller,
    request: BulkSendRequest,
) -> Result<BulkSendReport, DispatchError> {
    // Fail-fast preconditions; nothing is sent until all of them hold.
    let descriptor = credentials::resolve(
        store,
        caller,
        CredentialSource::Account {
            account_id: request.email_account_id.clone(),
        },
    )
    .await?;

    let template = store
        .template(&request.template_id)
        .await?
        .ok_or_else(|| DispatchError::NotFound("template not found".into()))?;
    if !caller.may_access_org(&template.org_id) {
        return Err(DispatchError::Forbidden("forbidden template".into()));
    }

    let leads = batch::select_batch(store, &request.campaign_id, &request.selection).await?;

    info!(
        campaign_id = %request.campaign_id,
        template_id = %request.template_id,
        lead_count = leads.len(),
        "bulk_send_starting"
    );

    // One transport for the whole batch. It is dropped when this
    // function returns, closing its connections no matter how the
    // loop below ends.
    let transport = mailer
        .open(&descriptor)
        .await
        .map_err(|e| DispatchError::Smtp(e.to_string()))?;
    let from = descriptor.from_address(default_from_name);

    let mut results: Vec<SendOutcome> = Vec::with_capacity(leads.len());
    for lead in &leads {
        let tracking_id = Uuid::new_v4().to_string();
        let subject = merge(&template.subject, lead);
        let body = instrument_body(
            &merge(&template.body_html, lead),
            public_base_url,
            &tracking_id,
        );

        let email = OutboundEmail {
            from: from.clone(),
            to: lead.email.clone(),
            subject,
            body: MailBody::Html(body),
        };

        let outcome = match transport.send(&email).await {
            Ok(()) => {
                info!(
                    lead_id = %lead.lead_id,
                    tracking_id = %tracking_id,
                    "lead_send_ok"
                );
                SendOutcome {
                    lead_id: lead.lead_id.clone(),
                    ok: true,
                    tracking_id: tracking_id.clone(),
                    error: None,
                }
            }
            Err(e) => {
                warn!(
                    lead_id = %lead.lead_id,
                    tracking_id = %tracking_id,
                    error = %e,
                    "lead_send_failed"
                );
                SendOutcome {
                    lead_id: lead.lead_id.clone(),
                    ok: false,
                    tracking_id: tracking_id.clone(),
                    error: Some(e.to_string()),
                }
            }
        };

        let entry = NewEmailLog {
            campaign_id: request.campaign_id.clone(),
            lead_id: lead.lead_id.clone(),
            template_id: template.template_id.clone(),
            sent_by: Some(caller.user_id.clone()),
            status: if outcome.ok {
                EmailStatus::Sent
            } else {
                EmailStatus::Failed
            },
            tracking_id,
            error: outcome.error.clone(),
        };
        // A lost log row must not abort the remaining recipients.
        if let Err(e) = store.insert_email_log(entry).await {
            warn!(lead_id = %lead.lead_id, error = %e, "email_log_insert_failed");
        }

        results.push(outcome);
    }

    let ok = results.iter().filter(|r| r.ok).count();
    let failed = results.len() - ok;
    info!(total = results.len(), ok, failed, "bulk_send_complete");

    Ok(BulkSendReport {
        total: results.len(),
        ok,
        failed,
        results,
    })
}

/// One test send to confirm SMTP settings, resolved at the boundary
/// from either a stored account or raw fields.
#[derive(Debug)]
pub struct TestSendRequest {
    pub source: CredentialSource,
    pub to: Option<String>,
}

const TEST_SUBJECT: &str = "Test email from CRM";
const TEST_BODY: &str = "This is a test email to confirm your SMTP settings are working.";

pub async fn send_test(
    store: &dyn CrmStore,
    mailer: &dyn MailTransportFactory,
    default_from_name: &str,
    caller: &Caller,
    request: TestSendRequest,
) -> Result<(), DispatchError> {
    let descriptor = credentials::resolve(store, caller, request.source).await?;

    let to = request
        .to
        .filter(|t| !t.is_empty())
        .or_else(|| descriptor.from_email.clone().filter(|e| !e.is_empty()))
        .unwrap_or_else(|| descriptor.username.clone());

    let transport = mailer
        .open(&descriptor)
        .await
        .map_err(|e| DispatchError::Smtp(e.to_string()))?;

    let email = OutboundEmail {
        from: descriptor.from_address(default_from_name),
        to: to.clone(),
        subject: TEST_SUBJECT.to_string(),
        body: MailBody::Plain(TEST_BODY.to_string()),
    };

    transport
        .send(&email)
        .await
        .map_err(|e| DispatchError::Smtp(e.to_string()))?;

    info!(to = %to, "test_send_ok");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailer::testing::RecordingMailer;
    use crate::store::{AccountCredentials, EmailTemplate, Lead, MemoryStore};

    const BASE: &str = "https://crm.example.com";

    fn seed(store: &MemoryStore, lead_count: usize) {
        store.add_account(AccountCredentials {
            account_id: "acc-1".to_string(),
            org_id: "org-a".to_string(),
            from_name: Some("Sales".to_string()),
            from_email: Some("sales@example.com".to_string()),
            smtp_host: "smtp.example.com".to_string(),
            smtp_port: 587,
            smtp_username: "mailer@example.com".to_string(),
            smtp_password: Some("pw".to_string()),
        });
        store.add_template(EmailTemplate {
            template_id: "t-1".to_string(),
            org_id: "org-a".to_string(),
            subject: "Hi {{first_name}}".to_string(),
            body_html: "<p>Hello {{full_name}}</p><a href=\"https://example.com/offer\">offer</a>"
                .to_string(),
        });
        for i in 1..=lead_count {
            store.add_lead(Lead {
                lead_id: format!("L{i}"),
                email: format!("l{i}@example.com"),
                full_name: Some(format!("Lead {i}")),
                company: None,
                phone: None,
                campaign_id: "c-1".to_string(),
            });
        }
    }

    fn request() -> BulkSendRequest {
        BulkSendRequest {
            campaign_id: "c-1".to_string(),
            template_id: "t-1".to_string(),
            email_account_id: "acc-1".to_string(),
            selection: Selection::from_parts(None, None, None),
        }
    }

    fn caller() -> Caller {
        Caller::org_member("u-1", "org-a")
    }

    #[tokio::test]
    async fn test_send_bulk_happy_path() {
        let store = MemoryStore::new();
        seed(&store, 3);
        let mailer = RecordingMailer::new();

        let report = send_bulk(&store, &mailer, BASE, "CRM", &caller(), request())
            .await
            .unwrap();

        assert_eq!(report.total, 3);
        assert_eq!(report.ok, 3);
        assert_eq!(report.failed, 0);

        let sent = mailer.sent();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0].from, "Sales <sales@example.com>");
        assert_eq!(sent[0].subject, "Hi Lead");
        assert_eq!(store.logs().len(), 3);
    }

    #[tokio::test]
    async fn test_send_bulk_one_failure_does_not_abort_the_batch() {
        let store = MemoryStore::new();
        seed(&store, 3);
        let mailer = RecordingMailer::failing_for(&["l2@example.com"]);

        let report = send_bulk(&store, &mailer, BASE, "CRM", &caller(), request())
            .await
            .unwrap();

        assert_eq!(report.total, 3);
        assert_eq!(report.ok, 2);
        assert_eq!(report.failed, 1);

        let failed: Vec<_> = report.results.iter().filter(|r| !r.ok).collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].lead_id, "L2");
        assert!(failed[0].error.as_deref().is_some_and(|e| !e.is_empty()));

        let logs = store.logs();
        assert_eq!(logs.len(), 3);
        assert_eq!(
            logs.iter().filter(|l| l.status == EmailStatus::Sent).count(),
            2
        );
        let failed_log = logs
            .iter()
            .find(|l| l.status == EmailStatus::Failed)
            .unwrap();
        assert_eq!(failed_log.lead_id, "L2");
        assert!(failed_log.error.as_deref().is_some_and(|e| !e.is_empty()));
    }

    #[tokio::test]
    async fn test_send_bulk_bodies_are_keyed_per_recipient() {
        let store = MemoryStore::new();
        seed(&store, 2);
        let mailer = RecordingMailer::new();

        let report = send_bulk(&store, &mailer, BASE, "CRM", &caller(), request())
            .await
            .unwrap();

        assert_ne!(report.results[0].tracking_id, report.results[1].tracking_id);

        let sent = mailer.sent();
        let bodies: Vec<&str> = sent
            .iter()
            .map(|e| match &e.body {
                MailBody::Html(h) => h.as_str(),
                MailBody::Plain(p) => p.as_str(),
            })
            .collect();
        assert_ne!(bodies[0], bodies[1]);
        for (body, outcome) in bodies.iter().zip(&report.results) {
            assert!(body.contains(&outcome.tracking_id));
            assert!(body.contains("/redirect?tid="));
            assert!(body.contains("/open?tid="));
        }
        // The log rows carry the same tracking ids as the report.
        for outcome in &report.results {
            assert!(store.log_by_tracking_id(&outcome.tracking_id).is_some());
        }
    }

    #[tokio::test]
    async fn test_send_bulk_cross_org_template_is_forbidden() {
        let store = MemoryStore::new();
        seed(&store, 1);
        store.add_template(EmailTemplate {
            template_id: "t-2".to_string(),
            org_id: "org-b".to_string(),
            subject: "s".to_string(),
            body_html: "b".to_string(),
        });
        let mailer = RecordingMailer::new();

        let mut req = request();
        req.template_id = "t-2".to_string();
        let err = send_bulk(&store, &mailer, BASE, "CRM", &caller(), req)
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::Forbidden(_)));
        assert!(mailer.sent().is_empty());
        assert!(store.logs().is_empty());
    }

    #[tokio::test]
    async fn test_send_bulk_no_leads_aborts_before_any_send() {
        let store = MemoryStore::new();
        seed(&store, 0);
        let mailer = RecordingMailer::new();

        let err = send_bulk(&store, &mailer, BASE, "CRM", &caller(), request())
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::NoEligibleLeads));
        assert!(mailer.sent().is_empty());
        assert!(store.logs().is_empty());
    }

    #[tokio::test]
    async fn test_send_bulk_transport_open_failure_aborts_cleanly() {
        let store = MemoryStore::new();
        seed(&store, 2);
        let mailer = RecordingMailer {
            refuse_open: Some("relay down".to_string()),
            ..Default::default()
        };

        let err = send_bulk(&store, &mailer, BASE, "CRM", &caller(), request())
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::Smtp(_)));
        assert!(store.logs().is_empty());
    }

    #[tokio::test]
    async fn test_send_test_uses_to_fallback_chain() {
        let store = MemoryStore::new();
        seed(&store, 0);
        let mailer = RecordingMailer::new();

        send_test(
            &store,
            &mailer,
            "CRM",
            &caller(),
            TestSendRequest {
                source: CredentialSource::Account {
                    account_id: "acc-1".to_string(),
                },
                to: None,
            },
        )
        .await
        .unwrap();

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "sales@example.com");
        assert_eq!(sent[0].subject, "Test email from CRM");
    }

    #[tokio::test]
    async fn test_send_test_raw_missing_fields() {
        let store = MemoryStore::new();
        let mailer = RecordingMailer::new();

        let err = send_test(
            &store,
            &mailer,
            "CRM",
            &Caller::admin("u-1"),
            TestSendRequest {
                source: CredentialSource::Raw {
                    host: String::new(),
                    port: 587,
                    username: "u".to_string(),
                    password: "p".to_string(),
                    from_name: None,
                    from_email: None,
                },
                to: None,
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, DispatchError::InvalidInput(_)));
        assert!(mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_send_test_refused_send_surfaces_as_smtp_error() {
        let store = MemoryStore::new();
        seed(&store, 0);
        let mailer = RecordingMailer::failing_for(&["sales@example.com"]);

        let err = send_test(
            &store,
            &mailer,
            "CRM",
            &caller(),
            TestSendRequest {
                source: CredentialSource::Account {
                    account_id: "acc-1".to_string(),
                },
                to: None,
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, DispatchError::Smtp(_)));
    }
}
