//! Credential resolution for send accounts.
//!
//! The decrypted password exists only inside the returned descriptor;
//! callers scope it to a single send invocation and let it drop. The
//! descriptor's `Debug` never reveals the secret.

use std::fmt;

use crate::auth::Caller;
use crate::error::DispatchError;
use crate::store::CrmStore;

/// Where the SMTP credentials for an invocation come from.
#[derive(Debug, Clone)]
pub enum CredentialSource {
    /// A stored send account, decrypted just-in-time by the store.
    Account { account_id: String },
    /// Raw SMTP fields supplied directly by the caller. No ownership
    /// check applies; the caller vouches for fields it typed in.
    Raw {
        host: String,
        port: u16,
        username: String,
        password: String,
        from_name: Option<String>,
        from_email: Option<String>,
    },
}

/// Normalized SMTP connection descriptor plus sender identity.
#[derive(Clone)]
pub struct SmtpDescriptor {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_name: Option<String>,
    pub from_email: Option<String>,
}

impl SmtpDescriptor {
    /// From header for outgoing mail:
    /// `{from_name or default} <{from_email or username}>`.
    pub fn from_address(&self, default_from_name: &str) -> String {
        let name = self
            .from_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(default_from_name);
        let email = self
            .from_email
            .as_deref()
            .filter(|e| !e.is_empty())
            .unwrap_or(&self.username);
        format!("{name} <{email}>")
    }
}

impl fmt::Debug for SmtpDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpDescriptor")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("from_name", &self.from_name)
            .field("from_email", &self.from_email)
            .finish()
    }
}

/// Resolve a credential source to a connection descriptor.
///
/// Account resolution enforces organization ownership (administrators
/// bypass it) and fails when the stored password could not be
/// decrypted. Raw resolution only validates field presence.
pub async fn resolve(
    store: &dyn CrmStore,
    caller: &Caller,
    source: CredentialSource,
) -> Result<SmtpDescriptor, DispatchError> {
    match source {
        CredentialSource::Account { account_id } => {
            let account = store
                .account_credentials(&account_id)
                .await?
                .ok_or_else(|| DispatchError::NotFound("account not found".into()))?;

            if !caller.may_access_org(&account.org_id) {
                return Err(DispatchError::Forbidden("forbidden account".into()));
            }

            let password = account.smtp_password.ok_or_else(|| {
                DispatchError::CredentialUnavailable(
                    "no decrypted SMTP password available".into(),
                )
            })?;

            Ok(SmtpDescriptor {
                host: account.smtp_host,
                port: account.smtp_port,
                username: account.smtp_username,
                password,
                from_name: account.from_name,
                from_email: account.from_email,
            })
        }
        CredentialSource::Raw {
            host,
            port,
            username,
            password,
            from_name,
            from_email,
        } => {
            if host.is_empty() || port == 0 || username.is_empty() || password.is_empty() {
                return Err(DispatchError::InvalidInput(
                    "missing SMTP fields: host, port, username, password".into(),
                ));
            }
            Ok(SmtpDescriptor {
                host,
                port,
                username,
                password,
                from_name,
                from_email,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{AccountCredentials, MemoryStore};

    fn account(org_id: &str, password: Option<&str>) -> AccountCredentials {
        AccountCredentials {
            account_id: "acc-1".to_string(),
            org_id: org_id.to_string(),
            from_name: Some("Sales".to_string()),
            from_email: Some("sales@example.com".to_string()),
            smtp_host: "smtp.example.com".to_string(),
            smtp_port: 587,
            smtp_username: "mailer@example.com".to_string(),
            smtp_password: password.map(str::to_string),
        }
    }

    fn by_account() -> CredentialSource {
        CredentialSource::Account {
            account_id: "acc-1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_resolve_unknown_account_is_not_found() {
        let store = MemoryStore::new();
        let err = resolve(&store, &Caller::admin("u-1"), by_account())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_resolve_cross_org_account_is_forbidden() {
        let store = MemoryStore::new();
        store.add_account(account("org-b", Some("s3cret")));

        let err = resolve(&store, &Caller::org_member("u-1", "org-a"), by_account())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_resolve_admin_bypasses_ownership() {
        let store = MemoryStore::new();
        store.add_account(account("org-b", Some("s3cret")));

        let descriptor = resolve(&store, &Caller::admin("u-1"), by_account())
            .await
            .unwrap();
        assert_eq!(descriptor.host, "smtp.example.com");
        assert_eq!(descriptor.password, "s3cret");
    }

    #[tokio::test]
    async fn test_resolve_undecryptable_password() {
        let store = MemoryStore::new();
        store.add_account(account("org-a", None));

        let err = resolve(&store, &Caller::org_member("u-1", "org-a"), by_account())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::CredentialUnavailable(_)));
    }

    #[tokio::test]
    async fn test_resolve_raw_requires_all_fields() {
        let store = MemoryStore::new();
        let source = CredentialSource::Raw {
            host: "smtp.example.com".to_string(),
            port: 587,
            username: String::new(),
            password: "pw".to_string(),
            from_name: None,
            from_email: None,
        };

        let err = resolve(&store, &Caller::admin("u-1"), source)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::InvalidInput(_)));
    }

    #[test]
    fn test_from_address_fallbacks() {
        let mut descriptor = SmtpDescriptor {
            host: "smtp.example.com".to_string(),
            port: 587,
            username: "mailer@example.com".to_string(),
            password: "pw".to_string(),
            from_name: Some("Sales".to_string()),
            from_email: Some("sales@example.com".to_string()),
        };
        assert_eq!(descriptor.from_address("CRM"), "Sales <sales@example.com>");

        descriptor.from_name = None;
        descriptor.from_email = None;
        assert_eq!(descriptor.from_address("CRM"), "CRM <mailer@example.com>");

        descriptor.from_name = Some(String::new());
        assert_eq!(descriptor.from_address("CRM"), "CRM <mailer@example.com>");
    }

    #[test]
    fn test_debug_redacts_password() {
        let descriptor = SmtpDescriptor {
            host: "smtp.example.com".to_string(),
            port: 587,
            username: "mailer@example.com".to_string(),
            password: "hunter2".to_string(),
            from_name: None,
            from_email: None,
        };
        let debug = format!("{descriptor:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }
}
