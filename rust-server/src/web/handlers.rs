//! HTTP endpoint handlers.
//!
//! The two send endpoints authenticate the caller and delegate to the
//! dispatch module. The two tracking endpoints are hit by untrusted
//! recipients' mail clients and browsers: they update the delivery
//! log best-effort and must never visibly fail — a broken store still
//! serves the pixel and still redirects.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::auth::{Authenticator, Caller};
use crate::batch::Selection;
use crate::config::Config;
use crate::credentials::CredentialSource;
use crate::dispatch::{self, BulkSendReport, BulkSendRequest, TestSendRequest};
use crate::error::DispatchError;
use crate::mailer::MailTransportFactory;
use crate::store::CrmStore;
use crate::tracking::TRANSPARENT_PIXEL_PNG;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn CrmStore>,
    pub auth: Arc<dyn Authenticator>,
    pub mailer: Arc<dyn MailTransportFactory>,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn CrmStore>,
        auth: Arc<dyn Authenticator>,
        mailer: Arc<dyn MailTransportFactory>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            store,
            auth,
            mailer,
        }
    }
}

/// Resolve the caller from a bearer token, or 401.
async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Caller, DispatchError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(DispatchError::Unauthorized)?;

    state
        .auth
        .caller_for_token(token)
        .await
        .ok_or(DispatchError::Unauthorized)
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// =============================================================================
// Bulk Send
// =============================================================================

/// Bulk send request body. The three id fields are required; their
/// absence is reported as a 400 with a descriptive message rather
/// than a deserialization rejection.
#[derive(Debug, Deserialize)]
pub struct BulkSendBody {
    #[serde(default)]
    pub campaign_id: Option<String>,
    #[serde(default)]
    pub template_id: Option<String>,
    #[serde(default)]
    pub email_account_id: Option<String>,
    #[serde(default)]
    pub batch: Option<i64>,
    #[serde(default)]
    pub lead_ids: Option<Vec<String>>,
    #[serde(default)]
    pub offset: Option<i64>,
}

/// Bulk send endpoint: personalize, instrument and transmit one batch
/// of a campaign, returning the per-lead report.
pub async fn bulk_send(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<BulkSendBody>,
) -> Result<Json<BulkSendReport>, DispatchError> {
    let caller = authenticate(&state, &headers).await?;

    let (campaign_id, template_id, email_account_id) =
        match (body.campaign_id, body.template_id, body.email_account_id) {
            (Some(c), Some(t), Some(a)) if !c.is_empty() && !t.is_empty() && !a.is_empty() => {
                (c, t, a)
            }
            _ => {
                return Err(DispatchError::InvalidInput(
                    "missing campaign_id/template_id/email_account_id".into(),
                ))
            }
        };

    info!(
        campaign_id = %campaign_id,
        template_id = %template_id,
        user_id = %caller.user_id,
        "bulk_send_received"
    );

    let request = BulkSendRequest {
        campaign_id,
        template_id,
        email_account_id,
        selection: Selection::from_parts(body.lead_ids, body.offset, body.batch),
    };

    let report = dispatch::send_bulk(
        state.store.as_ref(),
        state.mailer.as_ref(),
        &state.config.public_base_url,
        &state.config.default_from_name,
        &caller,
        request,
    )
    .await?;

    Ok(Json(report))
}

// =============================================================================
// Test Send
// =============================================================================

/// Test send request body: either a stored account id, or raw SMTP
/// fields. The mode is resolved once, here.
#[derive(Debug, Deserialize)]
pub struct TestSendBody {
    #[serde(default)]
    pub email_account_id: Option<String>,
    #[serde(default)]
    pub smtp_host: Option<String>,
    #[serde(default)]
    pub smtp_port: Option<u16>,
    #[serde(default)]
    pub smtp_username: Option<String>,
    #[serde(default)]
    pub smtp_password: Option<String>,
    #[serde(default)]
    pub from_name: Option<String>,
    #[serde(default)]
    pub from_email: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TestSendResponse {
    pub ok: bool,
}

fn test_send_source(body: TestSendBody) -> (CredentialSource, Option<String>) {
    let source = match body.email_account_id {
        Some(account_id) => CredentialSource::Account { account_id },
        None => CredentialSource::Raw {
            host: body.smtp_host.unwrap_or_default(),
            port: body.smtp_port.unwrap_or_default(),
            username: body.smtp_username.unwrap_or_default(),
            password: body.smtp_password.unwrap_or_default(),
            from_name: body.from_name,
            from_email: body.from_email,
        },
    };
    (source, body.to)
}

/// Test send endpoint: one fixed message to confirm SMTP settings.
pub async fn test_send(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<TestSendBody>,
) -> Result<Json<TestSendResponse>, DispatchError> {
    let caller = authenticate(&state, &headers).await?;
    let (source, to) = test_send_source(body);

    dispatch::send_test(
        state.store.as_ref(),
        state.mailer.as_ref(),
        &state.config.default_from_name,
        &caller,
        TestSendRequest { source, to },
    )
    .await?;

    Ok(Json(TestSendResponse { ok: true }))
}

// =============================================================================
// Tracking: Open
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct OpenParams {
    #[serde(default)]
    pub tid: Option<String>,
}

/// Open-tracking endpoint: always a 200 with the transparent pixel.
///
/// The log update is attempted when a tracking id is present and any
/// failure is discarded — a mail client must never see an error here.
pub async fn open_pixel(
    State(state): State<AppState>,
    Query(params): Query<OpenParams>,
) -> impl IntoResponse {
    if let Some(tid) = params.tid.as_deref().filter(|t| !t.is_empty()) {
        match state.store.mark_opened(tid, Utc::now()).await {
            Ok(()) => debug!(tid = %tid, "open_recorded"),
            Err(e) => debug!(tid = %tid, error = %e, "open_update_failed"),
        }
    }

    (
        [
            (header::CONTENT_TYPE, "image/png"),
            (
                header::CACHE_CONTROL,
                "no-store, no-cache, must-revalidate, proxy-revalidate",
            ),
            (header::PRAGMA, "no-cache"),
            (header::EXPIRES, "0"),
        ],
        TRANSPARENT_PIXEL_PNG,
    )
}

// =============================================================================
// Tracking: Redirect
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct RedirectParams {
    #[serde(default)]
    pub tid: Option<String>,
    #[serde(default)]
    pub target: Option<String>,
}

/// Click-tracking endpoint: best-effort log update, then a 302 to the
/// caller-supplied target. The target is passed through as supplied.
pub async fn click_redirect(
    State(state): State<AppState>,
    Query(params): Query<RedirectParams>,
) -> Response {
    let Some(target) = params.target.filter(|t| !t.is_empty()) else {
        return (StatusCode::BAD_REQUEST, "Missing target").into_response();
    };

    if let Some(tid) = params.tid.as_deref().filter(|t| !t.is_empty()) {
        match state.store.mark_clicked(tid, Utc::now()).await {
            Ok(()) => debug!(tid = %tid, "click_recorded"),
            Err(e) => debug!(tid = %tid, error = %e, "click_update_failed"),
        }
    }

    (StatusCode::FOUND, [(header::LOCATION, target)]).into_response()
}
