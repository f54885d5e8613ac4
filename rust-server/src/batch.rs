//! Batch selection over a campaign's leads.

use std::collections::HashSet;

use crate::error::DispatchError;
use crate::store::{CrmStore, Lead};

pub const DEFAULT_BATCH_SIZE: i64 = 10;
pub const MAX_BATCH_SIZE: i64 = 500;

/// How the eligible leads for one invocation are chosen.
///
/// Resolved exactly once at the request boundary. A non-empty explicit
/// id list wins and ignores batch size and offset entirely; otherwise
/// a non-negative offset selects a window, and the default is the
/// first batch-size leads in store order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Restrict to these lead ids within the campaign.
    ByIds(Vec<String>),
    /// Contiguous window of the campaign's leads in store order.
    Window { offset: usize, limit: usize },
    /// First `limit` leads in store order.
    FirstN(usize),
}

impl Selection {
    /// Resolve the selection mode from the request's optional fields.
    pub fn from_parts(
        lead_ids: Option<Vec<String>>,
        offset: Option<i64>,
        batch: Option<i64>,
    ) -> Self {
        if let Some(ids) = lead_ids {
            if !ids.is_empty() {
                return Selection::ByIds(ids);
            }
        }
        let limit = clamp_batch(batch);
        match offset {
            Some(o) if o >= 0 => Selection::Window {
                offset: o as usize,
                limit,
            },
            _ => Selection::FirstN(limit),
        }
    }

    fn apply(&self, leads: Vec<Lead>) -> Vec<Lead> {
        match self {
            Selection::ByIds(ids) => {
                let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
                leads
                    .into_iter()
                    .filter(|l| wanted.contains(l.lead_id.as_str()))
                    .collect()
            }
            Selection::Window { offset, limit } => {
                leads.into_iter().skip(*offset).take(*limit).collect()
            }
            Selection::FirstN(limit) => leads.into_iter().take(*limit).collect(),
        }
    }
}

/// Default 10, clamped to [1, 500]. Zero counts as unset.
fn clamp_batch(batch: Option<i64>) -> usize {
    let raw = match batch {
        None | Some(0) => DEFAULT_BATCH_SIZE,
        Some(b) => b,
    };
    raw.clamp(1, MAX_BATCH_SIZE) as usize
}

/// Select the eligible leads for one invocation.
///
/// An empty selection aborts the whole invocation before any send is
/// attempted.
pub async fn select_batch(
    store: &dyn CrmStore,
    campaign_id: &str,
    selection: &Selection,
) -> Result<Vec<Lead>, DispatchError> {
    let leads = store.campaign_leads(campaign_id).await?;
    let selected = selection.apply(leads);
    if selected.is_empty() {
        return Err(DispatchError::NoEligibleLeads);
    }
    Ok(selected)
}
