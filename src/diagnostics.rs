//! Harvest-level events and the sinks that receive them.
//!
//! Components report through an injected [`Diagnostics`] instead of a global
//! logger, so tests can assert on exactly what was reported.

use std::path::PathBuf;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub enum HarvestEvent {
    SessionStarted {
        session_id: String,
        seed_url: String,
        max_pages: usize,
    },
    Resumed {
        session_id: String,
        page_count: usize,
        records: usize,
        next_url: String,
    },
    ResumeUnavailable {
        session_id: String,
        reason: String,
    },
    PageHarvested {
        page: usize,
        url: String,
        records: usize,
        total: usize,
    },
    PageFetchFailed {
        page: usize,
        url: String,
        error: String,
    },
    NextPage {
        url: String,
    },
    ListExhausted {
        page_count: usize,
    },
    PageLimitReached {
        page_count: usize,
    },
    CheckpointSaved {
        session_id: String,
        page_count: usize,
        records: usize,
    },
    CheckpointSaveFailed {
        session_id: String,
        error: String,
    },
    CheckpointDeleted {
        session_id: String,
    },
    CheckpointDeleteFailed {
        session_id: String,
        error: String,
    },
    CheckpointUnreadable {
        path: PathBuf,
        error: String,
    },
    Interrupted {
        session_id: String,
        page_count: usize,
        records: usize,
    },
    Failed {
        session_id: String,
        page_count: usize,
        error: String,
    },
    Completed {
        session_id: String,
        page_count: usize,
        records: usize,
    },
}

pub trait Diagnostics: Send + Sync {
    fn emit(&self, event: HarvestEvent);
}

/// Forwards events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn emit(&self, event: HarvestEvent) {
        match event {
            HarvestEvent::SessionStarted {
                session_id,
                seed_url,
                max_pages,
            } => tracing::info!(%session_id, %seed_url, max_pages, "harvest started"),
            HarvestEvent::Resumed {
                session_id,
                page_count,
                records,
                next_url,
            } => tracing::info!(
                %session_id,
                page_count,
                records,
                %next_url,
                "resuming from checkpoint"
            ),
            HarvestEvent::ResumeUnavailable { session_id, reason } => {
                tracing::warn!(%session_id, %reason, "resume not possible")
            }
            HarvestEvent::PageHarvested {
                page,
                url,
                records,
                total,
            } => tracing::info!(page, %url, records, total, "page harvested"),
            HarvestEvent::PageFetchFailed { page, url, error } => {
                tracing::error!(page, %url, %error, "page fetch failed")
            }
            HarvestEvent::NextPage { url } => tracing::debug!(%url, "next page"),
            HarvestEvent::ListExhausted { page_count } => {
                tracing::info!(page_count, "no next page; list exhausted")
            }
            HarvestEvent::PageLimitReached { page_count } => {
                tracing::info!(page_count, "page limit reached")
            }
            HarvestEvent::CheckpointSaved {
                session_id,
                page_count,
                records,
            } => tracing::info!(%session_id, page_count, records, "checkpoint saved"),
            HarvestEvent::CheckpointSaveFailed { session_id, error } => {
                tracing::error!(%session_id, %error, "checkpoint save failed")
            }
            HarvestEvent::CheckpointDeleted { session_id } => {
                tracing::info!(%session_id, "checkpoint deleted")
            }
            HarvestEvent::CheckpointDeleteFailed { session_id, error } => {
                tracing::warn!(%session_id, %error, "checkpoint delete failed")
            }
            HarvestEvent::CheckpointUnreadable { path, error } => {
                tracing::warn!(path = %path.display(), %error, "skipping unreadable checkpoint")
            }
            HarvestEvent::Interrupted {
                session_id,
                page_count,
                records,
            } => tracing::warn!(%session_id, page_count, records, "harvest interrupted"),
            HarvestEvent::Failed {
                session_id,
                page_count,
                error,
            } => tracing::error!(%session_id, page_count, %error, "harvest failed"),
            HarvestEvent::Completed {
                session_id,
                page_count,
                records,
            } => tracing::info!(%session_id, page_count, records, "harvest complete"),
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct MemoryDiagnostics {
    events: Mutex<Vec<HarvestEvent>>,
}

impl MemoryDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<HarvestEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Diagnostics for MemoryDiagnostics {
    fn emit(&self, event: HarvestEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}
