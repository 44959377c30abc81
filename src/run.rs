use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use tokio_util::sync::CancellationToken;

use crate::checkpoint::{CheckpointStore, LocalFsCheckpointStore};
use crate::cli::{CheckpointsDeleteArgs, CheckpointsListArgs};
use crate::config::RunConfig;
use crate::diagnostics::Diagnostics;
use crate::fetch::HttpFetcher;
use crate::formats::{CheckpointSummary, NormalizedRecord};
use crate::harvest::{HarvestOutcome, Harvester};
use crate::session::SessionId;
use crate::summary::Summary;

/// How a harvest run ended. `Interrupted` and `Failed` leave a checkpoint
/// behind for `session_id` when `checkpoint_saved` is set.
#[derive(Debug)]
pub enum Outcome {
    Completed {
        records: Vec<NormalizedRecord>,
        output_path: PathBuf,
    },
    Interrupted {
        session_id: SessionId,
        partial_count: usize,
        checkpoint_saved: bool,
    },
    Failed {
        session_id: SessionId,
        error: anyhow::Error,
        partial_count: usize,
        checkpoint_saved: bool,
    },
}

impl Outcome {
    pub fn resume_hint(session_id: &SessionId) -> String {
        format!("to continue: bookharvest harvest --resume --session-id {session_id}")
    }
}

pub async fn harvest(
    mut config: RunConfig,
    cancel: &CancellationToken,
    diagnostics: Arc<dyn Diagnostics>,
) -> anyhow::Result<Outcome> {
    crate::export::ensure_output_writable(&config.output_path, config.force)
        .context("check output path")?;

    let store = Arc::new(
        LocalFsCheckpointStore::open(&config.checkpoint_dir, diagnostics.clone())
            .context("open checkpoint store")?,
    );

    if config.harvest.resume && config.harvest.session_id.is_none() {
        config.harvest.session_id = newest_session(store.as_ref())?;
        match &config.harvest.session_id {
            Some(session_id) => tracing::info!(%session_id, "resuming newest checkpoint"),
            None => tracing::warn!("no checkpoint to resume; starting a new session"),
        }
    }

    let fetcher = HttpFetcher::new(&config.fetch).context("build fetcher")?;
    let harvester = Harvester::new(config.harvest.clone(), fetcher, store, diagnostics)
        .context("build harvester")?;

    tracing::info!(
        url = %config.harvest.seed_url,
        max_pages = config.harvest.max_pages,
        delay_secs = config.harvest.delay.as_secs_f64(),
        out = %config.output_path.display(),
        "harvest: start"
    );
    let outcome = harvester.run(cancel).await.context("harvest")?;

    match outcome {
        HarvestOutcome::Completed { records, .. } => {
            if records.is_empty() {
                tracing::warn!("no books were harvested");
            }
            tracing::info!("harvest: normalize");
            let normalized = crate::normalize::normalize(&records, &config.normalize);
            tracing::info!("harvest: write csv");
            crate::export::write_csv(&config.output_path, &normalized, config.force)
                .context("write csv")?;
            Ok(Outcome::Completed {
                records: normalized,
                output_path: config.output_path,
            })
        }
        HarvestOutcome::Interrupted {
            session_id,
            partial_count,
            checkpoint_saved,
            ..
        } => Ok(Outcome::Interrupted {
            session_id,
            partial_count,
            checkpoint_saved,
        }),
        HarvestOutcome::Failed {
            session_id,
            error,
            partial_count,
            checkpoint_saved,
            ..
        } => Ok(Outcome::Failed {
            session_id,
            error,
            partial_count,
            checkpoint_saved,
        }),
    }
}

/// Newest checkpoint whose name is usable as a session id.
fn newest_session(store: &dyn CheckpointStore) -> anyhow::Result<Option<SessionId>> {
    let summaries = store.list().context("list checkpoints")?;
    Ok(summaries.iter().find_map(|summary| {
        SessionId::parse(&summary.session_id)
            .inspect_err(|err| {
                tracing::warn!(session_id = %summary.session_id, %err, "skipping checkpoint")
            })
            .ok()
    }))
}

pub fn report(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Completed {
            records,
            output_path,
        } => format!(
            "{}\nSaved {} rows to {}",
            Summary::from_records(records),
            records.len(),
            output_path.display()
        ),
        Outcome::Interrupted {
            session_id,
            partial_count,
            checkpoint_saved,
        } => format!(
            "Interrupted. {}",
            progress_note(session_id, *partial_count, *checkpoint_saved)
        ),
        Outcome::Failed {
            session_id,
            error,
            partial_count,
            checkpoint_saved,
        } => format!(
            "Harvest failed: {error:#}\n{}",
            progress_note(session_id, *partial_count, *checkpoint_saved)
        ),
    }
}

fn progress_note(session_id: &SessionId, partial_count: usize, checkpoint_saved: bool) -> String {
    if checkpoint_saved {
        format!(
            "{partial_count} books saved in checkpoint {session_id}.\n{}",
            Outcome::resume_hint(session_id)
        )
    } else {
        format!(
            "{partial_count} books were harvested, but checkpoint {session_id} could not be saved; \
             this progress cannot be resumed."
        )
    }
}

pub fn list_checkpoints(
    args: CheckpointsListArgs,
    diagnostics: Arc<dyn Diagnostics>,
) -> anyhow::Result<String> {
    let store = LocalFsCheckpointStore::open(&args.checkpoint_dir, diagnostics)
        .context("open checkpoint store")?;
    let summaries = store.list().context("list checkpoints")?;
    Ok(format_checkpoints(&summaries))
}

pub fn delete_checkpoint(
    args: CheckpointsDeleteArgs,
    diagnostics: Arc<dyn Diagnostics>,
) -> anyhow::Result<String> {
    let session_id = SessionId::parse(&args.session_id).context("parse --session-id")?;
    let store = LocalFsCheckpointStore::open(&args.checkpoint_dir, diagnostics)
        .context("open checkpoint store")?;
    if !store.exists(&session_id).context("find checkpoint")? {
        anyhow::bail!("no checkpoint for session: {session_id}");
    }
    store.delete(&session_id).context("delete checkpoint")?;
    Ok(format!("Deleted checkpoint {session_id}"))
}

fn format_checkpoints(summaries: &[CheckpointSummary]) -> String {
    if summaries.is_empty() {
        return "No saved checkpoints.".to_owned();
    }

    let mut out = String::from("Saved checkpoints:\n");
    for (index, summary) in summaries.iter().enumerate() {
        let saved_at = summary
            .saved_at
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M:%S");
        out.push_str(&format!(
            "{}. Session ID: {}\n   {} books, page {}\n   Saved: {saved_at}\n   URL: {}\n\n",
            index + 1,
            summary.session_id,
            summary.total_books,
            summary.page_count,
            shorten(&summary.source_url, 60),
        ));
    }
    out.push_str("Resume with: bookharvest harvest --resume --session-id SESSION_ID");
    out
}

fn shorten(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_owned();
    }
    let head: String = text.chars().take(max_chars).collect();
    format!("{head}...")
}
