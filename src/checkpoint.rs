use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use chrono::Utc;

use crate::diagnostics::{Diagnostics, HarvestEvent};
use crate::formats::{
    BookRecord, CheckpointFile, CheckpointHeader, CheckpointState, CheckpointSummary,
    datetime_to_timestamp, timestamp_to_datetime,
};
use crate::session::SessionId;

const FILE_PREFIX: &str = "checkpoint_";
const FILE_SUFFIX: &str = ".json";

/// Durable harvest progress, one overwritable entry per session.
pub trait CheckpointStore: Send + Sync {
    fn save(
        &self,
        records: &[BookRecord],
        page_count: usize,
        source_url: &str,
        session_id: &SessionId,
    ) -> anyhow::Result<()>;
    /// `Ok(None)` when the session has no checkpoint.
    fn load(&self, session_id: &SessionId) -> anyhow::Result<Option<CheckpointState>>;
    /// Whether a checkpoint entry exists, readable or not.
    fn exists(&self, session_id: &SessionId) -> anyhow::Result<bool>;
    /// Newest first. Entries whose name is not a valid session id are skipped.
    fn list(&self) -> anyhow::Result<Vec<CheckpointSummary>>;
    fn delete(&self, session_id: &SessionId) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct LocalFsCheckpointStore {
    base_dir: PathBuf,
    diagnostics: Arc<dyn Diagnostics>,
}

impl LocalFsCheckpointStore {
    /// Creates the checkpoint directory if needed.
    pub fn open(
        base_dir: impl Into<PathBuf>,
        diagnostics: Arc<dyn Diagnostics>,
    ) -> anyhow::Result<Self> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir)
            .with_context(|| format!("create checkpoint dir: {}", base_dir.display()))?;
        Ok(Self {
            base_dir,
            diagnostics,
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn checkpoint_path(&self, session_id: &SessionId) -> PathBuf {
        self.base_dir
            .join(format!("{FILE_PREFIX}{}{FILE_SUFFIX}", session_id.as_str()))
    }
}

impl CheckpointStore for LocalFsCheckpointStore {
    fn save(
        &self,
        records: &[BookRecord],
        page_count: usize,
        source_url: &str,
        session_id: &SessionId,
    ) -> anyhow::Result<()> {
        let file = CheckpointFile {
            records: records.to_vec(),
            current_page: page_count,
            list_url: source_url.to_owned(),
            timestamp: datetime_to_timestamp(Utc::now()),
            total_books: records.len(),
        };
        let path = self.checkpoint_path(session_id);
        write_json_atomic(&path, &file).with_context(|| format!("save: {}", path.display()))
    }

    fn load(&self, session_id: &SessionId) -> anyhow::Result<Option<CheckpointState>> {
        let path = self.checkpoint_path(session_id);
        let Some(file) = read_json::<CheckpointFile>(&path)
            .with_context(|| format!("read: {}", path.display()))?
        else {
            return Ok(None);
        };
        Ok(Some(CheckpointState {
            records: file.records,
            page_count: file.current_page,
            source_url: file.list_url,
            session_id: session_id.as_str().to_owned(),
            saved_at: timestamp_to_datetime(file.timestamp),
        }))
    }

    fn exists(&self, session_id: &SessionId) -> anyhow::Result<bool> {
        let path = self.checkpoint_path(session_id);
        path.try_exists().with_context(|| format!("stat: {}", path.display()))
    }

    fn list(&self) -> anyhow::Result<Vec<CheckpointSummary>> {
        let mut summaries = Vec::new();
        for entry in std::fs::read_dir(&self.base_dir)
            .with_context(|| format!("read checkpoint dir: {}", self.base_dir.display()))?
        {
            let path = entry?.path();
            let Some(session_id) = session_id_from_path(&path) else {
                continue;
            };
            if let Err(err) = SessionId::parse(&session_id) {
                self.diagnostics.emit(HarvestEvent::CheckpointUnreadable {
                    path: path.clone(),
                    error: format!("{err:#}"),
                });
                continue;
            }

            let header = match read_json::<CheckpointHeader>(&path) {
                Ok(Some(header)) => header,
                Ok(None) => continue,
                Err(err) => {
                    self.diagnostics.emit(HarvestEvent::CheckpointUnreadable {
                        path: path.clone(),
                        error: format!("{err:#}"),
                    });
                    continue;
                }
            };

            summaries.push(CheckpointSummary {
                session_id,
                total_books: header.total_books,
                page_count: header.current_page,
                source_url: header.list_url.unwrap_or_else(|| "Unknown".to_owned()),
                saved_at: timestamp_to_datetime(header.timestamp),
            });
        }

        summaries.sort_by(|a, b| b.saved_at.cmp(&a.saved_at));
        Ok(summaries)
    }

    fn delete(&self, session_id: &SessionId) -> anyhow::Result<()> {
        let path = self.checkpoint_path(session_id);
        match std::fs::remove_file(&path) {
            Ok(()) => {
                self.diagnostics.emit(HarvestEvent::CheckpointDeleted {
                    session_id: session_id.as_str().to_owned(),
                });
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| format!("delete: {}", path.display())),
        }
    }
}

fn session_id_from_path(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let id = name.strip_prefix(FILE_PREFIX)?.strip_suffix(FILE_SUFFIX)?;
    if id.is_empty() {
        return None;
    }
    Some(id.to_owned())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<Option<T>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    let value = serde_json::from_slice(&bytes).context("parse json")?;
    Ok(Some(value))
}

fn write_json_atomic<T: serde::Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("path has no parent: {}", path.display()))?;
    std::fs::create_dir_all(parent)
        .with_context(|| format!("create parent dir: {}", parent.display()))?;

    let tmp_path = path.with_extension(format!("tmp.{}", uuid::Uuid::new_v4().simple()));
    let data = serde_json::to_vec_pretty(value).context("serialize json")?;
    std::fs::write(&tmp_path, &data)
        .with_context(|| format!("write tmp: {}", tmp_path.display()))?;
    std::fs::rename(&tmp_path, path)
        .with_context(|| format!("rename tmp to final: {}", path.display()))?;
    Ok(())
}
