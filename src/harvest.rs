use std::sync::Arc;

use anyhow::Context as _;
use scraper::Html;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::checkpoint::CheckpointStore;
use crate::config::{HarvestConfig, ResumeFailurePolicy};
use crate::diagnostics::{Diagnostics, HarvestEvent};
use crate::extract::Extractor;
use crate::fetch::PageFetcher;
use crate::formats::BookRecord;
use crate::pagination::{Navigator, page_url};
use crate::session::SessionId;

#[derive(Debug)]
pub enum HarvestOutcome {
    /// The list was exhausted or the page limit reached; the checkpoint is gone.
    Completed {
        session_id: SessionId,
        records: Vec<BookRecord>,
        page_count: usize,
    },
    /// Stopped by the operator. `checkpoint_saved` is false when the final
    /// save failed.
    Interrupted {
        session_id: SessionId,
        partial_count: usize,
        page_count: usize,
        checkpoint_saved: bool,
    },
    /// Stopped by an unrecoverable error.
    Failed {
        session_id: SessionId,
        error: anyhow::Error,
        partial_count: usize,
        page_count: usize,
        checkpoint_saved: bool,
    },
}

impl HarvestOutcome {
    pub fn session_id(&self) -> &SessionId {
        match self {
            Self::Completed { session_id, .. }
            | Self::Interrupted { session_id, .. }
            | Self::Failed { session_id, .. } => session_id,
        }
    }
}

/// Pagination cursor plus everything harvested before it.
#[derive(Debug)]
struct Progress {
    seed_url: Url,
    records: Vec<BookRecord>,
    page_count: usize,
    current: Url,
}

/// What one fetched page yielded. The document is parsed once for both.
struct PageYield {
    records: Vec<BookRecord>,
    next_url: Option<Url>,
}

pub struct Harvester<F> {
    config: HarvestConfig,
    fetcher: F,
    store: Arc<dyn CheckpointStore>,
    diagnostics: Arc<dyn Diagnostics>,
    extractor: Extractor,
    navigator: Navigator,
}

impl<F: PageFetcher> Harvester<F> {
    pub fn new(
        config: HarvestConfig,
        fetcher: F,
        store: Arc<dyn CheckpointStore>,
        diagnostics: Arc<dyn Diagnostics>,
    ) -> anyhow::Result<Self> {
        config.validate().context("validate harvest config")?;
        Ok(Self {
            config,
            fetcher,
            store,
            diagnostics,
            extractor: Extractor::new().context("build extractor")?,
            navigator: Navigator::new().context("build navigator")?,
        })
    }

    /// Runs one session to an outcome. `Err` is returned only when the session
    /// could not start (resume failure under [`ResumeFailurePolicy::Abort`]).
    pub async fn run(&self, cancel: &CancellationToken) -> anyhow::Result<HarvestOutcome> {
        let session_id = self
            .config
            .session_id
            .clone()
            .unwrap_or_else(SessionId::generate);
        self.diagnostics.emit(HarvestEvent::SessionStarted {
            session_id: session_id.to_string(),
            seed_url: self.config.seed_url.to_string(),
            max_pages: self.config.max_pages,
        });

        let mut progress = self.init(&session_id)?;

        loop {
            if progress.page_count >= self.config.max_pages {
                self.diagnostics.emit(HarvestEvent::PageLimitReached {
                    page_count: progress.page_count,
                });
                break;
            }
            if cancel.is_cancelled() {
                return Ok(self.interrupt(session_id, &progress));
            }

            let page_number = progress.page_count + 1;
            let url = progress.current.clone();
            let fetched = tokio::select! {
                biased;
                () = cancel.cancelled() => return Ok(self.interrupt(session_id, &progress)),
                fetched = self.fetcher.fetch(&url) => fetched,
            };

            let page = match fetched {
                Ok(markup) => self.process_page(&markup, &url),
                Err(err) => {
                    self.diagnostics.emit(HarvestEvent::PageFetchFailed {
                        page: page_number,
                        url: url.to_string(),
                        error: format!("{err:#}"),
                    });
                    if page_number < self.config.max_pages {
                        // The next link lives in this page; without it the
                        // session cannot continue.
                        let err = err.context(format!("resolve next page from {url}"));
                        return Ok(self.fail(session_id, &progress, err));
                    }
                    PageYield {
                        records: Vec::new(),
                        next_url: None,
                    }
                }
            };

            let found = page.records.len();
            progress.records.extend(page.records);
            progress.page_count = page_number;
            self.diagnostics.emit(HarvestEvent::PageHarvested {
                page: page_number,
                url: url.to_string(),
                records: found,
                total: progress.records.len(),
            });

            if progress.page_count % self.config.checkpoint_every == 0
                || progress.page_count == self.config.max_pages
            {
                self.checkpoint(&session_id, &progress);
            }

            if progress.page_count >= self.config.max_pages {
                self.diagnostics.emit(HarvestEvent::PageLimitReached {
                    page_count: progress.page_count,
                });
                break;
            }

            let Some(next_url) = page.next_url else {
                self.diagnostics.emit(HarvestEvent::ListExhausted {
                    page_count: progress.page_count,
                });
                break;
            };
            self.diagnostics.emit(HarvestEvent::NextPage {
                url: next_url.to_string(),
            });

            tokio::select! {
                biased;
                () = cancel.cancelled() => return Ok(self.interrupt(session_id, &progress)),
                () = tokio::time::sleep(self.config.delay) => {}
            }
            progress.current = next_url;
        }

        Ok(self.complete(session_id, progress))
    }

    fn init(&self, session_id: &SessionId) -> anyhow::Result<Progress> {
        let fresh = || Progress {
            seed_url: self.config.seed_url.clone(),
            records: Vec::new(),
            page_count: 0,
            current: self.config.seed_url.clone(),
        };

        if !self.config.resume {
            return Ok(fresh());
        }

        let loaded = self.store.load(session_id).and_then(|state| {
            let Some(state) = state else {
                return Ok(None);
            };
            let seed_url = Url::parse(&state.source_url)
                .with_context(|| format!("checkpoint list url: {}", state.source_url))?;
            Ok(Some((state, seed_url)))
        });

        match loaded {
            Ok(Some((state, seed_url))) => {
                if seed_url != self.config.seed_url {
                    tracing::warn!(
                        checkpoint_url = %seed_url,
                        configured_url = %self.config.seed_url,
                        "resuming with the checkpoint's list url"
                    );
                }
                let current = page_url(&seed_url, state.page_count + 1);
                self.diagnostics.emit(HarvestEvent::Resumed {
                    session_id: session_id.to_string(),
                    page_count: state.page_count,
                    records: state.records.len(),
                    next_url: current.to_string(),
                });
                Ok(Progress {
                    seed_url,
                    records: state.records,
                    page_count: state.page_count,
                    current,
                })
            }
            Ok(None) => {
                self.diagnostics.emit(HarvestEvent::ResumeUnavailable {
                    session_id: session_id.to_string(),
                    reason: "no checkpoint for session".to_owned(),
                });
                Ok(fresh())
            }
            Err(err) => {
                self.diagnostics.emit(HarvestEvent::ResumeUnavailable {
                    session_id: session_id.to_string(),
                    reason: format!("{err:#}"),
                });
                match self.config.on_resume_failure {
                    ResumeFailurePolicy::StartFresh => Ok(fresh()),
                    ResumeFailurePolicy::Abort => {
                        Err(err.context(format!("resume session {session_id}")))
                    }
                }
            }
        }
    }

    fn process_page(&self, markup: &str, url: &Url) -> PageYield {
        let document = Html::parse_document(markup);
        PageYield {
            records: self.extractor.extract(&document, url),
            next_url: self.navigator.next_page(&document, url),
        }
    }

    /// Best effort: a failed save is reported and the harvest goes on.
    fn checkpoint(&self, session_id: &SessionId, progress: &Progress) -> bool {
        match self.store.save(
            &progress.records,
            progress.page_count,
            progress.seed_url.as_str(),
            session_id,
        ) {
            Ok(()) => {
                self.diagnostics.emit(HarvestEvent::CheckpointSaved {
                    session_id: session_id.to_string(),
                    page_count: progress.page_count,
                    records: progress.records.len(),
                });
                true
            }
            Err(err) => {
                self.diagnostics.emit(HarvestEvent::CheckpointSaveFailed {
                    session_id: session_id.to_string(),
                    error: format!("{err:#}"),
                });
                false
            }
        }
    }

    fn interrupt(&self, session_id: SessionId, progress: &Progress) -> HarvestOutcome {
        let checkpoint_saved = self.checkpoint(&session_id, progress);
        self.diagnostics.emit(HarvestEvent::Interrupted {
            session_id: session_id.to_string(),
            page_count: progress.page_count,
            records: progress.records.len(),
        });
        HarvestOutcome::Interrupted {
            session_id,
            partial_count: progress.records.len(),
            page_count: progress.page_count,
            checkpoint_saved,
        }
    }

    fn fail(
        &self,
        session_id: SessionId,
        progress: &Progress,
        error: anyhow::Error,
    ) -> HarvestOutcome {
        let checkpoint_saved = self.checkpoint(&session_id, progress);
        self.diagnostics.emit(HarvestEvent::Failed {
            session_id: session_id.to_string(),
            page_count: progress.page_count,
            error: format!("{error:#}"),
        });
        HarvestOutcome::Failed {
            session_id,
            error,
            partial_count: progress.records.len(),
            page_count: progress.page_count,
            checkpoint_saved,
        }
    }

    fn complete(&self, session_id: SessionId, progress: Progress) -> HarvestOutcome {
        if let Err(err) = self.store.delete(&session_id) {
            self.diagnostics.emit(HarvestEvent::CheckpointDeleteFailed {
                session_id: session_id.to_string(),
                error: format!("{err:#}"),
            });
        }
        self.diagnostics.emit(HarvestEvent::Completed {
            session_id: session_id.to_string(),
            page_count: progress.page_count,
            records: progress.records.len(),
        });
        HarvestOutcome::Completed {
            session_id,
            records: progress.records,
            page_count: progress.page_count,
        }
    }
}
