use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context as _;
use url::Url;

use crate::cli::HarvestArgs;
use crate::session::SessionId;

pub const DEFAULT_REVIEW_RATE: f64 = 0.12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResumeFailurePolicy {
    #[default]
    StartFresh,
    Abort,
}

/// What the harvest loop needs.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    pub seed_url: Url,
    pub max_pages: usize,
    pub delay: Duration,
    pub resume: bool,
    pub session_id: Option<SessionId>,
    pub checkpoint_every: usize,
    pub on_resume_failure: ResumeFailurePolicy,
}

impl HarvestConfig {
    pub fn new(seed_url: Url, max_pages: usize) -> Self {
        Self {
            seed_url,
            max_pages,
            delay: Duration::ZERO,
            resume: false,
            session_id: None,
            checkpoint_every: 2,
            on_resume_failure: ResumeFailurePolicy::default(),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_pages == 0 {
            anyhow::bail!("max pages must be greater than zero");
        }
        if self.checkpoint_every == 0 {
            anyhow::bail!("checkpoint cadence must be greater than zero");
        }
        ensure_http_url(&self.seed_url)
    }
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizeOptions {
    /// Reviews imputed as `round(ratings_count * review_rate)`.
    pub review_rate: f64,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            review_rate: DEFAULT_REVIEW_RATE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub harvest: HarvestConfig,
    pub fetch: FetchConfig,
    pub normalize: NormalizeOptions,
    pub checkpoint_dir: PathBuf,
    pub output_path: PathBuf,
    pub force: bool,
}

impl RunConfig {
    pub fn from_args(args: &HarvestArgs) -> anyhow::Result<Self> {
        let seed_url = Url::parse(&args.url).context("parse --url")?;
        let delay = Duration::try_from_secs_f64(args.delay)
            .with_context(|| format!("--delay must be a non-negative number: {}", args.delay))?;
        if !args.review_rate.is_finite() || args.review_rate < 0.0 {
            anyhow::bail!(
                "--review-rate must be a non-negative number: {}",
                args.review_rate
            );
        }
        if args.timeout_secs == 0 {
            anyhow::bail!("--timeout-secs must be greater than zero");
        }
        if args.output.trim().is_empty() {
            anyhow::bail!("--output must not be empty");
        }
        let session_id = args
            .session_id
            .as_deref()
            .map(SessionId::parse)
            .transpose()
            .context("parse --session-id")?;

        let harvest = HarvestConfig {
            seed_url,
            max_pages: args.pages,
            delay,
            resume: args.resume,
            session_id,
            checkpoint_every: args.checkpoint_every,
            on_resume_failure: if args.abort_on_resume_failure {
                ResumeFailurePolicy::Abort
            } else {
                ResumeFailurePolicy::StartFresh
            },
        };
        harvest.validate()?;

        Ok(Self {
            harvest,
            fetch: FetchConfig {
                user_agent: args.user_agent.clone(),
                timeout: Duration::from_secs(args.timeout_secs),
            },
            normalize: NormalizeOptions {
                review_rate: args.review_rate,
            },
            checkpoint_dir: PathBuf::from(&args.checkpoint_dir),
            output_path: PathBuf::from(&args.output_dir).join(&args.output),
            force: args.force,
        })
    }
}

pub fn ensure_http_url(url: &Url) -> anyhow::Result<()> {
    if url.scheme() != "http" && url.scheme() != "https" {
        anyhow::bail!("url must be http/https: {url}");
    }
    if url.host_str().is_none() {
        anyhow::bail!("url must have host: {url}");
    }
    Ok(())
}
