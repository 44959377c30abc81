use clap::{Args, Parser, Subcommand};

pub const DEFAULT_LIST_URL: &str = "https://www.goodreads.com/list/show/1.Best_Books_Ever";
pub const DEFAULT_CHECKPOINT_DIR: &str = "data/checkpoints";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Harvest a paginated book list into a CSV file.
    Harvest(HarvestArgs),
    Checkpoints {
        #[command(subcommand)]
        command: CheckpointsCommand,
    },
}

#[derive(Debug, Args)]
pub struct HarvestArgs {
    /// First page of the list (must be http/https).
    #[arg(long, default_value = DEFAULT_LIST_URL)]
    pub url: String,

    /// Maximum pages to harvest.
    #[arg(long, default_value_t = 10)]
    pub pages: usize,

    /// Seconds to wait between pages.
    #[arg(long, default_value_t = 1.5)]
    pub delay: f64,

    /// Output CSV file name.
    #[arg(long, default_value = "goodreads_books.csv")]
    pub output: String,

    /// Directory the output file is written to.
    #[arg(long, default_value = "data")]
    pub output_dir: String,

    /// Overwrite the output file if it exists.
    #[arg(long)]
    pub force: bool,

    /// Directory holding checkpoint files.
    #[arg(long, default_value = DEFAULT_CHECKPOINT_DIR)]
    pub checkpoint_dir: String,

    /// Continue a previous session (the newest one unless --session-id is set).
    #[arg(long)]
    pub resume: bool,

    /// Session to create or resume.
    #[arg(long)]
    pub session_id: Option<String>,

    /// Stop instead of starting fresh when the checkpoint cannot be read.
    #[arg(long)]
    pub abort_on_resume_failure: bool,

    /// Save a checkpoint every N pages.
    #[arg(long, default_value_t = 2)]
    pub checkpoint_every: usize,

    /// Share of ratings assumed to be reviews when the review count is missing.
    #[arg(long, default_value_t = 0.12)]
    pub review_rate: f64,

    #[arg(long, default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    /// HTTP request timeout.
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,

    /// Debug-level logs (unless RUST_LOG is set).
    #[arg(long)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum CheckpointsCommand {
    /// Show saved sessions, newest first.
    List(CheckpointsListArgs),
    /// Remove a saved session.
    Delete(CheckpointsDeleteArgs),
}

#[derive(Debug, Args)]
pub struct CheckpointsListArgs {
    #[arg(long, default_value = DEFAULT_CHECKPOINT_DIR)]
    pub checkpoint_dir: String,
}

#[derive(Debug, Args)]
pub struct CheckpointsDeleteArgs {
    #[arg(long)]
    pub session_id: String,

    #[arg(long, default_value = DEFAULT_CHECKPOINT_DIR)]
    pub checkpoint_dir: String,
}

impl Cli {
    /// `--verbose` only exists on `harvest`.
    pub fn verbose(&self) -> bool {
        matches!(&self.command, Command::Harvest(args) if args.verbose)
    }
}
