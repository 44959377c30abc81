use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser as _;
use tokio_util::sync::CancellationToken;

use bookharvest::diagnostics::{Diagnostics, TracingDiagnostics};
use bookharvest::run::Outcome;

const EXIT_INTERRUPTED: u8 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    match try_main().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn try_main() -> anyhow::Result<ExitCode> {
    let cli = bookharvest::cli::Cli::parse();
    bookharvest::logging::init(cli.verbose()).context("init logging")?;
    tracing::debug!(?cli, "parsed cli");

    let diagnostics: Arc<dyn Diagnostics> = Arc::new(TracingDiagnostics);

    match cli.command {
        bookharvest::cli::Command::Harvest(args) => {
            let config = bookharvest::config::RunConfig::from_args(&args).context("config")?;

            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("interrupt received; saving checkpoint");
                    on_signal.cancel();
                }
            });

            let outcome = bookharvest::run::harvest(config, &cancel, diagnostics)
                .await
                .context("harvest")?;
            let code = match &outcome {
                Outcome::Completed { .. } => ExitCode::SUCCESS,
                Outcome::Interrupted { .. } => ExitCode::from(EXIT_INTERRUPTED),
                Outcome::Failed { .. } => ExitCode::FAILURE,
            };
            println!("{}", bookharvest::run::report(&outcome));
            Ok(code)
        }
        bookharvest::cli::Command::Checkpoints {
            command: bookharvest::cli::CheckpointsCommand::List(args),
        } => {
            println!("{}", bookharvest::run::list_checkpoints(args, diagnostics)?);
            Ok(ExitCode::SUCCESS)
        }
        bookharvest::cli::Command::Checkpoints {
            command: bookharvest::cli::CheckpointsCommand::Delete(args),
        } => {
            println!(
                "{}",
                bookharvest::run::delete_checkpoint(args, diagnostics).context("delete")?
            );
            Ok(ExitCode::SUCCESS)
        }
    }
}
