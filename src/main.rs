mod cmd;
mod config;
mod context;
mod domain;
mod error;
mod infra;
mod services;
mod workflow;

use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{Level, debug, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::cmd::commit::{self as commit_cmd, CommitCommandArgs};
use crate::cmd::config::{self as config_cmd, ConfigArgs};
use crate::config::{AppConfig, ConfigOverrides};
use crate::context::AppContext;
use crate::error::AppResult;
use crate::infra::feedback::ConsoleFeedback;
use crate::infra::git::GitCli;
use crate::infra::llm::build_language_model;
use crate::workflow::model_selector::select_and_validate_map_model;
use crate::workflow::tokens::HeuristicTokenEstimator;

#[derive(Parser)]
#[command(
    name = "commitsmith",
    author,
    version,
    about = "Generate commit messages from diffs of any size"
)]
struct Cli {
    /// Show debug logs and every smart filter decision.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a commit message for the current changes.
    Generate(GenerateArgs),
    /// Manage CLI configuration.
    Config(ConfigArgs),
}

#[derive(Args)]
struct GenerateArgs {
    /// Include unstaged changes to tracked files.
    #[arg(short, long)]
    all: bool,
    /// Override the configured provider.
    #[arg(long)]
    provider: Option<String>,
    /// Override the model used for the final message.
    #[arg(short, long)]
    model: Option<String>,
    /// Override the model used for chunk summaries and filtering.
    #[arg(long)]
    map_model: Option<String>,
    /// Commit with the generated message.
    #[arg(long)]
    apply: bool,
}

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> AppResult<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Config(args) => {
            config_cmd::run(args.command)?;
            Ok(())
        }
        Commands::Generate(args) => run_generate(args, cli.verbose).await,
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(level.into()))
        .try_init();
}

async fn run_generate(args: GenerateArgs, verbose: bool) -> AppResult<()> {
    let cwd = std::env::current_dir()?;
    let overrides = ConfigOverrides {
        provider: args.provider,
        model: args.model,
        map_model: args.map_model,
    };
    let mut config = AppConfig::load(&cwd, &overrides)?;
    if verbose {
        config.smart_filter.log_decisions = true;
    }

    if config.llm_provider.requires_api_key() && config.api_key.is_none() {
        eprintln!(
            "Warning: no API key configured for {}; run `commitsmith config init` or set COMMITSMITH_API_KEY.",
            config.llm_provider.as_str()
        );
    }

    let token_estimator = Arc::new(HeuristicTokenEstimator::for_model(
        &config.llm_provider,
        &config.model,
        &config.token_budget,
    ));
    let map_model = select_and_validate_map_model(&config);
    let map_token_estimator = Arc::new(HeuristicTokenEstimator::for_model(
        &config.llm_provider,
        &map_model,
        &config.token_budget,
    ));
    debug!(
        provider = config.llm_provider.as_str(),
        model = %config.model,
        map_model = %map_model,
        context_window = token_estimator.context_window(),
        map_context_window = map_token_estimator.context_window(),
        "resolved configuration"
    );
    config.map_model = Some(map_model);

    let language_model = build_language_model(&config)?;
    let git = Arc::new(GitCli::new(config.workspace_root.clone()));
    let feedback = Arc::new(ConsoleFeedback::new(verbose));
    let context = AppContext::new(
        config,
        git,
        language_model,
        token_estimator,
        map_token_estimator,
        feedback,
    );

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling");
            on_interrupt.cancel();
        }
    });

    let outcome = commit_cmd::run(
        &context,
        CommitCommandArgs {
            all: args.all,
            apply: args.apply,
        },
        &cancel,
    )
    .await?;

    println!("{}", outcome.message);
    if outcome.committed {
        eprintln!("Committed {} file(s).", outcome.files);
    }

    Ok(())
}
