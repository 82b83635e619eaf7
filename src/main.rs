use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use monorepo_fanout::config::{AppConfig, Backend};
use monorepo_fanout::dry_run::{DryRunPlatform, DryRunPublisher};
use monorepo_fanout::error::Result;
use monorepo_fanout::labels::CategoryLabeler;
use monorepo_fanout::output::OutputChannel;
use monorepo_fanout::platform::gh_cli::GhCliPlatform;
use monorepo_fanout::platform::github::GitHubPlatform;
use monorepo_fanout::platform::Platform;
use monorepo_fanout::repos::{load_repo_config, SubtreeEntry};
use monorepo_fanout::workflow::{
    category_label, close, detect, fanout, label_catalog, reflect, sync_labels, PrTarget,
};
use monorepo_fanout::workspace::{GitSubtreePublisher, SubtreePublisher};

#[derive(Parser)]
#[command(
    name = "monorepo-fanout",
    about = "Fan monorepo pull requests out to component repositories"
)]
struct Cli {
    /// Subtree definitions (JSON)
    #[arg(long, global = true, default_value = ".github/repos-config.json")]
    config: PathBuf,

    /// Application settings file
    #[arg(long, global = true)]
    settings: Option<String>,

    /// Override `github.backend`
    #[arg(long, global = true, value_enum)]
    backend: Option<Backend>,

    /// Log intended writes instead of performing them
    #[arg(long, global = true)]
    dry_run: bool,

    #[arg(long, global = true)]
    debug: bool,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Where step outputs are appended
    #[arg(long, global = true, env = "GITHUB_OUTPUT")]
    output_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Args)]
struct PrArgs {
    /// Monorepo as `org/repo`
    #[arg(long)]
    repo: String,

    /// Monorepo pull request number
    #[arg(long)]
    pr: u64,
}

impl PrArgs {
    fn target(&self) -> PrTarget {
        PrTarget::new(&self.repo, self.pr)
    }
}

#[derive(Subcommand)]
enum Command {
    /// Write the subtrees a PR touches to the `subtrees` output
    DetectSubtrees(PrArgs),
    /// Sync `<category>: <name>` labels on the monorepo PR
    CategoryLabels(PrArgs),
    /// Push changed subtrees and open or refresh their mirrored PRs
    Fanout {
        #[command(flatten)]
        pr: PrArgs,
        /// Newline-separated subtree names; detected from the PR when omitted
        #[arg(long)]
        subtrees: Option<String>,
        /// Monorepo checkout to split from
        #[arg(long, default_value = ".")]
        workdir: PathBuf,
    },
    /// Reflect mirrored PR checks onto the monorepo PR
    ReflectChecks(PrArgs),
    /// Copy monorepo PR labels onto mirrored PRs
    SyncLabels(PrArgs),
    /// Close mirrored PRs and delete their branches
    CloseFanouts(PrArgs),
    /// Gather every sub-repository's labels into one catalog
    CollectLabels {
        #[arg(long, default_value = ".github/labels.yml")]
        output: PathBuf,
    },
    /// Create or update a repository's labels from the catalog
    ApplyLabelCatalog {
        #[arg(long)]
        repo: String,
        #[arg(long, default_value = ".github/labels.yml")]
        catalog: PathBuf,
    },
}

impl Command {
    fn writes_outputs(&self) -> bool {
        matches!(self, Command::DetectSubtrees(_) | Command::CategoryLabels(_))
    }
}

fn init_tracing(debug: bool, format: LogFormat) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let fmt_layer = match format {
        LogFormat::Text => tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(filter)
        .init();
}

async fn build_platform(config: &AppConfig, dry_run: bool) -> Result<Arc<dyn Platform>> {
    let platform: Arc<dyn Platform> = match config.github.backend {
        Backend::Cli => Arc::new(GhCliPlatform::new().await?),
        Backend::Api => Arc::new(GitHubPlatform::new(&config.github)?),
    };
    tracing::debug!(backend = ?config.github.backend, dry_run, "Platform ready");

    if dry_run {
        Ok(Arc::new(DryRunPlatform::new(platform)))
    } else {
        Ok(platform)
    }
}

fn parse_subtree_list(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = AppConfig::load(cli.settings.as_deref())?;
    if let Some(backend) = cli.backend {
        config.github.backend = backend;
    }
    tracing::debug!(config = ?config, "Loaded settings");

    let load_entries = || -> Result<Vec<SubtreeEntry>> { load_repo_config(&cli.config) };

    let output = if cli.command.writes_outputs() {
        Some(OutputChannel::resolve(cli.output_file.clone(), cli.dry_run)?)
    } else {
        None
    };

    match &cli.command {
        Command::DetectSubtrees(pr) => {
            let entries = load_entries()?;
            let platform = build_platform(&config, cli.dry_run).await?;
            let subtrees =
                detect::detect_changed_subtrees(platform.as_ref(), &pr.target(), &entries).await?;
            if let Some(output) = &output {
                output.write_lines("subtrees", &subtrees)?;
            }
        }
        Command::CategoryLabels(pr) => {
            let entries = load_entries()?;
            let platform = build_platform(&config, cli.dry_run).await?;
            let labeler = CategoryLabeler::new(config.labels.category_prefixes.clone(), &entries);
            let diff = category_label::update_category_labels(
                platform.as_ref(),
                &pr.target(),
                &entries,
                &labeler,
            )
            .await?;
            if let Some(output) = &output {
                output.write_value("add", &diff.add.join(","))?;
                output.write_value("remove", &diff.remove.join(","))?;
            }
        }
        Command::Fanout {
            pr,
            subtrees,
            workdir,
        } => {
            let entries = load_entries()?;
            let platform = build_platform(&config, cli.dry_run).await?;
            let target = pr.target();

            let names = match subtrees {
                Some(raw) => parse_subtree_list(raw),
                None => detect::detect_changed_subtrees(platform.as_ref(), &target, &entries).await?,
            };
            let selected = fanout::select_entries(&entries, &names);
            if selected.is_empty() {
                tracing::info!(repo = %target.repo, pr = target.pr, "Nothing to fan out");
                return Ok(());
            }

            let publisher: Box<dyn SubtreePublisher> = if cli.dry_run {
                Box::new(DryRunPublisher)
            } else {
                Box::new(GitSubtreePublisher::new(workdir.clone()))
            };

            let report =
                fanout::fanout(platform.as_ref(), publisher.as_ref(), &target, &selected).await;
            for (subtree, state) in report.finish()? {
                tracing::info!(subtree = %subtree, state = ?state, "Fanout done");
            }
        }
        Command::ReflectChecks(pr) => {
            let entries = load_entries()?;
            let platform = build_platform(&config, cli.dry_run).await?;
            let report = reflect::reflect_checks(platform.as_ref(), &pr.target(), &entries).await?;
            for (subtree, outcome) in report.finish()? {
                tracing::debug!(subtree = %subtree, outcome = ?outcome, "Reflection done");
            }
        }
        Command::SyncLabels(pr) => {
            let entries = load_entries()?;
            let platform = build_platform(&config, cli.dry_run).await?;
            let report =
                sync_labels::sync_labels(platform.as_ref(), &pr.target(), &entries).await?;
            for (subtree, outcome) in report.finish()? {
                tracing::debug!(subtree = %subtree, outcome = ?outcome, "Label sync done");
            }
        }
        Command::CloseFanouts(pr) => {
            let entries = load_entries()?;
            let platform = build_platform(&config, cli.dry_run).await?;
            let report = close::close_fanouts(platform.as_ref(), &pr.target(), &entries).await;
            for (subtree, outcome) in report.finish()? {
                tracing::debug!(subtree = %subtree, outcome = ?outcome, "Close done");
            }
        }
        Command::CollectLabels { output: path } => {
            let entries = load_entries()?;
            let platform = build_platform(&config, cli.dry_run).await?;
            let catalog = label_catalog::collect_labels(platform.as_ref(), &entries).await?;
            label_catalog::write_catalog(path, &catalog, cli.dry_run)?;
        }
        Command::ApplyLabelCatalog { repo, catalog } => {
            let labels = label_catalog::read_catalog(catalog)?;
            let platform = build_platform(&config, cli.dry_run).await?;
            let report = label_catalog::apply_label_catalog(platform.as_ref(), repo, &labels).await?;
            for (label, action) in report.finish()? {
                tracing::debug!(label = %label, action = ?action, "Label applied");
            }
        }
    }

    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug, cli.log_format);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Run failed");
            ExitCode::from(e.exit_code())
        }
    }
}
