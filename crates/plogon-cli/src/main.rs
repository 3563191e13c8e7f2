use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Command;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;

use plogon_config::Config;
use plogon_container::ContainerExecutor;
use plogon_core::needs::SafeLists;
use plogon_core::{
    BuildDeps, Mode, NoopIssueCommenter, NoopPrLabeler, NoopWebServices, NullBlobStore,
    Orchestrator, RunReport, TaskOutcome,
};
use plogon_manifest::{ManifestStore, ScanOptions};
use plogon_state::StateStore;
use plogon_toolchain::{ToolchainProvider, TrackOverrides};
use plogon_types::Reporter;
use plogon_webhook::{WebhookConfig, WebhookType};

mod progress;

/// Operating mode, mirroring `plogon_core::Mode` at the CLI boundary so
/// `clap` can derive a `--mode` flag without that crate depending on
/// `clap` itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CliMode {
    PullRequest,
    Commit,
    Continuous,
    Development,
}

impl From<CliMode> for Mode {
    fn from(mode: CliMode) -> Self {
        match mode {
            CliMode::PullRequest => Mode::PullRequest,
            CliMode::Commit => Mode::Commit,
            CliMode::Continuous => Mode::Continuous,
            CliMode::Development => Mode::Development,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CliWebhookType {
    Generic,
    Slack,
    Discord,
}

impl From<CliWebhookType> for WebhookType {
    fn from(kind: CliWebhookType) -> Self {
        match kind {
            CliWebhookType::Generic => WebhookType::Generic,
            CliWebhookType::Slack => WebhookType::Slack,
            CliWebhookType::Discord => WebhookType::Discord,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "plogon", version)]
#[command(about = "Reproducible plugin build orchestrator")]
struct Cli {
    /// Root containing `stable/`, `testing/<track>/`, and `plogon.toml`.
    #[arg(long, default_value = ".")]
    manifest_root: PathBuf,

    /// Directory holding `plogon-state.toml`.
    #[arg(long, default_value = ".plogon")]
    state_dir: PathBuf,

    /// Scratch root for per-task source clones.
    #[arg(long, default_value = ".plogon/work")]
    work_dir: PathBuf,

    /// Scratch root for per-task container output.
    #[arg(long, default_value = ".plogon/output")]
    output_dir: PathBuf,

    /// Scratch root for per-task hydrated packages.
    #[arg(long, default_value = ".plogon/packages")]
    packages_dir: PathBuf,

    /// Root published build artifacts are copied into, keyed by
    /// `<channel>/<internal_name>/`.
    #[arg(long, default_value = ".plogon/artifacts")]
    artifact_dir: PathBuf,

    /// `/static` bind mount contents (holds `entrypoint.sh`).
    #[arg(long, default_value = "static")]
    static_dir: PathBuf,

    /// Toolchain release cache, overriding `plogon.toml`'s value.
    #[arg(long)]
    releases_dir: Option<PathBuf>,

    /// Toolchain feed host builds fetch their runtime bundle from.
    #[arg(long)]
    toolchain_feed: Option<String>,

    /// Dependency package feed host, overriding `plogon.toml`'s value.
    #[arg(long)]
    package_feed: Option<String>,

    /// File extension locked packages are published under.
    #[arg(long, default_value = "nupkg")]
    package_extension: String,

    /// Operating mode (spec §6).
    #[arg(long, value_enum, default_value = "commit")]
    mode: CliMode,

    /// Container image override, applied when a manifest declares none.
    #[arg(long)]
    container_image: Option<String>,

    /// Required API level, overriding `plogon.toml`'s `[build]` value.
    #[arg(long)]
    required_api_level: Option<u32>,

    /// Acting identity, checked against manifest owners in gated modes.
    #[arg(long)]
    actor: Option<String>,

    /// Identity treated as privileged regardless of per-manifest
    /// ownership (repeatable).
    #[arg(long = "privileged-actor")]
    privileged_actors: Vec<String>,

    /// Bypass ownership gating unconditionally.
    #[arg(long)]
    build_all: bool,

    /// Identity recorded as the approver of newly reviewed needs.
    #[arg(long, default_value = "ci")]
    reviewer: String,

    /// Path to a unified diff file, narrowing the scan to its affected
    /// manifests in `pull-request` mode.
    #[arg(long)]
    pr_diff: Option<PathBuf>,

    /// RFC 3339 cutoff instant, applied in `continuous` mode.
    #[arg(long)]
    cutoff_date: Option<String>,

    /// Webhook destination URL; omit to disable notifications.
    #[arg(long)]
    webhook_url: Option<String>,

    /// Webhook payload format.
    #[arg(long, value_enum, default_value = "generic")]
    webhook_type: CliWebhookType,

    /// Increase log verbosity (repeatable). Overridden by `RUST_LOG` if set.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the deterministic task plan without building anything.
    Plan,
    /// Execute the plan (builds, removals, needs review, state commit).
    Run,
    /// Print the current repository state ledger.
    Status,
    /// Print environment diagnostics (git, container engine, toolchain feed).
    Doctor,
}

struct CliReporter;

impl Reporter for CliReporter {
    fn info(&mut self, msg: &str) {
        tracing::info!("{msg}");
        eprintln!("[info] {msg}");
    }

    fn warn(&mut self, msg: &str) {
        tracing::warn!("{msg}");
        eprintln!("[warn] {msg}");
    }

    fn error(&mut self, msg: &str) {
        tracing::error!("{msg}");
        eprintln!("[error] {msg}");
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    install_tracing(cli.verbose);

    std::fs::create_dir_all(&cli.state_dir).context("failed to create state dir")?;
    std::fs::create_dir_all(&cli.work_dir).context("failed to create work dir")?;
    std::fs::create_dir_all(&cli.output_dir).context("failed to create output dir")?;
    std::fs::create_dir_all(&cli.packages_dir).context("failed to create packages dir")?;
    std::fs::create_dir_all(&cli.artifact_dir).context("failed to create artifact dir")?;

    let file_config = plogon_config::load_config(&cli.manifest_root).context("failed to load plogon.toml")?;
    let config = apply_cli_overrides(file_config, &cli);

    let mode: Mode = cli.mode.into();
    let state_store = StateStore::new(&cli.state_dir);
    let state = state_store.load().context("failed to load repository state")?;

    let scan_options = build_scan_options(&cli, mode)?;
    let manifests = ManifestStore::scan(&cli.manifest_root, &scan_options);
    for (path, failure) in &manifests.failures {
        eprintln!("[warn] {}: {failure}", path.display());
    }

    let tasks = plogon_core::plan_tasks(&manifests, &state, mode);

    match cli.cmd {
        Commands::Plan => {
            print_plan(&tasks);
            Ok(())
        }
        Commands::Run => run_tasks(&cli, &config, mode, tasks),
        Commands::Status => {
            print_status(&state);
            Ok(())
        }
        Commands::Doctor => run_doctor(&cli, &config),
    }
}

fn install_tracing(verbose: u8) {
    use tracing_subscriber::EnvFilter;

    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(format!("plogon={default_level}")));

    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn build_scan_options(cli: &Cli, mode: Mode) -> Result<ScanOptions> {
    let pr_diff = cli
        .pr_diff
        .as_ref()
        .map(std::fs::read_to_string)
        .transpose()
        .context("failed to read --pr-diff file")?;

    let cutoff_date = cli
        .cutoff_date
        .as_deref()
        .map(|text| chrono::DateTime::parse_from_rfc3339(text).map(|dt| dt.with_timezone(&chrono::Utc)))
        .transpose()
        .context("invalid --cutoff-date; expected RFC 3339")?;

    Ok(ScanOptions {
        pr_diff,
        ignore_non_affected: mode.filters_affected_set(),
        cutoff_date: if mode.enforces_cutoff_date() { cutoff_date } else { None },
        repo_root: Some(cli.manifest_root.clone()),
    })
}

fn apply_cli_overrides(mut config: Config, cli: &Cli) -> Config {
    if let Some(image) = &cli.container_image {
        config.container.default_image = image.clone();
    }
    if let Some(releases_dir) = &cli.releases_dir {
        config.toolchain.releases_dir = Some(releases_dir.clone());
    }
    if let Some(feed) = &cli.package_feed {
        config.hydrate.feed_host = Some(feed.clone());
    }
    if let Some(level) = cli.required_api_level {
        config.build.required_api_level = Some(plogon_types::ApiLevel(level));
    }
    if let Some(url) = &cli.webhook_url {
        config.webhook.url = Some(url.clone());
    }
    config
}

fn build_track_overrides(config: &Config) -> Result<TrackOverrides> {
    #[derive(serde::Serialize)]
    struct Doc<'a> {
        tracks: &'a BTreeMap<String, String>,
    }
    let text = toml::to_string(&Doc { tracks: &config.toolchain.tracks }).context("failed to serialize track overrides")?;
    TrackOverrides::parse(&text).context("failed to parse track overrides")
}

fn run_tasks(cli: &Cli, config: &Config, mode: Mode, tasks: Vec<plogon_types::BuildTask>) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    let _guard = runtime.enter();

    let container = ContainerExecutor::connect().context("failed to connect to container engine")?;

    let releases_dir = config
        .toolchain
        .releases_dir
        .clone()
        .unwrap_or_else(|| cli.state_dir.join("releases"));
    let toolchain_feed = cli
        .toolchain_feed
        .clone()
        .context("--toolchain-feed is required to run builds")?;
    let toolchain = ToolchainProvider::new(toolchain_feed, releases_dir);
    let track_overrides = build_track_overrides(config)?;

    let package_feed = config
        .hydrate
        .feed_host
        .clone()
        .context("dependency feed host is not configured (set [hydrate] feed_host or --package-feed)")?;
    let hydrator = plogon_core::Hydrator::new(package_feed, cli.package_extension.clone(), config.hydrate.reference_assemblies.clone());

    let mut blob_store = NullBlobStore;
    let mut issue_commenter = NoopIssueCommenter;
    let mut pr_labeler = NoopPrLabeler;
    let mut web_services = NoopWebServices;

    let safe_lists = SafeLists {
        safe_namespaces: config.needs.safe_namespaces.clone(),
        safe_exact: config.needs.safe_exact.clone(),
    };

    let webhook = config.webhook.url.clone().map(|url| WebhookConfig {
        url,
        webhook_type: cli.webhook_type.into(),
        timeout_secs: 30,
    });

    let required_api_level = config.build.required_api_level.map(|l| l.0).unwrap_or(0);

    let deps = BuildDeps {
        container: &container,
        toolchain: &toolchain,
        track_overrides: &track_overrides,
        hydrator: &hydrator,
        state_store: &StateStore::new(&cli.state_dir),
        blob_store: &mut blob_store,
        issue_commenter: &mut issue_commenter,
        pr_labeler: &mut pr_labeler,
        web_services: &mut web_services,
        safe_lists: &safe_lists,
        work_root: cli.work_dir.clone(),
        scratch_output_root: cli.output_dir.clone(),
        packages_root: cli.packages_dir.clone(),
        static_dir: cli.static_dir.clone(),
        artifact_root: cli.artifact_dir.clone(),
        default_image: config.container.default_image.clone(),
        blob_bucket: config.blob_store.destination.clone().unwrap_or_else(|| "plogon-artifacts".to_string()),
        required_api_level,
        actor: cli.actor.clone(),
        privileged_actors: cli.privileged_actors.clone(),
        build_all: cli.build_all,
        reviewer: cli.reviewer.clone(),
        cancel: CancellationToken::new(),
        webhook,
    };

    let mut orchestrator = Orchestrator::new(deps);
    let mut reporter = CliReporter;
    let report = orchestrator.run(tasks, mode, &mut reporter);

    print_run_report(&report, mode);

    let exit_code = report.exit_code(mode);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}

fn print_plan(tasks: &[plogon_types::BuildTask]) {
    println!("{} task(s) planned:", tasks.len());
    for task in tasks {
        println!("  {:?} {}/{}", task.kind, task.channel, task.internal_name);
    }
}

fn print_run_report(report: &RunReport, mode: Mode) {
    println!();
    println!("run summary ({} task(s) attempted):", report.tasks_run);
    for (task, outcome) in &report.outcomes {
        let label = format!("{}/{}", task.channel, task.internal_name);
        match outcome {
            TaskOutcome::Built { version } => println!("  {label}: built {version}"),
            TaskOutcome::Removed => println!("  {label}: removed"),
            TaskOutcome::Skipped { reason } => println!("  {label}: skipped ({reason})"),
            TaskOutcome::Failed { error } => println!("  {label}: failed ({error})"),
            TaskOutcome::NotRun => println!("  {label}: not run"),
        }
    }
    if report.aborted {
        println!();
        println!("run aborted after a fatal failure; remaining tasks were not attempted");
    }
    println!("exit_code: {}", report.exit_code(mode));
}

fn print_status(state: &plogon_types::RepositoryState) {
    for (channel_id, channel_state) in &state.channels {
        for (internal_name, plugin) in &channel_state.plugins {
            println!(
                "{channel_id}/{internal_name}: {} @ {} (built {})",
                plugin.effective_version, plugin.built_commit, plugin.time_built
            );
        }
    }
    println!("{} reviewed need(s) on record", state.reviewed_needs.len());
}

fn run_doctor(cli: &Cli, config: &Config) -> Result<()> {
    println!("manifest_root: {}", cli.manifest_root.display());
    println!("state_dir: {}", cli.state_dir.display());
    println!("container_image: {}", config.container.default_image);
    println!();

    print_cmd_version("git");

    match ContainerExecutor::connect() {
        Ok(_) => println!("container engine: reachable"),
        Err(err) => println!("container engine: unreachable ({err})"),
    }

    match &config.hydrate.feed_host {
        Some(host) => println!("dependency feed: {host}"),
        None => println!("dependency feed: not configured"),
    }

    match &cli.toolchain_feed {
        Some(feed) => println!("toolchain feed: {feed}"),
        None => println!("toolchain feed: not configured"),
    }

    Ok(())
}

fn print_cmd_version(cmd: &str) {
    match Command::new(cmd).arg("--version").output() {
        Ok(out) if out.status.success() => {
            let text = String::from_utf8_lossy(&out.stdout).trim().to_string();
            println!("{cmd}: {text}");
        }
        Ok(out) => {
            eprintln!("[warn] {cmd} --version failed: {}", String::from_utf8_lossy(&out.stderr).trim());
        }
        Err(err) => {
            eprintln!("[warn] unable to run {cmd} --version: {err}");
        }
    }
}
