//! CLI command definitions, routing, and tracing setup.

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use expoharvest_engine::JobManager;
use expoharvest_shared::{
    AppConfig, EngineConfig, ExtractorConfig, JobId, JobRecord, JobStatus, SourceKind,
    expand_path, init_config, load_config,
};
use expoharvest_storage::Storage;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// ExpoHarvest — harvest exhibitor listings into a local database.
#[derive(Parser)]
#[command(
    name = "expoharvest",
    version,
    about = "Extract, deduplicate and merge trade-show exhibitor data.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Initialize the config file with defaults.
    Init,

    /// Run an extraction job and follow it to completion.
    Run {
        /// Trade show name (resolved case-insensitively, created on first use).
        #[arg(long)]
        show: String,

        /// Tenant scope the job belongs to.
        #[arg(long, env = "EXPOHARVEST_SCOPE")]
        scope: String,

        /// Base URL of the exhibitor feed.
        #[arg(long, conflicts_with = "demo")]
        url: Option<String>,

        /// Use the built-in demo dataset instead of a live feed.
        #[arg(long)]
        demo: bool,

        /// Recorded as the job's creator.
        #[arg(long, default_value = "cli")]
        created_by: String,
    },

    /// Print the stored state of a job.
    Status {
        /// Job id.
        job_id: String,
    },

    /// List recent jobs for a scope, newest first.
    History {
        /// Tenant scope to list.
        #[arg(long, env = "EXPOHARVEST_SCOPE")]
        scope: String,

        /// Maximum number of jobs to show.
        #[arg(long)]
        limit: Option<u32>,
    },

    /// List reconciled exhibitors for a trade show.
    Exhibitors {
        /// Trade show name.
        #[arg(long)]
        show: String,

        /// Tenant scope the show belongs to.
        #[arg(long, env = "EXPOHARVEST_SCOPE")]
        scope: String,

        /// Emit the full records as JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "expoharvest=info",
        1 => "expoharvest=debug",
        _ => "expoharvest=trace",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Init => cmd_init().await,
        Command::Run {
            show,
            scope,
            url,
            demo,
            created_by,
        } => cmd_run(&show, &scope, url.as_deref(), demo, &created_by).await,
        Command::Status { job_id } => cmd_status(&job_id).await,
        Command::History { scope, limit } => cmd_history(&scope, limit).await,
        Command::Exhibitors { show, scope, json } => cmd_exhibitors(&show, &scope, json).await,
    }
}

/// Open storage at the configured database path.
async fn open_storage(config: &AppConfig) -> Result<Storage> {
    let db_path = expand_path(&config.defaults.db_path)?;
    Ok(Storage::open(&db_path).await?)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_run(
    show: &str,
    scope: &str,
    url: Option<&str>,
    demo: bool,
    created_by: &str,
) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage(&config).await?;
    let manager = JobManager::new(Arc::new(storage), EngineConfig::from(&config));

    let extractor_config = if demo {
        ExtractorConfig {
            source: SourceKind::Fixture,
            base_url: None,
            page_size: config.source.page_size,
            rate_limit_ms: 0,
        }
    } else {
        let url = url.ok_or_else(|| eyre!("either --url or --demo is required"))?;
        ExtractorConfig::json_api(url, &config.source)
    };

    info!(show, scope, source = ?extractor_config.source, "starting extraction job");
    let job_id = manager
        .start(created_by, scope, show, &extractor_config)
        .await?;
    println!("Job started: {job_id}");

    let record = follow_job(&manager, &job_id).await?;
    print_run_summary(&record);

    if record.status == JobStatus::Failed {
        return Err(eyre!("job {job_id} failed; see errors above"));
    }
    Ok(())
}

/// Follow a running job: render live progress, request a cooperative stop
/// on ctrl-C, and return the final stored record.
async fn follow_job(manager: &JobManager, job_id: &JobId) -> Result<JobRecord> {
    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {pos:>3}% {msg}")
            .expect("progress template"),
    );

    let mut events = manager.subscribe(job_id);
    // The progress channel is best-effort; storage polling is what actually
    // decides when the job is finished.
    let mut poll = tokio::time::interval(Duration::from_millis(250));
    let mut stop_requested = false;

    loop {
        tokio::select! {
            Ok(event) = events.recv() => {
                bar.set_position(u64::from(event.progress));
                let pages = if event.total_pages > 0 {
                    format!("page {}/{}", event.current_page, event.total_pages)
                } else {
                    format!("page {}", event.current_page)
                };
                bar.set_message(format!(
                    "{} · {} extracted, {} saved, {} merged",
                    pages, event.records_extracted, event.records_saved, event.records_merged
                ));
            }
            _ = tokio::signal::ctrl_c(), if !stop_requested => {
                stop_requested = true;
                bar.set_message("stopping at next checkpoint...".to_string());
                // The job may already have finished on its own
                let _ = manager.stop(job_id);
            }
            _ = poll.tick() => {
                let record = manager
                    .status(job_id)
                    .await?
                    .ok_or_else(|| eyre!("job {job_id} vanished from storage"))?;
                if record.status.is_terminal() {
                    bar.finish_and_clear();
                    return Ok(record);
                }
            }
        }
    }
}

fn print_run_summary(record: &JobRecord) {
    println!();
    println!("  Status:    {}", record.status);
    println!("  Show:      {}", record.show_name);
    println!("  Pages:     {}", record.current_page);
    println!("  Extracted: {}", record.records_extracted);
    println!("  Saved:     {}", record.records_saved);
    println!("  Merged:    {}", record.records_merged);
    println!("  Errors:    {}", record.error_count);
    if let (Some(started), Some(ended)) = (record.started_at, record.completed_at) {
        let elapsed = (ended - started).num_milliseconds().max(0) as f64 / 1000.0;
        println!("  Time:      {elapsed:.1}s");
    }
    for error in &record.errors {
        match error.page_number {
            Some(page) => println!("  error (page {page}): {}", error.message),
            None => println!("  error: {}", error.message),
        }
    }
    println!();
}

async fn cmd_status(job_id: &str) -> Result<()> {
    let job_id: JobId = job_id
        .parse()
        .map_err(|e| eyre!("invalid job id '{job_id}': {e}"))?;

    let config = load_config()?;
    let storage = open_storage(&config).await?;

    match storage.get_job(&job_id).await? {
        Some(record) => {
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
        None => Err(eyre!("no job found with id {job_id}")),
    }
}

async fn cmd_history(scope: &str, limit: Option<u32>) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage(&config).await?;
    let limit = limit.unwrap_or(config.defaults.history_limit);

    let jobs = storage.list_jobs_by_scope(scope, limit).await?;
    if jobs.is_empty() {
        println!("No jobs found for scope '{scope}'.");
        return Ok(());
    }

    println!(
        "{:<38} {:<10} {:>5} {:>9} {:>7} {:>7}  {}",
        "JOB", "STATUS", "PROG", "EXTRACTED", "SAVED", "ERRORS", "SHOW"
    );
    for job in jobs {
        println!(
            "{:<38} {:<10} {:>4}% {:>9} {:>7} {:>7}  {}",
            job.job_id.to_string(),
            job.status.to_string(),
            job.progress,
            job.records_extracted,
            job.records_saved,
            job.error_count,
            job.show_name
        );
    }
    Ok(())
}

async fn cmd_exhibitors(show: &str, scope: &str, json: bool) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage(&config).await?;

    let trade_show = storage
        .find_trade_show(scope, show)
        .await?
        .ok_or_else(|| eyre!("no trade show named '{show}' in scope '{scope}'"))?;

    let exhibitors = storage.list_exhibitors_by_show(&trade_show.id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&exhibitors)?);
        return Ok(());
    }

    if exhibitors.is_empty() {
        println!("No exhibitors recorded for '{}'.", trade_show.name);
        return Ok(());
    }

    println!("Exhibitors for '{}' ({}):", trade_show.name, exhibitors.len());
    for exhibitor in exhibitors {
        let mut line = format!("  {}", exhibitor.company_name);
        if !exhibitor.booth_no.is_empty() {
            line.push_str(&format!("  [booth {}]", exhibitor.booth_no));
        }
        if !exhibitor.website.is_empty() {
            line.push_str(&format!("  {}", exhibitor.website));
        }
        if !exhibitor.contacts.is_empty() {
            line.push_str(&format!("  ({} contacts)", exhibitor.contacts.len()));
        }
        println!("{line}");
    }
    Ok(())
}
