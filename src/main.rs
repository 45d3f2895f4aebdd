//! Sumi-Harvest main entry point
//!
//! This is the command-line interface for the Sumi-Harvest page extractor.

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use sumi_harvest::bulk::{parse_bulk_csv, AuthBlock, AuthMethod, BulkSpec};
use sumi_harvest::config::{load_config_with_hash, Config};
use sumi_harvest::crawler::{
    preview_page, AuthConfig, BasicAuth, Coordinator, CrawlMode, CrawlRequest, OutputFormat,
    PagePreview,
};
use sumi_harvest::extract::{LinkTypeFilter, ScopeSelector};
use sumi_harvest::state::{CrawlOutcome, Job, JobStatus};
use sumi_harvest::storage::{InputMethod, JobStorage, JsonJobStore, SavedJob, SavedJobStore};
use tracing_subscriber::EnvFilter;

/// Sumi-Harvest: scoped web page extraction
///
/// Sumi-Harvest fetches pages and converts them to text, Markdown, styled
/// HTML or link lists, optionally restricted to one element by class or id.
/// Every run is recorded as a job with per-URL results.
#[derive(Parser, Debug)]
#[command(name = "sumi-harvest")]
#[command(version = "1.0.0")]
#[command(about = "Scoped web page extraction", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (defaults apply when omitted)
    #[arg(short, long, value_name = "CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract a single URL
    Crawl(CrawlArgs),

    /// Extract every URL listed in a CSV file
    Bulk(BulkArgs),

    /// Fetch a page and report its title, scope match and classes without writing output
    Preview(PreviewArgs),

    /// Inspect or delete recorded jobs
    #[command(subcommand)]
    Jobs(JobsCommand),

    /// Manage and run saved crawl configurations
    #[command(subcommand)]
    Saved(SavedCommand),
}

#[derive(Args, Debug)]
struct CrawlArgs {
    /// Page to extract
    url: String,

    /// content or link
    #[arg(long, default_value = "content")]
    mode: CrawlMode,

    /// Output formats, comma separated (txt, md, html for content; txt, json for links)
    #[arg(long, default_value = "txt")]
    format: String,

    /// Restrict extraction to the first element with this class
    #[arg(long)]
    scope_class: Option<String>,

    /// Restrict extraction to the element with this id
    #[arg(long)]
    scope_id: Option<String>,

    /// Download referenced images next to the output
    #[arg(long)]
    download_images: bool,

    /// all, internal or external
    #[arg(long, default_value = "all")]
    link_type: LinkTypeFilter,

    /// Drop links that only point to a fragment of the same page
    #[arg(long)]
    exclude_anchors: bool,

    /// Cookie string, `k=v; k2=v2` or a JSON object
    #[arg(long)]
    cookies: Option<String>,

    /// Extra request header as NAME:VALUE (repeatable)
    #[arg(long = "header", value_name = "NAME:VALUE")]
    headers: Vec<String>,

    /// Basic auth username
    #[arg(long, requires = "basic_password")]
    basic_user: Option<String>,

    /// Basic auth password
    #[arg(long, requires = "basic_user")]
    basic_password: Option<String>,

    /// Also store this configuration as a saved job under NAME
    #[arg(long, value_name = "NAME")]
    save_as: Option<String>,
}

#[derive(Args, Debug)]
struct PreviewArgs {
    /// Page to preview
    url: String,

    /// Check whether an element with this class exists
    #[arg(long)]
    scope_class: Option<String>,

    /// Check whether the element with this id exists
    #[arg(long)]
    scope_id: Option<String>,

    /// Cookie string, `k=v; k2=v2` or a JSON object
    #[arg(long)]
    cookies: Option<String>,

    /// Extra request header as NAME:VALUE (repeatable)
    #[arg(long = "header", value_name = "NAME:VALUE")]
    headers: Vec<String>,

    /// Basic auth username
    #[arg(long, requires = "basic_password")]
    basic_user: Option<String>,

    /// Basic auth password
    #[arg(long, requires = "basic_user")]
    basic_password: Option<String>,

    /// Print the preview as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct BulkArgs {
    /// CSV file with a `url` column
    csv: PathBuf,

    /// Merge text and Markdown outputs into combined_results/
    #[arg(long)]
    combine: bool,

    /// Batch-wide auth for rows without their own: cookies, headers or basic
    #[arg(long)]
    auth_method: Option<AuthMethod>,

    /// Batch-wide cookie string
    #[arg(long)]
    cookies: Option<String>,

    /// Batch-wide headers as a JSON object
    #[arg(long)]
    auth_headers: Option<String>,

    /// Batch-wide basic auth username
    #[arg(long)]
    basic_user: Option<String>,

    /// Batch-wide basic auth password
    #[arg(long)]
    basic_password: Option<String>,

    /// Also store this configuration as a saved job under NAME
    #[arg(long, value_name = "NAME")]
    save_as: Option<String>,
}

#[derive(Subcommand, Debug)]
enum JobsCommand {
    /// List recent jobs, newest first
    List {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Show one job with all of its results
    Show { id: String },
    /// Delete a job and its output folders
    Delete { id: String },
}

#[derive(Subcommand, Debug)]
enum SavedCommand {
    /// List saved jobs, most recently updated first
    List,
    /// Run a saved job by name or id
    Run { name_or_id: String },
    /// Delete a saved job
    Delete { id: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            match load_config_with_hash(path) {
                Ok((cfg, hash)) => {
                    tracing::info!("Configuration loaded successfully (hash: {})", hash);
                    cfg
                }
                Err(e) => {
                    tracing::error!("Failed to load configuration: {}", e);
                    return Err(e.into());
                }
            }
        }
        None => {
            tracing::debug!("No configuration file given, using defaults");
            Config::default()
        }
    };
    let config = Arc::new(config);

    let finished = match cli.command {
        Command::Crawl(args) => handle_crawl(config, args).await?,
        Command::Bulk(args) => handle_bulk(config, args).await?,
        Command::Preview(args) => {
            handle_preview(config, args).await?;
            None
        }
        Command::Jobs(command) => {
            handle_jobs(config, command)?;
            None
        }
        Command::Saved(command) => handle_saved(config, command).await?,
    };

    if finished.is_some_and(|job| job.status() == JobStatus::Failed) {
        std::process::exit(1);
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sumi_harvest=info,warn"),
            1 => EnvFilter::new("sumi_harvest=debug,info"),
            2 => EnvFilter::new("sumi_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn open_stores(config: &Config) -> anyhow::Result<(Arc<JsonJobStore>, SavedJobStore)> {
    let jobs = JsonJobStore::open(&config.output.job_history_path)
        .with_context(|| format!("opening job store {}", config.output.job_history_path))?;
    let saved = SavedJobStore::open(&config.output.saved_jobs_path)
        .with_context(|| format!("opening saved jobs {}", config.output.saved_jobs_path))?;
    Ok((Arc::new(jobs), saved))
}

fn coordinator(config: Arc<Config>, store: Arc<JsonJobStore>) -> anyhow::Result<Coordinator> {
    Ok(Coordinator::new(config, store)?)
}

/// Splits `NAME:VALUE` header arguments
fn parse_header_args(headers: &[String]) -> anyhow::Result<BTreeMap<String, String>> {
    let mut parsed = BTreeMap::new();
    for header in headers {
        let Some((name, value)) = header.split_once(':') else {
            bail!("Header '{}' must be NAME:VALUE", header);
        };
        parsed.insert(name.trim().to_string(), value.trim().to_string());
    }
    Ok(parsed)
}

/// Assembles request auth from the shared command-line flags
fn auth_from_args(
    cookies: Option<&str>,
    headers: BTreeMap<String, String>,
    basic_user: Option<String>,
    basic_password: Option<String>,
) -> AuthConfig {
    AuthConfig {
        cookies: cookies
            .map(sumi_harvest::bulk::parse_cookie_string)
            .unwrap_or_default(),
        headers,
        basic: basic_user
            .zip(basic_password)
            .map(|(username, password)| BasicAuth { username, password }),
    }
}

/// Handles `preview`: fetches the page and prints what an extraction would see
async fn handle_preview(config: Arc<Config>, args: PreviewArgs) -> anyhow::Result<()> {
    let auth = auth_from_args(
        args.cookies.as_deref(),
        parse_header_args(&args.headers)?,
        args.basic_user,
        args.basic_password,
    );
    let scope = ScopeSelector::new(args.scope_class, args.scope_id);

    let preview = preview_page(&config.fetcher, args.url.trim(), &auth, &scope).await?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&preview)?);
    } else {
        print_preview(&preview, &scope);
    }
    Ok(())
}

/// Handles `crawl`: runs one URL as a job and prints the outcome
async fn handle_crawl(config: Arc<Config>, args: CrawlArgs) -> anyhow::Result<Option<Job>> {
    let headers = parse_header_args(&args.headers)?;

    let mut request = CrawlRequest::new(args.url.trim());
    request.mode = args.mode;
    request.formats = OutputFormat::parse_list(&args.format).map_err(anyhow::Error::msg)?;
    request.scope = ScopeSelector::new(args.scope_class, args.scope_id);
    request.download_images = args.download_images;
    request.link_type = args.link_type;
    request.exclude_anchors = args.exclude_anchors;
    request.auth = auth_from_args(
        args.cookies.as_deref(),
        headers.clone(),
        args.basic_user.clone(),
        args.basic_password.clone(),
    );

    let (store, saved) = open_stores(&config)?;

    if let Some(name) = &args.save_as {
        // A saved job keeps one auth method; basic wins, then headers
        let auth = if let (Some(user), Some(password)) = (&args.basic_user, &args.basic_password) {
            Some(AuthBlock::basic(user, password))
        } else if !headers.is_empty() {
            Some(AuthBlock::headers(serde_json::to_string(&headers)?))
        } else {
            args.cookies.as_ref().map(AuthBlock::cookies)
        };
        let created = saved.create(SavedJob::single(name, &request, auth))?;
        println!("Saved as '{}' ({})", created.name, created.saved_job_id);
    }

    let job = coordinator(config, store)?.crawl_single(request).await?;
    print_job(&job);
    Ok(Some(job))
}

/// Handles `bulk`: starts the job and polls the store until it ends
async fn handle_bulk(config: Arc<Config>, args: BulkArgs) -> anyhow::Result<Option<Job>> {
    let csv_content = std::fs::read_to_string(&args.csv)
        .with_context(|| format!("reading {}", args.csv.display()))?;
    let csv_filename = args
        .csv
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| args.csv.display().to_string());

    let global_auth = args.auth_method.map(|method| AuthBlock {
        method,
        cookies: args.cookies.clone(),
        auth_headers: args.auth_headers.clone(),
        basic_auth_username: args.basic_user.clone(),
        basic_auth_password: args.basic_password.clone(),
    });

    let (store, saved) = open_stores(&config)?;

    if let Some(name) = &args.save_as {
        let created = saved.create(SavedJob::bulk(
            name,
            &csv_filename,
            csv_content.clone(),
            args.combine,
            global_auth.clone(),
        ))?;
        println!("Saved as '{}' ({})", created.name, created.saved_job_id);
    }

    let spec = BulkSpec {
        rows: parse_bulk_csv(csv_content.as_bytes())?,
        global_auth,
        combine_results: args.combine,
        csv_filename: Some(csv_filename),
    };

    run_bulk_job(coordinator(config, store)?, spec).await.map(Some)
}

async fn run_bulk_job(coordinator: Coordinator, spec: BulkSpec) -> anyhow::Result<Job> {
    let (job_id, mut handle) = coordinator.start_bulk(spec)?;
    println!("Started bulk job {}", job_id);

    let mut interval = tokio::time::interval(Duration::from_secs(1));
    let mut last_reported = None;

    let result = loop {
        tokio::select! {
            result = &mut handle => break result,
            _ = interval.tick() => {
                if let Ok(Some(job)) = coordinator.store().get_job(&job_id) {
                    let done = job.completed_urls() + job.failed_urls();
                    if last_reported != Some(done) {
                        last_reported = Some(done);
                        println!(
                            "  {}/{} processed ({} ok, {} failed){}",
                            done,
                            job.total_urls(),
                            job.completed_urls(),
                            job.failed_urls(),
                            job.current_url()
                                .map(|url| format!(", now {}", url))
                                .unwrap_or_default()
                        );
                    }
                }
            }
        }
    };

    let job = result.context("bulk worker panicked")??;
    print_job(&job);
    Ok(job)
}

/// Handles `jobs list|show|delete`
fn handle_jobs(config: Arc<Config>, command: JobsCommand) -> anyhow::Result<()> {
    let (store, _) = open_stores(&config)?;

    match command {
        JobsCommand::List { limit } => {
            let jobs = store.list_jobs(limit)?;
            if jobs.is_empty() {
                println!("No jobs recorded");
            }
            for job in jobs {
                let summary = job.summary();
                println!(
                    "{}  {:<9}  {}  {:<6}  {:>4} URLs  {}{}",
                    summary.job_id,
                    summary.status.as_str(),
                    summary.created_at,
                    summary.crawl_type.as_str(),
                    summary.url_count,
                    summary.mode.as_deref().unwrap_or("-"),
                    summary
                        .csv_filename
                        .map(|name| format!("  [{}]", name))
                        .unwrap_or_default()
                );
                if let Some(error) = summary.first_error {
                    println!("    first error: {}", error);
                }
            }
        }
        JobsCommand::Show { id } => {
            let Some(job) = store.get_job(&id)? else {
                bail!("Job {} not found", id);
            };
            println!("{}", serde_json::to_string_pretty(&job.to_dict())?);
        }
        JobsCommand::Delete { id } => {
            if coordinator(config, store)?.delete_job(&id)? {
                println!("Deleted job {}", id);
            } else {
                bail!("Job {} not found", id);
            }
        }
    }

    Ok(())
}

/// Handles `saved list|run|delete`
async fn handle_saved(config: Arc<Config>, command: SavedCommand) -> anyhow::Result<Option<Job>> {
    let (store, saved) = open_stores(&config)?;

    match command {
        SavedCommand::List => {
            let jobs = saved.list()?;
            if jobs.is_empty() {
                println!("No saved jobs");
            }
            for job in jobs {
                let target = match job.input_method {
                    InputMethod::Single => job.url.clone().unwrap_or_default(),
                    InputMethod::Bulk => job.csv_filename.clone().unwrap_or_default(),
                };
                println!(
                    "{}  {:<24}  {:<6}  {:<7}  {}",
                    job.saved_job_id,
                    job.name,
                    format!("{:?}", job.input_method).to_lowercase(),
                    job.mode.as_str(),
                    target
                );
            }
            Ok(None)
        }
        SavedCommand::Run { name_or_id } => {
            let job = match saved.get(&name_or_id)? {
                Some(job) => job,
                None => saved
                    .find_by_name(&name_or_id)?
                    .with_context(|| format!("No saved job named '{}'", name_or_id))?,
            };
            tracing::info!("Running saved job '{}'", job.name);
            let coordinator = coordinator(config, store)?;

            match job.input_method {
                InputMethod::Single => {
                    let request = job
                        .to_request()
                        .with_context(|| format!("Saved job '{}' has no URL", job.name))?;
                    let finished = coordinator.crawl_single(request).await?;
                    print_job(&finished);
                    Ok(Some(finished))
                }
                InputMethod::Bulk => {
                    let Some(csv_content) = job.csv_content.as_deref() else {
                        bail!("Saved job '{}' has no CSV content", job.name);
                    };
                    let spec = BulkSpec {
                        rows: parse_bulk_csv(csv_content.as_bytes())?,
                        global_auth: job.auth.clone(),
                        combine_results: job.combine_results,
                        csv_filename: job.csv_filename.clone(),
                    };
                    run_bulk_job(coordinator, spec).await.map(Some)
                }
            }
        }
        SavedCommand::Delete { id } => {
            if saved.delete(&id)? {
                println!("Deleted saved job {}", id);
                Ok(None)
            } else {
                bail!("Saved job {} not found", id);
            }
        }
    }
}

fn print_preview(preview: &PagePreview, scope: &ScopeSelector) {
    println!("{} (HTTP {})", preview.final_url, preview.status_code);
    println!("Title: {}", preview.title);

    if !scope.is_whole_document() {
        match &preview.scope_element {
            Some(element) => {
                println!(
                    "Scope {}: found <{}>, {} characters of text",
                    scope.describe(),
                    element.tag,
                    element.text_length
                );
                println!("\n{}\n", element.text_preview);
            }
            None => println!("Scope {}: not found", scope.describe()),
        }
    }

    let stats = &preview.statistics;
    println!(
        "Elements: {}  links: {}  images: {}  paragraphs: {}  HTML: {} bytes  text: {} chars",
        stats.total_elements,
        stats.total_links,
        stats.total_images,
        stats.total_paragraphs,
        stats.content_length,
        stats.text_length
    );

    if !preview.available_classes.is_empty() {
        println!("Classes:");
        for class in &preview.available_classes {
            println!("  {:<32} {}", class.name, class.count);
        }
    }
}

/// Prints a finished job and its per-URL results
fn print_job(job: &Job) {
    println!(
        "\nJob {} {}: {} succeeded, {} failed of {}",
        job.id(),
        job.status(),
        job.completed_urls(),
        job.failed_urls(),
        job.total_urls()
    );

    for outcome in job.results() {
        match outcome {
            CrawlOutcome::Success(success) => {
                println!("  ✓ {} -> {}", success.url, success.output_folder);
                for file in &success.output_files {
                    println!("      {}", file);
                }
                for warning in &success.warnings {
                    println!("      warning: {}", warning);
                }
            }
            CrawlOutcome::Failed(failure) => {
                println!(
                    "  ✗ {} [{}] {}",
                    failure.url, failure.error_code, failure.reason
                );
                for suggestion in &failure.suggestions {
                    println!("      - {}", suggestion);
                }
                if let Some(folder) = &failure.output_folder {
                    println!("      details in {}", Path::new(folder).display());
                }
            }
            CrawlOutcome::Combined(combined) => {
                println!("  ∑ {} -> {}", combined.label, combined.output_folder);
            }
        }
    }
}
