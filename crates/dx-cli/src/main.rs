//! DX run reporter CLI
//!
//! The `dx-report` command replays completed CI runs, exported as JSON
//! snapshots, through the DX reporting pipeline.
//!
//! ## Commands
//!
//! - `report`: normalize a run and post it to DX (or print it with `--dry-run`)
//! - `resolve-host`: show which pipeline source a hostname maps to
//! - `check-config`: show the effective configuration and URL warnings

mod http_gateway;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn, Level};

use dx_core::{
    current_hostname, CompletedRun, DeliveryError, DeliveryGateway, Disposition, DxConfig,
    DxRunListener, FileResource, HostIdentity, HostMappingTable, RunReference, RunSnapshot,
    SystemHostIdentity, UrlCheck,
};
use http_gateway::HttpDeliveryGateway;

#[derive(Parser)]
#[command(name = "dx-report")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Report CI pipeline runs to DX", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// TOML configuration file
    #[arg(long, global = true, env = "DX_CONFIG")]
    config: Option<PathBuf>,

    /// DX API base URL (overrides file and environment)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Repository denylist, comma or newline separated
    #[arg(long, global = true)]
    denylist: Option<String>,

    /// Host mapping table to use instead of the embedded one
    #[arg(long, global = true)]
    host_mapping_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize a completed run and deliver it to DX
    Report {
        /// Run snapshot file (JSON)
        #[arg(long)]
        run: PathBuf,

        /// Print the payload instead of sending it
        #[arg(long)]
        dry_run: bool,
    },

    /// Show the pipeline source for a hostname
    ResolveHost {
        /// Hostname to look up (default: this host)
        #[arg(long)]
        hostname: Option<String>,
    },

    /// Show the effective configuration
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    dx_core::init_tracing(cli.json, level);

    let config = load_config(&cli)?;

    match cli.command {
        Commands::Report { run, dry_run } => cmd_report(config, &run, dry_run).await,
        Commands::ResolveHost { hostname } => cmd_resolve_host(&config, hostname.as_deref()),
        Commands::CheckConfig => cmd_check_config(&config),
    }
}

/// Flags first, then the TOML file, then `DX_*` environment variables.
fn load_config(cli: &Cli) -> Result<DxConfig> {
    let flags = DxConfig {
        base_url: cli.base_url.clone(),
        repository_denylist: cli.denylist.clone().unwrap_or_default(),
        host_mapping_file: cli.host_mapping_file.clone(),
    };

    let file = match &cli.config {
        Some(path) => DxConfig::from_toml_file(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => DxConfig::default(),
    };

    Ok(flags.or(file).or(DxConfig::from_env()))
}

fn host_mapping_table(config: &DxConfig) -> HostMappingTable {
    match &config.host_mapping_file {
        Some(path) => HostMappingTable::new(FileResource::new(path)),
        None => HostMappingTable::embedded(),
    }
}

/// Prints the payload instead of sending it.
struct DryRunGateway;

#[async_trait]
impl DeliveryGateway for DryRunGateway {
    async fn send(&self, payload: &str, run: &RunReference) -> Result<(), DeliveryError> {
        let value: serde_json::Value = serde_json::from_str(payload)
            .map_err(|e| DeliveryError::Transport(format!("invalid payload: {e}")))?;
        let pretty = serde_json::to_string_pretty(&value)
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;
        println!("# {run}");
        println!("{pretty}");
        Ok(())
    }
}

async fn cmd_report(config: DxConfig, path: &Path, dry_run: bool) -> Result<()> {
    let (reference, disposition) = report_run(config, path, dry_run).await?;

    match disposition {
        Disposition::Delivered(event) => {
            let started = event
                .started_at_utc()
                .map(|t| t.to_rfc3339())
                .unwrap_or_default();
            let verb = if dry_run { "Prepared" } else { "Delivered" };
            println!(
                "{verb} {} [{}] from {} (started {})",
                event.reference_id, event.status, event.pipeline_source, started
            );
            Ok(())
        }
        Disposition::DeliveryFailed { event, error } => Err(anyhow!(
            "DX delivery failed for {}: {}",
            event.reference_id,
            error
        )),
        Disposition::Skipped(reason) => {
            println!("Skipped {}: {}", reference, reason);
            Ok(())
        }
    }
}

/// Load a snapshot and push it through the pipeline, echoing its console.
async fn report_run(
    config: DxConfig,
    path: &Path,
    dry_run: bool,
) -> Result<(RunReference, Disposition)> {
    let run = Arc::new(
        RunSnapshot::from_file(path)
            .with_context(|| format!("Failed to read run snapshot {:?}", path))?,
    );

    let gateway: Arc<dyn DeliveryGateway> = match config.base_url.as_deref() {
        Some(base_url) if !dry_run && config.is_configured() => {
            let http = HttpDeliveryGateway::new(base_url)
                .context("Failed to create DX HTTP client")?;
            info!(endpoint = http.endpoint(), "delivering to DX");
            Arc::new(http)
        }
        _ => Arc::new(DryRunGateway),
    };

    if let UrlCheck::Warning(message) = config.check_base_url() {
        warn!("{message}");
    }

    let host_mapping = Arc::new(host_mapping_table(&config));
    let listener = DxRunListener::new(config, gateway)
        .with_host_mapping(host_mapping)
        .with_directory(run.clone());

    let disposition = listener.on_completed(run.as_ref()).await;

    for line in run.console_lines() {
        eprintln!("{line}");
    }

    Ok((run.reference(), disposition))
}

fn cmd_resolve_host(config: &DxConfig, hostname: Option<&str>) -> Result<()> {
    let table = host_mapping_table(config);
    let (hostname, source) = resolve_host(&table, hostname, &SystemHostIdentity);

    info!(entries = table.len(), "host mapping table ready");
    println!("hostname:        {}", hostname);
    println!("pipeline source: {}", source);
    Ok(())
}

/// Hostname and pipeline source. An undeterminable hostname maps to the default.
fn resolve_host(
    table: &HostMappingTable,
    hostname: Option<&str>,
    identity: &dyn HostIdentity,
) -> (String, String) {
    if let Some(name) = hostname {
        return (name.to_string(), table.resolve(name));
    }
    match current_hostname(identity) {
        Ok(name) => {
            let source = table.resolve(&name);
            (name, source)
        }
        Err(e) => {
            warn!(error = %e, "could not determine hostname");
            ("<unknown>".to_string(), table.default_source().to_string())
        }
    }
}

fn cmd_check_config(config: &DxConfig) -> Result<()> {
    let rendered =
        serde_json::to_string_pretty(config).context("Failed to render configuration")?;
    println!("{}", rendered);

    match config.check_base_url() {
        UrlCheck::Ok => println!("Base URL: OK"),
        UrlCheck::Warning(message) => println!("Base URL warning: {}", message),
    }
    println!(
        "Reporting: {}",
        if config.is_configured() {
            "enabled"
        } else {
            "disabled"
        }
    );

    let table = host_mapping_table(config);
    println!("Host mapping: {:?} ({} entries)", table, table.len());
    Ok(())
}
