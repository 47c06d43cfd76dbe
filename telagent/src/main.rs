use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use sysinfo::System;
use telagent_pkg_plugin::{scrape_installed_packages, ScanOptions};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod pillar;
mod report;

use pillar::{process_product_directories, ProductFamily};
use report::{host_metrics, HostInfo, TelemetryReport};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "false")]
    pretty: bool,

    /// ID to map the agent to a host. Defaults to hostname if not provided.
    #[arg(long, env = "TELAGENT_ID")]
    id: Option<String>,

    /// URL to POST the JSON report to.
    #[arg(long, env = "TELAGENT_URL")]
    url: Option<String>,

    /// Repeat the scan every N seconds until interrupted. Runs once when omitted.
    #[arg(long, env = "TELAGENT_INTERVAL", value_parser = clap::value_parser!(u64).range(1..))]
    interval: Option<u64>,

    /// Seconds each package manager command may run.
    #[arg(
        long,
        env = "TELAGENT_COMMAND_TIMEOUT",
        default_value_t = 30,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    command_timeout: u64,

    /// OS identification string to classify instead of the detected one.
    #[arg(long)]
    os: Option<String>,

    /// Directory that products write their telemetry files under, one subdirectory each.
    #[arg(
        long,
        env = "TELAGENT_TELEMETRY_ROOT",
        default_value = "/usr/local/percona/telemetry"
    )]
    telemetry_root: PathBuf,

    /// Percona Server for MySQL metrics directory. Defaults to `<telemetry-root>/ps`.
    #[arg(long)]
    ps_metrics_path: Option<PathBuf>,

    /// Percona XtraDB Cluster metrics directory. Defaults to `<telemetry-root>/pxc`.
    #[arg(long)]
    pxc_metrics_path: Option<PathBuf>,

    /// Percona Server for MongoDB metrics directory. Defaults to `<telemetry-root>/psmdb`.
    #[arg(long)]
    psmdb_metrics_path: Option<PathBuf>,

    /// Percona Distribution for PostgreSQL metrics directory. Defaults to `<telemetry-root>/pg`.
    #[arg(long)]
    pg_metrics_path: Option<PathBuf>,
}

impl Args {
    fn product_directories(&self) -> Vec<(PathBuf, ProductFamily)> {
        let directory = |custom: &Option<PathBuf>, name: &str| {
            custom.clone().unwrap_or_else(|| self.telemetry_root.join(name))
        };

        vec![
            (directory(&self.ps_metrics_path, "ps"), ProductFamily::Ps),
            (directory(&self.pxc_metrics_path, "pxc"), ProductFamily::Pxc),
            (directory(&self.psmdb_metrics_path, "psmdb"), ProductFamily::Psmdb),
            (directory(&self.pg_metrics_path, "pg"), ProductFamily::Postgresql),
        ]
    }
}

fn host_info(os_override: Option<&str>) -> HostInfo {
    let os = match os_override {
        Some(os) => os.to_string(),
        None => [System::name(), System::os_version()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" "),
    };

    HostInfo {
        os,
        hardware_arch: std::env::consts::ARCH.to_string(),
    }
}

/// Prints the report, or POSTs it when a URL is configured. Returns whether it was uploaded.
async fn deliver(args: &Args, client: &reqwest::Client, report: &TelemetryReport) -> Result<bool> {
    let Some(url) = &args.url else {
        let output = if args.pretty {
            serde_json::to_string_pretty(report)?
        } else {
            serde_json::to_string(report)?
        };
        println!("{}", output);
        return Ok(false);
    };

    client
        .post(url)
        .json(report)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .with_context(|| format!("error sending report to {url}"))?;
    info!(%url, "successfully sent report");
    Ok(true)
}

async fn run_once(args: &Args, options: &ScanOptions, client: &reqwest::Client) -> Result<()> {
    let host = host_info(args.os.as_deref());

    info!(os = %host.os, "scraping installed packages");
    let packages = scrape_installed_packages(&host.os, options).await;

    // Determine Host ID: Argument > Hostname > "unknown"
    let host_id = args
        .id
        .clone()
        .or_else(System::host_name)
        .unwrap_or_else(|| "unknown".to_string());

    let host_metrics = host_metrics(&host, &packages)
        .context("failed to marshal installed packages into JSON")?;

    let product_files = process_product_directories(&args.product_directories());
    if product_files.is_empty() {
        let report = TelemetryReport::for_host(host_id, host_metrics);
        deliver(args, client, &report).await?;
        return Ok(());
    }

    for file in &product_files {
        let report = TelemetryReport::for_product(host_id.clone(), &host_metrics, file);
        match deliver(args, client, &report).await {
            // Uploaded files are consumed so the next iteration does not send them again.
            Ok(true) => {
                info!(file = %file.path.display(), "removing metrics file");
                if let Err(err) = fs::remove_file(&file.path) {
                    error!(
                        file = %file.path.display(),
                        error = %err,
                        "failed to remove metrics file"
                    );
                }
            }
            Ok(false) => {}
            Err(err) => error!(
                file = %file.path.display(),
                error = %format!("{err:#}"),
                "error during sending telemetry"
            ),
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout carries only the report.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let options = ScanOptions {
        command_timeout: Duration::from_secs(args.command_timeout),
    };
    let client = reqwest::Client::new();

    let Some(interval) = args.interval else {
        return run_once(&args, &options, &client).await;
    };

    let mut ticker = tokio::time::interval(Duration::from_secs(interval));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {}
        }

        // Dropping an in-flight scan kills its package manager processes.
        tokio::select! {
            _ = &mut shutdown => break,
            res = run_once(&args, &options, &client) => {
                if let Err(err) = res {
                    error!(error = %format!("{err:#}"), "telemetry iteration failed");
                }
            }
        }
    }

    info!("received shutdown signal, exiting");
    Ok(())
}
