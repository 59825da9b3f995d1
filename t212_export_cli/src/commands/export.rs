//! The export run: resolve the period, poll the export, archive artifacts.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::Args;
use t212_export_lib::t212_api::{Client, DEFAULT_BASE_URL, DEMO_BASE_URL};
use t212_export_lib::{
    ArtifactPipeline, ArtifactStore, ExportConfig, LocalStore, PollerConfig, ReportPoller,
    ReportingPeriod, S3Store, TickerRules, TokioClock,
};

use crate::prompt::prompt_for_period;

/// Bucket name used with `--local-store` when none is configured.
const LOCAL_BUCKET: &str = "t212-export";

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Reporting month (YYYY-MM). Prompts when omitted.
    #[arg(long)]
    pub period: Option<String>,

    /// Target bucket (overrides BUCKET_NAME)
    #[arg(long)]
    pub bucket: Option<String>,

    /// Write artifacts under this directory instead of S3
    #[arg(long)]
    pub local_store: Option<PathBuf>,

    /// Directory for the local copy of the Digrin CSV
    #[arg(long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Skip the local copy of the Digrin CSV
    #[arg(long)]
    pub no_local_copy: bool,

    /// Use the practice-account API host
    #[arg(long, conflicts_with = "base_url")]
    pub demo: bool,

    /// API base URL (overrides T212_BASE_URL)
    #[arg(long)]
    pub base_url: Option<String>,

    /// Seconds between export submissions (default 30)
    #[arg(long)]
    pub submit_interval_secs: Option<u64>,

    /// Seconds to wait after submission before the first poll (default 10)
    #[arg(long)]
    pub settle_delay_secs: Option<u64>,

    /// Seconds between export status polls (default 60)
    #[arg(long)]
    pub poll_interval_secs: Option<u64>,

    /// Give up after this many failed submissions (default: never)
    #[arg(long)]
    pub max_submit_attempts: Option<u32>,

    /// Give up after this many unresolved polls (default: never)
    #[arg(long)]
    pub max_poll_attempts: Option<u32>,

    /// Give up once waiting would exceed this many seconds (default: never)
    #[arg(long)]
    pub deadline_secs: Option<u64>,
}

impl ExportArgs {
    /// Applies flag overrides on top of the environment-derived config.
    pub fn poller_config(&self, base: PollerConfig) -> PollerConfig {
        PollerConfig {
            submit_interval: self
                .submit_interval_secs
                .map(Duration::from_secs)
                .unwrap_or(base.submit_interval),
            settle_delay: self
                .settle_delay_secs
                .map(Duration::from_secs)
                .unwrap_or(base.settle_delay),
            poll_interval: self
                .poll_interval_secs
                .map(Duration::from_secs)
                .unwrap_or(base.poll_interval),
            max_submit_attempts: self.max_submit_attempts.or(base.max_submit_attempts),
            max_poll_attempts: self.max_poll_attempts.or(base.max_poll_attempts),
            deadline: self.deadline_secs.map(Duration::from_secs).or(base.deadline),
        }
    }

    pub fn base_url(&self, configured: Option<&str>) -> String {
        if let Some(url) = &self.base_url {
            return url.clone();
        }
        if self.demo {
            return DEMO_BASE_URL.to_string();
        }
        configured.unwrap_or(DEFAULT_BASE_URL).to_string()
    }
}

pub async fn run(args: &ExportArgs) -> Result<()> {
    let config = ExportConfig::from_env()?;

    let period = match &args.period {
        Some(raw) => raw.parse::<ReportingPeriod>()?,
        None => {
            let today = chrono::Local::now().date_naive();
            let stdin = std::io::stdin();
            prompt_for_period(&mut stdin.lock(), &mut std::io::stdout(), today)?
        }
    };

    let client = Client::with_base_url(&args.base_url(config.base_url.as_deref()), config.api_key.clone())?;
    let rules = TickerRules::load_default()?;
    let bucket = args.bucket.clone().or_else(|| config.bucket.clone());
    let poller_config = args.poller_config(config.poller.clone());

    match &args.local_store {
        Some(root) => {
            let store = LocalStore::new(root);
            let bucket = bucket.unwrap_or_else(|| LOCAL_BUCKET.to_string());
            export(&client, &store, bucket, period, poller_config, rules, args).await
        }
        None => {
            let bucket = bucket.ok_or_else(|| {
                anyhow!("BUCKET_NAME is not set. Pass --bucket, set it in .env, or use --local-store")
            })?;
            let store = S3Store::from_env().await;
            export(&client, &store, bucket, period, poller_config, rules, args).await
        }
    }
}

async fn export<S: ArtifactStore>(
    client: &Client,
    store: &S,
    bucket: String,
    period: ReportingPeriod,
    poller_config: PollerConfig,
    rules: TickerRules,
    args: &ExportArgs,
) -> Result<()> {
    let request = period.export_request()?;
    tracing::info!(
        %period,
        time_from = %request.time_from(),
        time_to = %request.time_to(),
        "Requesting Trading 212 export"
    );

    let clock = TokioClock;
    let poller = ReportPoller::new(client, &clock, poller_config);
    let resolved = poller.resolve(&request).await?;
    tracing::info!(report_id = %resolved.report_id, "Export is ready for download");

    let mut pipeline = ArtifactPipeline::new(client, store, bucket.as_str(), rules);
    if !args.no_local_copy {
        pipeline = pipeline.with_output_dir(&args.output_dir);
    }
    let summary = pipeline.run(&period, &resolved.download_link).await?;

    eprintln!(
        "Archived {} ({} bytes) and {} ({} of {} rows) in bucket {}",
        summary.raw_key, summary.raw_bytes, summary.digrin_key, summary.rows_out, summary.rows_in, bucket
    );
    if let Some(path) = summary.local_copy {
        eprintln!("Wrote {}", path.display());
    }
    Ok(())
}
