use std::fs::{self, File};
use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sd_xmltv::store::{HashStore, JsonStore, NullStore};
use sd_xmltv::{export, SchedulesDirect};

#[derive(Parser)]
#[command(name = "sd-xmltv")]
#[command(version)]
#[command(about = "Export Schedules Direct listings as an XMLTV document")]
struct Cli {
    /// Schedules Direct account username
    #[arg(short, long, env = "SD_USERNAME")]
    username: String,

    /// Schedules Direct account password
    #[arg(short, long, env = "SD_PASSWORD", hide_env_values = true)]
    password: String,

    /// Output file path
    #[arg(short, long, default_value = "xmltv.xml")]
    output: PathBuf,

    /// Cache directory for delta state; omit to re-fetch everything each run
    #[arg(short, long, env = "SD_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("sd_xmltv={}", cli.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let store: Box<dyn HashStore> = match &cli.cache_dir {
        Some(dir) => Box::new(
            JsonStore::open(dir).with_context(|| format!("opening cache in {}", dir.display()))?,
        ),
        None => {
            warn!("no cache directory configured, fetching everything");
            Box::new(NullStore)
        }
    };

    let mut api = SchedulesDirect::new(cli.username, cli.password, store)?;
    info!("logging in to Schedules Direct");
    api.login().context("login failed")?;

    // Write to a sibling temp path and rename on success, so a failed run
    // never leaves a truncated document at the output path.
    let tmp_path = cli.output.with_extension("xml.tmp");
    let sink = BufWriter::new(
        File::create(&tmp_path)
            .with_context(|| format!("creating {}", tmp_path.display()))?,
    );

    info!("fetching lineups and programs");
    let report = match export(&mut api, sink) {
        Ok(report) => report,
        Err(e) => {
            let _ = fs::remove_file(&tmp_path);
            return Err(e).context("export failed");
        }
    };

    fs::rename(&tmp_path, &cli.output)
        .with_context(|| format!("moving output to {}", cli.output.display()))?;
    api.commit_store().context("persisting delta store")?;

    info!(
        lineups = report.lineups,
        channels = report.channels,
        programmes = report.programmes,
        output = %cli.output.display(),
        "export complete"
    );
    Ok(())
}
