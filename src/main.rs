mod report;

use anyhow::Context as _;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use footfall_core::{config, shellexpand, time::TimeWindow};
use footfall_locate::LocateEngine;
use footfall_store::{ResultStore, SignalRepository};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(
    name = "footfall",
    version,
    about = "Footfall — device localization and heatmaps from S-Ward signals"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file.
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Localize every device for one date and build its heatmaps.
    Process {
        /// Date to process (YYYY-MM-DD). Defaults to the newest available date.
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Do not persist results to the result store.
        #[arg(long)]
        no_store: bool,
        /// Print the day summary as JSON.
        #[arg(long)]
        json: bool,
    },
    /// List dates with raw signal data, newest first.
    Dates,
    /// Show a stored heatmap and its hotspots.
    Heatmap {
        /// Processed date (YYYY-MM-DD).
        #[arg(long)]
        date: NaiveDate,
        /// Time window (full, morning, afternoon, evening). Whole day if omitted.
        #[arg(long)]
        window: Option<TimeWindow>,
        /// Number of hotspots to list.
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
    /// Check data files, map image, and result store.
    Status,
}

/// Console plus daily-rotated file logging under `{data_dir}/logs`.
fn init_logging(cfg: &config::Config) -> tracing_appender::non_blocking::WorkerGuard {
    let log_dir = std::path::PathBuf::from(shellexpand(&cfg.footfall.data_dir)).join("logs");
    let file = tracing_appender::rolling::daily(log_dir, "footfall.log");
    let (writer, guard) = tracing_appender::non_blocking(file);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cfg.footfall.log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .init();
    guard
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load(&cli.config)?;
    let _log_guard = init_logging(&cfg);

    let repo = SignalRepository::new(&cfg);

    match cli.command {
        Commands::Process {
            date,
            no_store,
            json,
        } => {
            let date = match date {
                Some(d) => d,
                None => match repo.available_dates().await?.first() {
                    Some(d) => *d,
                    None => anyhow::bail!(
                        "no signal data under {}; pass --date",
                        shellexpand(&cfg.data.root)
                    ),
                },
            };

            repo.verify_map_image()?;
            let engine = LocateEngine::from_config(&cfg)?;
            let day = repo.load_day(date).await?;
            info!(
                "{date}: processing {} readings over {} wards",
                day.readings.len(),
                day.wards.len()
            );
            let report = tokio::task::spawn_blocking(move || engine.process_day(&day)).await?;

            let run_id = if no_store {
                None
            } else {
                let store = ResultStore::new(&cfg.store).await?;
                Some(store.save_day(&report).await?)
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&report.summary())?);
            } else {
                report::print_summary(&report.summary(), run_id.as_deref());
            }
        }
        Commands::Dates => {
            let dates = repo.available_dates().await?;
            if dates.is_empty() {
                println!("No signal data under {}", shellexpand(&cfg.data.root));
                return Ok(());
            }
            let processed = match ResultStore::new(&cfg.store).await {
                Ok(store) => store.processed_dates().await?,
                Err(e) => {
                    tracing::warn!("result store unavailable: {e}");
                    Vec::new()
                }
            };
            for date in dates {
                let mark = if processed.contains(&date) {
                    "processed"
                } else {
                    ""
                };
                println!("{date}  {mark}");
            }
        }
        Commands::Heatmap { date, window, top } => {
            let store = ResultStore::new(&cfg.store).await?;
            let grid = store.load_heatmap(date, window).await?.with_context(|| {
                format!("{date} has not been processed; run `footfall process --date {date}`")
            })?;
            let label = window.map_or("day", TimeWindow::as_str);
            report::print_heatmap(date, label, &grid, top);
        }
        Commands::Status => {
            println!("Footfall — Status Check\n");
            println!("Config: {}", cli.config);
            println!("Data root: {}", shellexpand(&cfg.data.root));
            println!(
                "Map: {}x{} (cell size {})",
                cfg.map.width, cfg.map.height, cfg.heatmap.cell_size
            );
            println!();

            match repo.load_wards().await {
                Ok(wards) => println!("  wards: {} loaded", wards.len()),
                Err(e) => println!("  wards: {e}"),
            }
            match repo.verify_map_image() {
                Ok(Some((w, h))) => println!("  map image: {w}x{h} ok"),
                Ok(None) => println!("  map image: not found"),
                Err(e) => println!("  map image: {e}"),
            }
            match repo.available_dates().await {
                Ok(dates) => println!("  signal dates: {}", dates.len()),
                Err(e) => println!("  signal dates: {e}"),
            }
            match ResultStore::new(&cfg.store).await {
                Ok(store) => {
                    let runs = store.run_count().await?;
                    let size = store.db_size().await?;
                    println!("  result store: {runs} runs, {size} bytes");
                }
                Err(e) => println!("  result store: {e}"),
            }
        }
    }

    Ok(())
}
