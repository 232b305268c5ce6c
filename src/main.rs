use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use air_quality_monitor::{
    CacheStore, ConsoleNotifier, Notifier, RankedStation, Selector, Sensor, SeriesReport, Session,
    Station, SyncCoordinator, TrendMethod, analyze, config::AppConfig, load_series, rank_stations,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(name = "air-quality-monitor")]
#[command(about = "Browse, download and analyse air quality measurements")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Choose a station, then a sensor, then a data file
    Browse,
    /// Browse only data that is already downloaded
    Stored,
    /// List stations, nearest first
    Stations {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// List the sensors of a station
    Sensors { station: i64 },
    /// Download measurement data for every sensor of a station
    Sync {
        station: i64,
        /// Sensor to retry once if its download fails
        #[arg(long)]
        selected: Option<i64>,
    },
    /// Analyse a downloaded data file
    Analyze {
        file: PathBuf,
        #[arg(long)]
        method: Option<TrendMethod>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::builder()
        .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
        .parse_lossy("air_quality_monitor=debug");

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();

    let config = AppConfig::load().context("Failed to load configuration")?;

    let rt = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;

    rt.block_on(run(args.command, config))
}

async fn run(command: Command, config: AppConfig) -> Result<()> {
    let coordinator = SyncCoordinator::from_config(&config)?;

    match command {
        Command::Browse => {
            let mut session = new_session(coordinator, &config);
            if session.choose_station().await?.is_none() {
                return Ok(());
            }
            if session.choose_sensor().await?.is_none() {
                return Ok(());
            }
            if let Some(report) = session.show_data_files().await? {
                print_report(&report);
            }
        }
        Command::Stored => {
            let mut session = new_session(coordinator, &config);
            if let Some(report) = session.view_stored_data().await? {
                print_report(&report);
            }
        }
        Command::Stations { limit } => {
            let stations = coordinator.ensure_station_list().await?;
            let ranked = rank_stations(config.location.reference_point(), &stations);
            for entry in ranked.iter().take(limit) {
                println!(
                    "{:>6}  {:>8.1} km  {}",
                    entry.station.id, entry.distance_km, entry.station.name
                );
            }
        }
        Command::Sensors { station } => {
            for sensor in coordinator.ensure_sensor_list(station).await? {
                println!("{:>6}  {}", sensor.id, sensor.parameter_name);
            }
        }
        Command::Sync { station, selected } => {
            let sensors = coordinator.ensure_sensor_list(station).await?;
            let ids: Vec<i64> = sensors.iter().map(|s| s.id).collect();
            let report = coordinator.sync_all_sensor_data(station, &ids).await;

            println!(
                "Downloaded {} of {} sensors",
                report.succeeded.len(),
                ids.len()
            );
            if let Some(warning) = report.warning_message() {
                ConsoleNotifier.notify("Download Warnings", &warning)?;
            }
            if let Some(sensor_id) = selected {
                if coordinator
                    .ensure_selected(station, sensor_id, &report.failed_ids)
                    .await?
                {
                    println!("Sensor {} downloaded on retry", sensor_id);
                }
            }
        }
        Command::Analyze { file, method } => {
            let cache = CacheStore::new(&config.cache.root);
            let series = load_series(&cache, &file)?;
            let method = method.unwrap_or(config.analytics.trend_method);
            if let Some(result) = analyze(&series, method) {
                print_report(&SeriesReport {
                    file,
                    axis_label: series.axis_label(),
                    chart_points: series.chart_points(),
                    series,
                    result,
                });
            }
        }
    }

    Ok(())
}

fn new_session(coordinator: SyncCoordinator, config: &AppConfig) -> Session {
    Session::new(
        coordinator,
        Arc::new(StdinSelector),
        Arc::new(ConsoleNotifier),
        config,
    )
}

fn print_report(report: &SeriesReport) {
    let stats = &report.result.stats;
    println!("File:    {}", report.file.display());
    println!("Series:  {}", report.series.key);
    println!("Samples: {}", stats.sample_count);
    if let Some((from, to)) = report.series.time_span() {
        println!("Period:  {} .. {}", from, to);
    }
    println!("Min:     {:.2} {}", stats.min, report.axis_label);
    println!("Max:     {:.2} {}", stats.max, report.axis_label);
    println!("Average: {:.2} {}", stats.average, report.axis_label);
    match report.result.percent_change {
        Some(p) => println!("Trend:   {} ({:+.1}%)", report.result.trend, p),
        None => println!("Trend:   {}", report.result.trend),
    }
    println!();
    for point in &report.chart_points {
        println!("{}  {:>8.2}", point.timestamp, point.value);
    }
}

/// Numbered-list prompts on stdin. An empty or invalid answer cancels.
struct StdinSelector;

impl StdinSelector {
    fn prompt(&self, title: &str, options: &[String]) -> Option<usize> {
        if options.is_empty() {
            println!("No {}s available.", title);
            return None;
        }
        println!("Select a {}:", title);
        for (i, option) in options.iter().enumerate() {
            println!("{:>4}) {}", i + 1, option);
        }
        print!("> ");
        io::stdout().flush().ok()?;

        let mut line = String::new();
        io::stdin().lock().read_line(&mut line).ok()?;
        let choice: usize = line.trim().parse().ok()?;
        (1..=options.len()).contains(&choice).then(|| choice - 1)
    }
}

impl Selector for StdinSelector {
    fn select_station(&self, candidates: &[RankedStation]) -> Option<Station> {
        let options: Vec<String> = candidates
            .iter()
            .map(|c| format!("{} ({:.1} km)", c.station.name, c.distance_km))
            .collect();
        let index = self.prompt("station", &options)?;
        Some(candidates[index].station.clone())
    }

    fn select_sensor(&self, candidates: &[Sensor]) -> Option<Sensor> {
        let options: Vec<String> = candidates
            .iter()
            .map(|s| format!("{} (id: {})", s.parameter_name, s.id))
            .collect();
        let index = self.prompt("sensor", &options)?;
        Some(candidates[index].clone())
    }

    fn select_file(&self, candidates: &[String]) -> Option<String> {
        let index = self.prompt("data file", candidates)?;
        Some(candidates[index].clone())
    }
}
