use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use tabled::{settings::Style, Table, Tabled};

use sportsrs::export::{self, ExportFormat};
use sportsrs::import::{Importer, SourceFormat};
use sportsrs::logging::{init_logging, LogLevel};
use sportsrs::persistence::persist_event;
use sportsrs::{AppConfig, Event, Stats, SummaryGenerator};

/// sportsrs - Activity recording converter
///
/// Reads recordings from sports devices in any supported dialect, converts
/// them into one canonical activity model and derives statistics from it.
#[derive(Parser)]
#[command(name = "sportsrs")]
#[command(author = "sportsrs Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Activity recording converter", long_about = None)]
struct Cli {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase verbosity of output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a recording (or a directory of recordings) and convert it
    Import {
        /// Input file or directory
        path: PathBuf,

        /// Source dialect (auto-detect if not specified)
        #[arg(short = 'f', long)]
        format: Option<SourceFormat>,

        /// Output file, or directory when importing a directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format (json, tcx)
        #[arg(short = 't', long, default_value = "json")]
        to: String,

        /// Run the heartbeat-interval filter cascade on every activity
        #[arg(long)]
        filter_ibi: bool,

        /// Recompute every derived stat instead of only filling gaps
        #[arg(long)]
        regenerate: bool,

        /// Merge all imported events into one with this name
        #[arg(long)]
        merge: Option<String>,
    },

    /// Show event, activity and lap statistics of a recording
    Stats {
        /// Input file
        path: PathBuf,

        /// Source dialect (auto-detect if not specified)
        #[arg(short = 'f', long)]
        format: Option<SourceFormat>,

        /// Show per-lap statistics
        #[arg(short, long)]
        laps: bool,
    },

    /// Configure application settings
    Config {
        /// List all configuration options
        #[arg(short, long)]
        list: bool,

        /// Write the default configuration file
        #[arg(long)]
        init: bool,
    },
}

#[derive(Tabled)]
struct StatRow {
    #[tabled(rename = "Measurement")]
    name: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Unit")]
    unit: String,
}

#[derive(Tabled)]
struct ActivityRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Type")]
    activity_type: String,
    #[tabled(rename = "Start")]
    start: String,
    #[tabled(rename = "Duration")]
    duration: String,
    #[tabled(rename = "Points")]
    points: usize,
    #[tabled(rename = "Laps")]
    laps: usize,
    #[tabled(rename = "Creator")]
    creator: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load_from_file(path)?,
        None => AppConfig::load_or_default(),
    };

    let mut log_config = config.logging.clone();
    log_config.level = LogLevel::from_verbosity(log_config.level, cli.verbose);
    init_logging(&log_config)?;

    if cli.verbose > 0 {
        eprintln!("{}", format!("Log level: {:?}", log_config.level).dimmed());
    }

    match cli.command {
        Commands::Import {
            path,
            format,
            output,
            to,
            filter_ibi,
            regenerate,
            merge,
        } => {
            let to = ExportFormat::from_str(&to)?;
            let options = ImportOptions {
                filter_ibi,
                regenerate,
            };
            run_import(&config, &path, format, output.as_deref(), to, options, merge).await?;
        }

        Commands::Stats { path, format, laps } => {
            let event = Importer::from_config(&config)?
                .import_file(&path, format)
                .await
                .map_err(|e| anyhow::anyhow!(e.user_message()))?;
            print_event(&config, &event, laps)?;
        }

        Commands::Config { list, init } => {
            let path = cli.config.unwrap_or_else(AppConfig::default_config_path);
            if init {
                config.save_to_file(&path)?;
                println!("{} {}", "✓ Wrote configuration to".green(), path.display());
            }
            if list || !init {
                println!("{}", format!("Configuration ({})", path.display()).white().bold());
                println!("{}", toml::to_string_pretty(&config)?);
            }
        }
    }

    Ok(())
}

#[derive(Clone, Copy)]
struct ImportOptions {
    filter_ibi: bool,
    regenerate: bool,
}

async fn run_import(
    config: &AppConfig,
    path: &Path,
    format: Option<SourceFormat>,
    output: Option<&Path>,
    to: ExportFormat,
    options: ImportOptions,
    merge: Option<String>,
) -> Result<()> {
    println!("{}", "Importing activity data...".green().bold());

    let importer = Importer::from_config(config)?;
    let mut events: Vec<(PathBuf, Event)> = if path.is_dir() {
        importer.import_directory(path).await?
    } else {
        let event = importer
            .import_file(path, format)
            .await
            .map_err(|e| anyhow::anyhow!(e.user_message()))?;
        vec![(path.to_path_buf(), event)]
    };

    if let Some(name) = merge {
        let merged = Event::merge(name, events.into_iter().map(|(_, event)| event));
        let merged_path = output
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(format!("merged.{}", to.extension())));
        events = vec![(merged_path, merged)];
    }

    for (source, event) in &mut events {
        post_process(config, importer.generator(), event, options);

        println!(
            "  {} {}: {} activities, {} points",
            "✓".green(),
            source.display(),
            event.activities.len(),
            event.activities.iter().map(|a| a.point_count()).sum::<usize>()
        );

        if let Some(target) = output_path(source, output, to, path.is_dir()) {
            export::export_event(event, to, &target)
                .map_err(|e| anyhow::anyhow!(sportsrs::SportsError::from(e).user_message()))?;
            println!("  {} {}", "→".cyan(), target.display());
        }
    }

    println!("{}", "✓ Import completed successfully".green());
    Ok(())
}

fn post_process(config: &AppConfig, generator: &SummaryGenerator, event: &mut Event, options: ImportOptions) {
    if options.filter_ibi {
        for activity in &mut event.activities {
            activity.ibi.apply_filters(&config.ibi);
        }
    }
    if options.regenerate {
        generator.regenerate_event_stats(event);
    } else {
        generator.complete_event_stats(event);
    }
}

/// Where an imported event goes. A single input writes to `output` directly;
/// a directory input treats `output` as a directory.
fn output_path(source: &Path, output: Option<&Path>, to: ExportFormat, batch: bool) -> Option<PathBuf> {
    let output = output?;
    if !batch || source.extension().is_none() {
        return Some(output.to_path_buf());
    }
    let stem = source.file_stem().unwrap_or_default();
    Some(output.join(stem).with_extension(to.extension()))
}

fn stat_rows(stats: &Stats) -> Vec<StatRow> {
    stats
        .iter()
        .map(|measurement| StatRow {
            name: measurement.kind.type_name().to_string(),
            value: match measurement.number() {
                Some(value) => format!("{:.2}", value),
                None => measurement.value.to_string(),
            },
            unit: measurement.unit().to_string(),
        })
        .collect()
}

fn print_event(config: &AppConfig, event: &Event, show_laps: bool) -> Result<()> {
    println!("{}", event.name.bold());

    let activities: Vec<ActivityRow> = event
        .activities
        .iter()
        .enumerate()
        .map(|(index, activity)| ActivityRow {
            index: index + 1,
            activity_type: activity.activity_type.to_string(),
            start: activity.start.format("%Y-%m-%d %H:%M:%S").to_string(),
            duration: format!("{}s", activity.duration().num_seconds()),
            points: activity.point_count(),
            laps: activity.laps().len(),
            creator: activity.creator.name.clone(),
        })
        .collect();
    println!("{}", Table::new(activities).with(Style::rounded()));

    println!("{}", "Event statistics".cyan().bold());
    println!("{}", Table::new(stat_rows(&event.stats)).with(Style::rounded()));

    for (index, activity) in event.activities.iter().enumerate() {
        println!(
            "{}",
            format!("Activity {} ({})", index + 1, activity.activity_type).cyan().bold()
        );
        println!("{}", Table::new(stat_rows(&activity.stats)).with(Style::rounded()));

        if show_laps {
            for (lap_index, lap) in activity.laps().iter().enumerate() {
                println!("  {}", format!("Lap {} ({})", lap_index + 1, lap.lap_type).yellow());
                println!("{}", Table::new(stat_rows(&lap.stats)).with(Style::psql()));
            }
        }
    }

    let persisted = persist_event(event, config.persistence.max_stream_bytes)
        .context("Event exceeds the stored size limit")?;
    let compressed = persisted.activities.iter().filter(|s| s.is_compressed()).count();
    println!(
        "{}",
        format!(
            "Stored size: {} bytes in {} streams ({} compressed)",
            persisted.total_bytes(),
            persisted.activities.len() + 1,
            compressed
        )
        .dimmed()
    );

    Ok(())
}
