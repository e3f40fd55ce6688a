use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use sensorlog::entry::{format_timestamp, parse_timestamp};
use sensorlog::source::AirQualityLevel;
use sensorlog::{
    read_logs, sweep_archives, BufferedLog, DataSource, Error, LogConfig, SensorArray,
};

#[derive(Parser)]
#[command(name = "sensorlog", version, about = "Sensor reading log tooling")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read the simulated sensors and log their values.
    Record {
        #[arg(short, long, default_value = "config.json")]
        config: PathBuf,
        #[arg(long, default_value_t = 3)]
        cycles: u32,
        #[arg(long = "interval-ms", default_value_t = 1000)]
        interval_ms: u64,
        /// Seed for reproducible readings
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Print logged readings between two instants.
    Query {
        #[arg(long = "log-dir")]
        log_dir: PathBuf,
        /// `YYYY-MM-DD HH:MM:SS.fffffffff` (UTC, any fraction width) or RFC 3339
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: String,
        #[arg(long)]
        source: Option<String>,
    },
    /// Delete archives older than the configured retention.
    Sweep {
        #[arg(short, long, default_value = "config.json")]
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let mut out = io::BufWriter::new(io::stdout());
    match cli.command {
        Commands::Record {
            config,
            cycles,
            interval_ms,
            seed,
        } => cmd_record(config, cycles, Duration::from_millis(interval_ms), seed, &mut out)?,
        Commands::Query {
            log_dir,
            start,
            end,
            source,
        } => cmd_query(log_dir, &start, &end, source.as_deref(), &mut out)?,
        Commands::Sweep { config } => cmd_sweep(config, &mut out)?,
    }
    out.flush()?;
    Ok(())
}

fn cmd_record(
    config_path: PathBuf,
    cycles: u32,
    interval: Duration,
    seed: Option<u64>,
    out: &mut dyn Write,
) -> Result<()> {
    let config = LogConfig::load(&config_path)
        .with_context(|| format!("load config {}", config_path.display()))?;
    info!("Log directory: {}", config.log_dir.display());

    let mut log = BufferedLog::new(config).context("create log")?;
    log.start().context("start log")?;
    let mut sensors = seed.map(SensorArray::with_seed).unwrap_or_default();

    for cycle in 1..=cycles {
        writeln!(out, "=== cycle {cycle} ===")?;
        let readings = sensors.read_into(&mut log, OffsetDateTime::now_utc())?;
        for reading in readings {
            write!(out, "{}: {:.2} {}", reading.source_id, reading.value, reading.unit)?;
            if reading.source_id == sensors.air_quality.id() {
                let level = AirQualityLevel::from_aqi(reading.value);
                write!(out, " | {level:?}")?;
            }
            writeln!(out)?;
            if let Some(reason) = reading.reason {
                writeln!(out, "    | {reason}")?;
            }
        }
        out.flush()?;
        if cycle < cycles {
            std::thread::sleep(interval);
        }
    }

    if let Some(path) = log.active_path() {
        writeln!(out, "logged to {}", path.display())?;
    }
    log.stop().context("stop log")?;
    Ok(())
}

fn cmd_query(
    log_dir: PathBuf,
    start: &str,
    end: &str,
    source: Option<&str>,
    out: &mut dyn Write,
) -> Result<()> {
    let start = parse_instant(start)?;
    let end = parse_instant(end)?;
    let mut rows = 0usize;
    for item in read_logs(log_dir, start, end, source) {
        match item {
            Ok(entry) => {
                writeln!(
                    out,
                    "{};{};{};{}",
                    format_timestamp(entry.timestamp)?,
                    entry.source_id,
                    entry.value,
                    entry.unit
                )?;
                rows += 1;
            }
            Err(err @ Error::ReadFile { .. }) => eprintln!("warning: {err}"),
            Err(err) => return Err(err.into()),
        }
    }
    info!("{rows} rows matched");
    Ok(())
}

fn cmd_sweep(config_path: PathBuf, out: &mut dyn Write) -> Result<()> {
    let config = LogConfig::load(&config_path)
        .with_context(|| format!("load config {}", config_path.display()))?;
    let stats = sweep_archives(
        &config.archive_dir(),
        config.retention()?,
        OffsetDateTime::now_utc(),
    );
    for path in &stats.deleted {
        writeln!(out, "deleted {}", path.display())?;
    }
    for error in &stats.errors {
        eprintln!("warning: {error}");
    }
    writeln!(out, "{}", stats.summary())?;
    Ok(())
}

fn parse_instant(text: &str) -> Result<OffsetDateTime> {
    parse_timestamp(text)
        .or_else(|_| OffsetDateTime::parse(text, &Rfc3339).map_err(Error::from))
        .map_err(|_| anyhow!("invalid timestamp {text:?}"))
}
