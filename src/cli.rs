//! CLI definition and dispatch.

use clap::{Args, Parser, Subcommand};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::analytical_ephemeris::AnalyticalEphemeris;
use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::config_validation::{
    ForecastWindow, OutputOptions, read_backtest_options, read_engine_config, read_observer,
    read_output_options, read_window, validate_signal_config,
};
use crate::domain::driver::{Driver, EngineConfig, Observation, backtest_observations};
use crate::domain::error::SignalError;
use crate::domain::record::{RunSummary, SignalRecord};
use crate::domain::session::{self, MinuteRange};
use crate::domain::signal::Signal;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "gannastro", about = "Gann timing and planetary aspect signal engine")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Signals for every minute of a session or range
    Forecast(ForecastArgs),
    /// Signals joined onto a price series
    Backtest(BacktestArgs),
    /// Validate a configuration and print the resolved settings
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct ForecastArgs {
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Session date (YYYY-MM-DD)
    #[arg(long, conflicts_with_all = ["start", "end"])]
    pub date: Option<String>,
    /// Range start (YYYY-MM-DD HH:MM)
    #[arg(long, requires = "end")]
    pub start: Option<String>,
    /// Range end (YYYY-MM-DD HH:MM)
    #[arg(long, requires = "start")]
    pub end: Option<String>,
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Evaluate timestamps on the thread pool
    #[arg(long)]
    pub parallel: bool,
}

#[derive(Args, Debug, Clone)]
pub struct BacktestArgs {
    #[arg(short, long)]
    pub config: PathBuf,
    /// Price CSV, overriding [backtest] input
    #[arg(short, long)]
    pub input: Option<PathBuf>,
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    #[arg(long)]
    pub parallel: bool,
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match &cli.command {
        Command::Forecast(args) => run_forecast(args).map(|_| ()),
        Command::Backtest(args) => run_backtest(args).map(|_| ()),
        Command::Validate { config } => run_validate(config),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Load an INI file, or an empty configuration when no path is given.
pub fn load_config(path: Option<&Path>) -> Result<FileConfigAdapter, SignalError> {
    match path {
        Some(path) => {
            eprintln!("Loading config from {}", path.display());
            FileConfigAdapter::from_file(path)
        }
        None => Ok(FileConfigAdapter::empty()),
    }
}

/// CLI flags win over `[session]` keys.
pub fn resolve_window(
    date: Option<&str>,
    start: Option<&str>,
    end: Option<&str>,
    config: &dyn ConfigPort,
) -> Result<ForecastWindow, SignalError> {
    match (start, end) {
        (Some(s), Some(e)) => {
            let start = session::parse_timestamp(s)
                .map_err(|_| SignalError::invalid_input("--start", format!("unparsable '{}'", s)))?;
            let end = session::parse_timestamp(e)
                .map_err(|_| SignalError::invalid_input("--end", format!("unparsable '{}'", e)))?;
            if start > end {
                return Err(SignalError::invalid_input("--start", "start is after end"));
            }
            return Ok(ForecastWindow::Range(start, end));
        }
        (Some(_), None) | (None, Some(_)) => {
            return Err(SignalError::invalid_input("--start/--end", "both bounds are required"));
        }
        (None, None) => {}
    }
    if let Some(d) = date {
        return session::parse_date(d)
            .map(ForecastWindow::Session)
            .map_err(|_| SignalError::invalid_input("--date", format!("unparsable '{}'", d)));
    }
    read_window(config)?.ok_or_else(|| {
        SignalError::invalid_input("window", "no --date, --start/--end or [session] date given")
    })
}

pub fn run_forecast(args: &ForecastArgs) -> Result<RunSummary, SignalError> {
    let config = load_config(args.config.as_deref())?;
    validate_signal_config(&config)?;
    let engine = read_engine_config(&config)?;
    let observer = read_observer(&config)?;
    let output = read_output_options(&config)?;
    let window = resolve_window(
        args.date.as_deref(),
        args.start.as_deref(),
        args.end.as_deref(),
        &config,
    )?;

    let range = match window {
        ForecastWindow::Session(date) => {
            eprintln!("Forecasting session {} ({} to {})", date, engine.session.open, engine.session.close);
            engine.session.minutes_on(date)
        }
        ForecastWindow::Range(start, end) => {
            eprintln!("Forecasting {} to {}", start, end);
            MinuteRange::new(start, end)?
        }
    };
    eprintln!(
        "  {} minutes, {} bodies, {} pairs, orb {}",
        range.len(),
        engine.bodies.len(),
        engine.aspects.pairs.len(),
        engine.aspects.orb
    );

    let ephemeris = AnalyticalEphemeris::new(observer);
    let driver = Driver::new(&ephemeris, &engine)?;
    let export = Export {
        engine: &engine,
        options: &output,
        with_sample: false,
        path_override: args.output.as_deref(),
    };
    let summary = if args.parallel {
        let run = driver.run_parallel(range.map(Observation::at).collect());
        let mut summary = export.write(&mut run.records.into_iter())?;
        summary.skips = run.skips;
        summary
    } else {
        let mut stream = driver.forecast(range);
        let mut summary = export.write(&mut stream)?;
        summary.skips = stream.skips().to_vec();
        summary
    };

    print_summary(&summary);
    Ok(summary)
}

pub fn run_backtest(args: &BacktestArgs) -> Result<RunSummary, SignalError> {
    let config = load_config(Some(&args.config))?;
    validate_signal_config(&config)?;
    let engine = read_engine_config(&config)?;
    let observer = read_observer(&config)?;
    let output = read_output_options(&config)?;
    let options = read_backtest_options(&config)?;

    let input = args
        .input
        .clone()
        .or(options.input)
        .ok_or_else(|| SignalError::ConfigMissing {
            section: "backtest".into(),
            key: "input".into(),
        })?;
    eprintln!("Loading samples from {}", input.display());
    let samples = CsvAdapter::new(&input, options.sample_column.as_str()).fetch_samples()?;
    eprintln!(
        "  {} rows, '{}' column, join on {}",
        samples.len(),
        options.sample_column,
        options.join
    );

    let ephemeris = AnalyticalEphemeris::new(observer);
    let driver = Driver::new(&ephemeris, &engine)?;
    let export = Export {
        engine: &engine,
        options: &output,
        with_sample: true,
        path_override: args.output.as_deref(),
    };
    let summary = if args.parallel {
        let run = driver.run_parallel(backtest_observations(samples, options.join)?);
        let mut summary = export.write(&mut run.records.into_iter())?;
        summary.skips = run.skips;
        summary
    } else {
        let mut stream = driver.backtest(samples, options.join)?;
        let mut summary = export.write(&mut stream)?;
        summary.skips = stream.skips().to_vec();
        summary
    };

    print_summary(&summary);
    Ok(summary)
}

pub fn run_validate(config_path: &Path) -> Result<(), SignalError> {
    let config = load_config(Some(config_path))?;
    validate_signal_config(&config)?;
    let engine = read_engine_config(&config)?;
    let observer = read_observer(&config)?;
    let output = read_output_options(&config)?;
    let backtest = read_backtest_options(&config)?;

    let bodies: Vec<String> = engine.bodies.iter().map(|b| b.to_string()).collect();
    let pairs: Vec<String> = engine.aspects.pairs.iter().map(|p| p.to_string()).collect();

    eprintln!("\nEngine:");
    eprintln!("  bodies:   {}", bodies.join(", "));
    eprintln!("  pairs:    {}", pairs.join(", "));
    eprintln!("  orb:      {}", engine.aspects.orb);
    eprintln!("  gann:     {} ({:?})", engine.gann, engine.anchor);
    eprintln!("  session:  {} to {}", engine.session.open, engine.session.close);
    eprintln!("  policy:   {:?}, unavailable positions: {:?}", engine.policy, engine.on_unavailable);

    eprintln!("\nObserver:");
    eprintln!("  timezone: {}", observer.offset);
    eprintln!(
        "  location: {:.4}, {:.4}",
        observer.location.latitude, observer.location.longitude
    );
    eprintln!("  zodiac:   {}, frame: {}", observer.zodiac, observer.frame);

    match read_window(&config)? {
        Some(ForecastWindow::Session(date)) => eprintln!("\nWindow: session {}", date),
        Some(ForecastWindow::Range(start, end)) => eprintln!("\nWindow: {} to {}", start, end),
        None => eprintln!("\nWindow: none (pass --date or --start/--end)"),
    }
    if let Some(input) = &backtest.input {
        eprintln!(
            "Backtest: {} ('{}' column, join on {})",
            input.display(),
            backtest.sample_column,
            backtest.join
        );
    }
    eprintln!(
        "Output: {} (precision {}, signals only: {})",
        output
            .path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "stdout".to_string()),
        output.precision,
        output.signals_only
    );

    eprintln!("\nConfiguration is valid.");
    Ok(())
}

/// Where and how records are written.
struct Export<'a> {
    engine: &'a EngineConfig,
    options: &'a OutputOptions,
    with_sample: bool,
    path_override: Option<&'a Path>,
}

impl Export<'_> {
    /// Write records as they arrive, tallying them on the way through.
    fn write(
        &self,
        records: &mut dyn Iterator<Item = SignalRecord>,
    ) -> Result<RunSummary, SignalError> {
        let report = CsvReportAdapter::new(
            &self.engine.bodies,
            self.options.precision,
            self.options.signals_only,
        )
        .with_sample_column(self.with_sample);

        let mut summary = RunSummary::default();
        let mut tallied = records.inspect(|r| summary.observe(r));
        let rows = match self.path_override.or(self.options.path.as_deref()) {
            Some(path) => {
                let rows = report.write_file(&mut tallied, path)?;
                eprintln!("\nSignals written to: {} ({} rows)", path.display(), rows);
                rows
            }
            None => report.write(&mut tallied, &mut io::stdout().lock())?,
        };
        summary.rows_written = rows;
        Ok(summary)
    }
}

fn print_summary(summary: &RunSummary) {
    eprintln!("\n=== Signal Summary ===");
    eprintln!("Records:          {}", summary.records);
    for signal in Signal::ALL {
        eprintln!("  {:<8}        {}", signal.name(), summary.count(signal));
    }
    eprintln!("Gann checkpoints: {}", summary.checkpoints);
    eprintln!("Skipped:          {}", summary.skipped());
    for skip in summary.skips.iter().take(5) {
        match skip.row {
            Some(row) => eprintln!("  {} (row {}): {}", skip.timestamp, row, skip.reason),
            None => eprintln!("  {}: {}", skip.timestamp, skip.reason),
        }
    }
    if summary.skipped() > 5 {
        eprintln!("  ... and {} more", summary.skipped() - 5);
    }
}
