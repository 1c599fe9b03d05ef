use bleach_correction::config::CorrectionConfig;
use bleach_correction::correction::{correct, CorrectionMethod, CorrectionReport, RunControl};
use bleach_correction::error::{BleachError, BleachResult};
use bleach_correction::io::{load_frames, save_stack, LoadedStack};
use bleach_correction::stack::{Roi, StackDims};
use clap::{Parser, ValueEnum};
use flexi_logger::Logger;
use preferences::{AppInfo, Preferences};
use std::path::PathBuf;
use std::process::ExitCode;

const APP_INFO: AppInfo = AppInfo {
    name: "Bleach Correction",
    author: "bleach-correction",
};

const PREFS_KEY: &str = "config/correction";

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Method {
    SimpleRatio,
    ExponentialFit,
    HistogramMatching,
}

impl From<Method> for CorrectionMethod {
    fn from(method: Method) -> Self {
        match method {
            Method::SimpleRatio => CorrectionMethod::SimpleRatio,
            Method::ExponentialFit => CorrectionMethod::ExponentialFit,
            Method::HistogramMatching => CorrectionMethod::HistogramMatching,
        }
    }
}

#[derive(Parser)]
#[command(name = "bleach-correction")]
#[command(version, about = "Photobleaching correction of image time series", long_about = None)]
struct Cli {
    /// Input frames in acquisition order, one grayscale image per file
    #[arg(value_name = "INPUT", required = true)]
    inputs: Vec<PathBuf>,

    /// Output directory for the corrected frames
    #[arg(short, long, value_name = "DIR")]
    out: PathBuf,

    /// Correction method (defaults to the saved configuration)
    #[arg(short, long, value_name = "METHOD")]
    method: Option<Method>,

    /// Region sampled for the mean intensity
    #[arg(long, value_name = "X,Y,W,H")]
    roi: Option<Roi>,

    /// Target intensity of the simple ratio method (0 uses the first frame)
    #[arg(long, value_name = "FLOAT")]
    baseline: Option<f64>,

    /// Number of z-slices per time point
    #[arg(long, value_name = "N", requires = "tframes")]
    zframes: Option<usize>,

    /// Number of time points
    #[arg(long, value_name = "N", requires = "zframes")]
    tframes: Option<usize>,

    /// Store the resulting configuration as the new default
    #[arg(long)]
    save_config: bool,

    /// Log level, e.g. "info" or "debug"
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    log_level: String,
}

/// Saved configuration with the command line options applied on top.
fn resolve_config(cli: &Cli) -> CorrectionConfig {
    let mut config = match CorrectionConfig::load(&APP_INFO, PREFS_KEY) {
        Ok(config) => config,
        Err(err) => {
            log::debug!("no saved configuration, using defaults: {err}");
            CorrectionConfig::default()
        }
    };
    if let Some(method) = cli.method {
        config.method = method.into();
    }
    if cli.baseline.is_some() {
        config.baseline = cli.baseline;
    }
    if let (Some(zframes), Some(tframes)) = (cli.zframes, cli.tframes) {
        config.dims = Some(StackDims { zframes, tframes });
    } else {
        config.dims = None;
    }
    config
}

fn log_report(report: &CorrectionReport) {
    if let (Some(min), Some(max)) = (
        report.ratios.iter().copied().reduce(f64::min),
        report.ratios.iter().copied().reduce(f64::max),
    ) {
        log::info!("correction ratios between {min:.4} and {max:.4}");
    }
    if !report.tables.is_empty() {
        log::info!("{} remapping tables applied", report.tables.len());
    }
}

fn run(cli: &Cli) -> BleachResult<()> {
    let config = resolve_config(cli);
    if cli.save_config {
        match config.save(&APP_INFO, PREFS_KEY) {
            Ok(_) => log::info!("configuration saved"),
            Err(err) => {
                log::error!("error in saving the configuration: {err:?}");
            }
        }
    }

    let mut stack = load_frames(&cli.inputs)?;
    let control = RunControl::new();
    let report = match &mut stack {
        LoadedStack::Gray8(stack) => correct(stack, cli.roi, &config, &control)?,
        LoadedStack::Gray16(stack) => correct(stack, cli.roi, &config, &control)?,
    };
    log_report(&report);
    save_stack(&stack, &cli.inputs, &cli.out)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let _logger = match Logger::try_with_str(&cli.log_level).and_then(|l| l.log_to_stdout().start())
    {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("{}", BleachError::Config(format!("logger initialization failed: {e}")));
            return ExitCode::FAILURE;
        }
    };

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
