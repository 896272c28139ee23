//! Command-line front end for crabfocus.
//!
//! Subcommands:
//! - `list-devices`: cameras visible to the capture backend
//! - `run`: calibrate, then focus until the operator quits
//! - `calibrate`: measure the smallest step the lens honors
//! - `measure`: step by the minimum and log the score stream
//! - `init-config`: write a default configuration file

use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::Ordering;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use crabfocus::platform::{list_cameras, NokhwaFrameSource};
use crabfocus::session::keyboard::KeyboardInput;
use crabfocus::{
    init_logging, AutofocusConfig, Direction, FlagInput, FocusSession, IterationReport,
    LensActuator, OperatorInput,
};

/// Contrast-detection autofocus for tethered cameras
#[derive(Parser, Debug)]
#[command(name = "crabfocus")]
#[command(version)]
struct Args {
    /// Configuration file (defaults to ./crabfocus.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Camera index, overrides the config file
    #[arg(short, long, global = true)]
    device: Option<u32>,

    /// V4L2 device with the relative focus control, overrides the config file
    #[arg(short, long, global = true)]
    actuator: Option<String>,

    /// Minimum focus step, overrides the config file
    #[arg(long, global = true)]
    min_step: Option<u32>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List cameras
    ListDevices {
        #[arg(long)]
        json: bool,
    },

    /// Focus continuously until quit
    Run {
        /// Record every frame to this MP4 file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Use the configured minimum step instead of calibrating
        #[arg(long)]
        no_calibrate: bool,

        /// Loop interval in milliseconds
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Stop after this many iterations
        #[arg(long)]
        max_iterations: Option<u64>,

        /// Print every iteration as a JSON line
        #[arg(long)]
        trace: bool,

        /// No keyboard; ctrl-c quits
        #[arg(long)]
        headless: bool,
    },

    /// Measure the smallest honored focus step
    Calibrate {
        /// Travel end to calibrate against
        #[arg(long)]
        direction: Option<Direction>,

        /// Upper bound of the search
        #[arg(long)]
        start_with: Option<u32>,

        #[arg(long)]
        json: bool,
    },

    /// Step by the minimum step and log scores
    Measure {
        #[arg(short, long)]
        iterations: Option<u32>,

        /// Calibrate first and measure with the result
        #[arg(long)]
        calibrate: bool,

        #[arg(long)]
        json: bool,
    },

    /// Write a default configuration file
    InitConfig {
        path: Option<PathBuf>,

        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();

    match &args.command {
        Command::ListDevices { json } => cmd_list_devices(*json),
        Command::InitConfig { path, force } => cmd_init_config(path.clone(), *force),
        Command::Run {
            output,
            no_calibrate,
            interval_ms,
            max_iterations,
            trace,
            headless,
        } => {
            let mut config = load_config(&args)?;
            if let Some(ms) = interval_ms {
                config.session.frame_interval_ms = *ms;
            }
            if max_iterations.is_some() {
                config.session.max_iterations = *max_iterations;
            }
            if *no_calibrate {
                config.lens.calibrate = false;
            }
            cmd_run(config, output.clone(), *trace, *headless)
        }
        Command::Calibrate {
            direction,
            start_with,
            json,
        } => {
            let mut config = load_config(&args)?;
            if let Some(direction) = direction {
                config.lens.calibration_direction = *direction;
            }
            if let Some(start_with) = start_with {
                config.calibration.start_with = *start_with;
            }
            cmd_calibrate(config, *json)
        }
        Command::Measure {
            iterations,
            calibrate,
            json,
        } => {
            let mut config = load_config(&args)?;
            if let Some(iterations) = iterations {
                config.session.measure_iterations = *iterations;
            }
            cmd_measure(config, *calibrate, *json)
        }
    }
}

fn load_config(args: &Args) -> Result<AutofocusConfig> {
    let path = args
        .config
        .clone()
        .unwrap_or_else(AutofocusConfig::default_path);
    let mut config = AutofocusConfig::load_from_file(&path)
        .with_context(|| format!("loading {}", path.display()))?;

    if let Some(device) = args.device {
        config.camera.device_index = device;
    }
    if let Some(ref actuator) = args.actuator {
        config.camera.actuator_path = actuator.clone();
    }
    if let Some(min_step) = args.min_step {
        config.lens.min_focus_step = min_step;
    }

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {}", e))?;
    Ok(config)
}

#[cfg(target_os = "linux")]
fn open_lens(path: &str) -> Result<Box<dyn LensActuator>> {
    let lens = crabfocus::platform::V4l2FocusActuator::open(path)?;
    Ok(Box::new(lens))
}

#[cfg(not(target_os = "linux"))]
fn open_lens(path: &str) -> Result<Box<dyn LensActuator>> {
    bail!("no lens actuator available for {} on this platform", path)
}

fn open_session(
    config: AutofocusConfig,
) -> Result<FocusSession<NokhwaFrameSource, Box<dyn LensActuator>>> {
    let camera = NokhwaFrameSource::open(config.camera.device_index)
        .context("camera unavailable")?;
    let lens = open_lens(&config.camera.actuator_path).context("lens unavailable")?;
    Ok(FocusSession::new(config, camera, lens)?)
}

fn cmd_list_devices(json: bool) -> Result<()> {
    let cameras = list_cameras()?;
    if json {
        println!("{}", serde_json::to_string(&cameras)?);
    } else if cameras.is_empty() {
        println!("No cameras found");
    } else {
        for camera in cameras {
            println!("{}: {} ({})", camera.index, camera.name, camera.description);
        }
    }
    Ok(())
}

fn cmd_init_config(path: Option<PathBuf>, force: bool) -> Result<()> {
    let path = path.unwrap_or_else(AutofocusConfig::default_path);
    if path.exists() && !force {
        bail!("{} already exists (use --force to replace it)", path.display());
    }
    AutofocusConfig::default().save_to_file(&path)?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn cmd_calibrate(config: AutofocusConfig, json: bool) -> Result<()> {
    let mut session = open_session(config)?;
    let result = session.calibrate()?;
    if json {
        println!("{}", serde_json::to_string(&result)?);
    } else if result.min_step == 0 {
        println!("Lens never honored a step toward the {} end", result.direction);
    } else {
        println!(
            "Minimum focus step toward {} end: {}",
            result.direction, result.min_step
        );
    }
    Ok(())
}

fn cmd_measure(config: AutofocusConfig, calibrate: bool, json: bool) -> Result<()> {
    let iterations = config.session.measure_iterations;
    let mut session = open_session(config)?;
    if calibrate {
        session.calibrate()?;
    }

    let samples = session.measure(iterations)?;
    for sample in &samples {
        if json {
            println!("{}", serde_json::to_string(sample)?);
        } else {
            println!(
                "{:5} {:9.3}s score={:.5} step={} accepted={}",
                sample.iteration, sample.elapsed_secs, sample.score, sample.command, sample.accepted
            );
        }
    }
    Ok(())
}

fn cmd_run(
    config: AutofocusConfig,
    output: Option<PathBuf>,
    trace: bool,
    headless: bool,
) -> Result<()> {
    let calibrate = config.lens.calibrate;
    let interval_ms = config.session.frame_interval_ms;
    let mut session = open_session(config)?;

    if let Some(path) = output {
        attach_recorder(&mut session, path, interval_ms)?;
    }

    if calibrate {
        let result = session.calibrate()?;
        log::info!(
            "Calibrated toward {}: min step {}",
            result.direction,
            result.min_step
        );
    }

    let flag_input = FlagInput::new();
    let quit = flag_input.flag();
    ctrlc::set_handler(move || quit.store(true, Ordering::SeqCst))
        .context("installing ctrl-c handler")?;

    let mut input: Box<dyn OperatorInput> = if headless {
        Box::new(flag_input)
    } else {
        eprintln!("j/k step out/in, n/f drive near/far, r reset, a toggle autofocus, q quit\r");
        Box::new(KeyboardInput::new()?)
    };

    // raw mode needs explicit carriage returns
    let eol = if headless { "\n" } else { "\r\n" };
    session.set_observer(move |report: &IterationReport| {
        if trace {
            if let Ok(line) = serde_json::to_string(report) {
                print!("{}{}", line, eol);
            }
        } else {
            eprint!(
                "\r[{:>6}] score {:.5}  best {:.5}  step {:>6}  ",
                report.mode.to_string(),
                report.score,
                report.controller.state.rate_max,
                report.command.map_or_else(|| "-".to_string(), |c| c.to_string())
            );
        }
        let _ = std::io::stdout().flush();
    });

    let summary = session.run(&mut input)?;
    drop(input);
    eprintln!();
    println!("{}", serde_json::to_string(&summary)?);
    Ok(())
}

#[cfg(feature = "recording")]
fn attach_recorder<S, A>(
    session: &mut FocusSession<S, A>,
    path: PathBuf,
    interval_ms: u64,
) -> Result<()>
where
    S: crabfocus::FrameSource,
    A: LensActuator,
{
    use crabfocus::recording::{Mp4Recorder, RecordingConfig};

    let config = RecordingConfig::for_interval_ms(interval_ms).with_title("crabfocus session");
    match Mp4Recorder::new(&path, config) {
        Ok(recorder) => session.set_recorder(Box::new(recorder)),
        Err(e) => log::warn!("Recording disabled: {}", e),
    }
    Ok(())
}

#[cfg(not(feature = "recording"))]
fn attach_recorder<S, A>(
    _session: &mut FocusSession<S, A>,
    path: PathBuf,
    _interval_ms: u64,
) -> Result<()> {
    bail!(
        "cannot record to {}: built without the `recording` feature",
        path.display()
    )
}
