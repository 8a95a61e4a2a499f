//! camcorder demo
//!
//! Drives the capture session engine against the simulated platform from
//! line commands on stdin and prints every camera event to stdout.

use anyhow::Result;
use std::io::BufRead;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{error, info};

use camcorder::device::CameraSelection;
use camcorder::logging::{get_log_dir, init_logging};
use camcorder::orientation::DeviceOrientation;
use camcorder::platform::simulated::SimulatedRig;
use camcorder::session::{pump_events, spawn_session, CameraHandle, CameraObserver};
use camcorder::Config;

/// Prints events as they arrive
struct ConsoleObserver;

impl CameraObserver for ConsoleObserver {
    fn did_begin_recording(&mut self, camera: CameraSelection) {
        println!("recording started ({} camera)", camera);
    }

    fn did_finish_recording(&mut self, camera: CameraSelection) {
        println!("recording stopped ({} camera)", camera);
    }

    fn recorded_duration(&mut self, formatted: &str) {
        println!("  {}", formatted);
    }

    fn did_finish_processing(&mut self, file: PathBuf) {
        println!("saved {}", file.display());
    }

    fn did_fail_to_record(&mut self, detail: &str) {
        println!("recording failed: {}", detail);
    }

    fn did_switch_camera(&mut self, camera: CameraSelection) {
        println!("switched to {} camera", camera);
    }

    fn did_error(&mut self, message: &str) {
        println!("error: {}", message);
    }
}

/// One stdin line
#[derive(Debug, PartialEq, Eq)]
enum DemoCommand {
    Record,
    Stop,
    Switch,
    Tap,
    Flash(bool),
    Rotate(DeviceOrientation),
    Layout(DeviceOrientation),
    Status,
    Quit,
}

impl DemoCommand {
    fn parse(line: &str) -> Result<Self, String> {
        let mut words = line.split_whitespace();
        let command = words.next().unwrap_or_default();
        let argument = words.next();

        let orientation = |arg: Option<&str>| {
            arg.and_then(DeviceOrientation::parse)
                .ok_or_else(|| format!("unknown orientation {:?}", arg.unwrap_or_default()))
        };

        match (command, argument) {
            ("record", None) => Ok(DemoCommand::Record),
            ("stop", None) => Ok(DemoCommand::Stop),
            ("switch", None) => Ok(DemoCommand::Switch),
            ("tap", None) => Ok(DemoCommand::Tap),
            ("flash", Some("on")) => Ok(DemoCommand::Flash(true)),
            ("flash", Some("off")) => Ok(DemoCommand::Flash(false)),
            ("rotate", arg) => orientation(arg).map(DemoCommand::Rotate),
            ("layout", arg) => orientation(arg).map(DemoCommand::Layout),
            ("status", None) => Ok(DemoCommand::Status),
            ("quit", None) | ("exit", None) => Ok(DemoCommand::Quit),
            _ => Err(format!("unknown command: {}", line.trim())),
        }
    }
}

fn main() -> Result<()> {
    // File logging is best effort for the demo
    let _log_guard = match init_logging() {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Logging disabled: {:#}", e);
            None
        }
    };

    info!("camcorder demo starting...");

    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }

    let config = match args.iter().position(|a| a == "--config" || a == "-c") {
        Some(index) => {
            let path = args
                .get(index + 1)
                .map(PathBuf::from)
                .ok_or_else(|| anyhow::anyhow!("--config needs a path"))?;
            Config::load_from(&path)?
        }
        None => Config::load()?,
    };
    info!("Configuration loaded from {:?}", config.config_path().ok());

    let runtime = tokio::runtime::Runtime::new()?;
    let rig = SimulatedRig::new();

    let (handle, events) = {
        let _guard = runtime.enter();
        spawn_session(config, rig.platform())
    };

    let observer = runtime.spawn(async move {
        let mut console = ConsoleObserver;
        pump_events(events, &mut console).await;
    });

    // Set up Ctrl+C handler that sends shutdown command
    let ctrl_c_handle = handle.clone();
    ctrlc::set_handler(move || {
        info!("Ctrl+C received, shutting down...");
        ctrl_c_handle.shutdown();
    })?;

    print_help();

    // Blocking stdin reads stay off the runtime
    let (line_tx, mut line_rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else {
                break;
            };
            if line_tx.send(line).is_err() {
                break;
            }
        }
    });

    runtime.block_on(async {
        loop {
            tokio::select! {
                line = line_rx.recv() => {
                    match line {
                        Some(line) => {
                            if !handle_line(&line, &handle, &rig) {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = handle.closed() => break,
            }
        }

        handle.shutdown();
        handle.closed().await;
        if let Err(e) = observer.await {
            error!("Event observer task failed: {}", e);
        }
    });

    info!("Shutdown complete");
    Ok(())
}

/// Apply one stdin line. Returns false on quit.
fn handle_line(line: &str, handle: &CameraHandle, rig: &SimulatedRig) -> bool {
    if line.trim().is_empty() {
        return true;
    }

    match DemoCommand::parse(line) {
        Ok(DemoCommand::Record) => handle.start_recording(),
        Ok(DemoCommand::Stop) => handle.stop_recording(),
        Ok(DemoCommand::Switch) => handle.switch_camera(),
        Ok(DemoCommand::Tap) => handle.double_tap(),
        Ok(DemoCommand::Flash(enabled)) => handle.set_flash(enabled),
        Ok(DemoCommand::Rotate(orientation)) => rig.rotate(orientation),
        Ok(DemoCommand::Layout(orientation)) => handle.layout_changed(orientation),
        Ok(DemoCommand::Status) => {
            let snapshot = handle.snapshot();
            println!(
                "state: {}, camera: {}, running: {}, recording: {}, torch: {}, authorization: {:?}",
                snapshot.state,
                snapshot.current_camera,
                snapshot.is_running,
                snapshot.is_recording,
                snapshot.torch_on,
                snapshot.authorization
            );
        }
        Ok(DemoCommand::Quit) => return false,
        Err(message) => println!("{}", message),
    }
    true
}

fn print_help() {
    println!("camcorder - capture session demo on a simulated camera rig");
    println!();
    println!("USAGE:");
    println!("    camcorder [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    -h, --help            Print this help message");
    println!("    -c, --config <PATH>   Load configuration from PATH");
    println!();
    println!("COMMANDS (stdin):");
    println!("    record                Start recording (stops if already recording)");
    println!("    stop                  Stop recording");
    println!("    switch                Switch between front and rear camera");
    println!("    tap                   Double tap on the preview");
    println!("    flash on|off          Torch for rear camera recordings");
    println!("    rotate <orientation>  Simulate a device rotation");
    println!("    layout <orientation>  Simulate a layout pass");
    println!("    status                Print the session snapshot");
    println!("    quit                  Tear down and exit");
    println!();
    println!("    orientations: portrait, upside-down, landscape-left, landscape-right,");
    println!("                  face-up, face-down, unknown");
    println!();
    println!("ENVIRONMENT:");
    println!("    RUST_LOG              Set log level (e.g., debug, info, warn)");
    println!("    CAMCORDER_LOG_PATH    Override the log directory");
    if let Ok(log_dir) = get_log_dir() {
        println!();
        println!("LOGS:");
        println!("    {}", log_dir.display());
    }
}
