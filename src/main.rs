//! StepFlow CLI Entry Point
//!
//! Headless front-end for the execution engine: loads the flow catalog,
//! selects a flow and executes it, printing the progress log to the
//! terminal.
//!
//! # Usage
//!
//! ```bash
//! # List flows in the catalog
//! stepflow --list
//!
//! # Execute a flow
//! stepflow nightly_import
//!
//! # Start from the third step with one edge cut
//! stepflow nightly_import --start 2 --cut-edge 3
//!
//! # Point at another config directory and interpreter
//! stepflow nightly_import --config-dir ./configs --interpreter python3
//! ```

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use log::{debug, error, info};

use stepflow::catalog::CatalogStore;
use stepflow::execution::{RunController, ScriptRunner};
use stepflow::progress::{progress_channel, NoticeKind, ProgressEvent, RunOutcome};
use stepflow::{APP_NAME, VERSION};

/// Command-line configuration parsed from arguments.
#[derive(Debug, Default)]
struct Config {
    flow_key: Option<String>,
    config_dir: Option<PathBuf>,
    scripts_dir: Option<PathBuf>,
    interpreter: Option<String>,
    start_index: usize,
    cut_edges: Vec<usize>,
    list: bool,
    verbose: bool,
}

/// Configures the logging system with appropriate formatting.
fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            use std::io::Write;

            match record.level() {
                log::Level::Warn | log::Level::Error => {
                    writeln!(buf, "[{}] {}", record.level(), record.args())
                }
                _ => writeln!(buf, "{}", record.args()),
            }
        })
        .init();
}

/// Prints the application banner with version information.
fn print_banner() {
    println!();
    println!("{} v{}", APP_NAME, VERSION);
    println!("Sequential Workflow Execution Engine");
    println!();
}

/// Prints usage information.
fn print_usage() {
    println!("Usage: stepflow [OPTIONS] <FLOW_KEY>");
    println!();
    println!("Arguments:");
    println!("  <FLOW_KEY>          Key of the flow to execute");
    println!();
    println!("Options:");
    println!("  --list              List flows in the catalog and exit");
    println!("  --start N           Start execution from step index N (default: 0)");
    println!("  --cut-edge N        Disable the edge after step N (repeatable)");
    println!("  --config-dir PATH   Directory holding config.json / global_config.json");
    println!("  --scripts-dir PATH  Directory step scripts are resolved against");
    println!("  --interpreter PATH  Interpreter overriding the configured one");
    println!("  --verbose           Enable debug logging");
    println!("  --help              Show this help message");
    println!("  --version           Show version information");
    println!();
    println!("Examples:");
    println!("  stepflow --list");
    println!("  stepflow nightly_import");
    println!("  stepflow nightly_import --start 1 --cut-edge 3");
}

/// Parses command-line arguments into a Config struct.
fn parse_arguments(args: &[String]) -> Result<Config, String> {
    let mut config = Config::default();
    let mut i = 1; // Skip program name

    while i < args.len() {
        let arg = &args[i];

        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("{} {}", APP_NAME, VERSION);
                std::process::exit(0);
            }
            "--list" => {
                config.list = true;
            }
            "--verbose" | "-v" => {
                config.verbose = true;
            }
            "--start" => {
                i += 1;
                if i >= args.len() {
                    return Err("--start requires an index argument".to_string());
                }
                config.start_index = args[i]
                    .parse()
                    .map_err(|_| format!("Invalid start index: {}", args[i]))?;
            }
            "--cut-edge" => {
                i += 1;
                if i >= args.len() {
                    return Err("--cut-edge requires an index argument".to_string());
                }
                let edge = args[i]
                    .parse()
                    .map_err(|_| format!("Invalid edge index: {}", args[i]))?;
                config.cut_edges.push(edge);
            }
            "--config-dir" => {
                i += 1;
                if i >= args.len() {
                    return Err("--config-dir requires a path argument".to_string());
                }
                config.config_dir = Some(PathBuf::from(&args[i]));
            }
            "--scripts-dir" => {
                i += 1;
                if i >= args.len() {
                    return Err("--scripts-dir requires a path argument".to_string());
                }
                config.scripts_dir = Some(PathBuf::from(&args[i]));
            }
            "--interpreter" => {
                i += 1;
                if i >= args.len() {
                    return Err("--interpreter requires a path argument".to_string());
                }
                config.interpreter = Some(args[i].clone());
            }
            arg if arg.starts_with('-') => {
                return Err(format!("Unknown option: {}", arg));
            }
            _ => {
                if config.flow_key.is_some() {
                    return Err(format!("Unexpected argument: {}", arg));
                }
                config.flow_key = Some(arg.clone());
            }
        }
        i += 1;
    }

    Ok(config)
}

/// Main application entry point.
fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    // Parse arguments
    let config = parse_arguments(&args).map_err(|e| {
        eprintln!("Error: {}", e);
        eprintln!();
        print_usage();
        e
    })?;

    // Setup logging
    setup_logging(config.verbose);

    // Print banner
    print_banner();

    // Load catalog and settings
    let store = match &config.config_dir {
        Some(dir) => CatalogStore::with_config_dir(dir),
        None => CatalogStore::new(),
    };
    let catalog = store.load_flows();

    if config.list {
        if catalog.is_empty() {
            println!("No flows in catalog ({})", store.flows_path().display());
            return Ok(());
        }
        println!("Flows:");
        for (key, flow) in catalog.iter() {
            println!("  {} ({} steps) - {}", key, flow.len(), flow.description);
        }
        return Ok(());
    }

    let flow_key = config
        .flow_key
        .ok_or("No flow key given. Use --list to see available flows.")?;

    let flow = catalog.get_flow(&flow_key).ok_or_else(|| {
        format!(
            "Flow \"{}\" not found in {}",
            flow_key,
            store.flows_path().display()
        )
    })?;

    let settings = store.load_settings();
    let interpreter = config
        .interpreter
        .unwrap_or_else(|| settings.interpreter_path.clone());

    info!(
        "Flow \"{}\": {} steps, interpreter: {}",
        flow_key,
        flow.len(),
        interpreter
    );

    let mut runner = ScriptRunner::new(interpreter);
    if let Some(dir) = config.scripts_dir {
        runner = runner.with_scripts_dir(dir);
    }

    // Wire the controller to an event queue drained on this thread; the
    // run itself happens on the controller's worker thread.
    let (sink, events) = progress_channel();
    let controller = RunController::new(runner, Arc::new(sink));

    if !controller.select_flow(&flow_key, flow) {
        return Err("Could not select flow".into());
    }
    controller.select_start(config.start_index);
    for edge in &config.cut_edges {
        controller.disable_edge(*edge);
    }

    if !controller.start_run() {
        return Err("Could not start the run".into());
    }

    let mut outcome = RunOutcome::Stopped;
    for event in events {
        match event {
            ProgressEvent::LogLine(line) => println!("{}", line),
            ProgressEvent::UserNotice { kind, message } => match kind {
                NoticeKind::Info => println!(">>> {}", message),
                NoticeKind::Error => eprintln!(">>> {}", message),
            },
            ProgressEvent::NodeState { index, state } => {
                debug!("node {} -> {:?}", index, state);
            }
            ProgressEvent::ActiveEdge(edge) => {
                debug!("active edge -> {:?}", edge);
            }
            ProgressEvent::CenterView(index) => {
                debug!("center view -> {}", index);
            }
            ProgressEvent::RunStarted => {
                info!("Run started");
            }
            ProgressEvent::RunFinished(result) => {
                outcome = result;
                break;
            }
        }
    }

    controller.wait();

    match outcome {
        RunOutcome::Completed | RunOutcome::Stopped => Ok(()),
        RunOutcome::Failed => {
            error!("Flow \"{}\" failed", flow_key);
            Err(format!("Flow \"{}\" failed", flow_key).into())
        }
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!();
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
