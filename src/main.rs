//! DoseWatch CLI
//!
//! Usage:
//!   dosewatch --replay trace.jsonl           # Replay a recorded frame trace
//!   dosewatch --replay - < trace.jsonl       # Trace from stdin
//!   dosewatch --interactive                  # One JSON frame per line
//!   dosewatch --serve                        # HTTP API server
//!   dosewatch --print-config                 # Show the active configuration

use clap::Parser;
use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use dosewatch::core::{parse_frame_line, run_server, ComplianceSession, ControlCommand, FrameTrace, StepResult};
use dosewatch::types::{ProtocolStateView, ProtocolStatus};
use dosewatch::{ProtocolConfig, VERSION};

#[derive(Parser, Debug)]
#[command(
    name = "dosewatch",
    version = VERSION,
    about = "DoseWatch - verify medication intake from per-frame detections",
    long_about = "DoseWatch drives a six-phase verification protocol from per-frame\n\
                  object detections (pill, pill-on-tongue, tongue-no-pill, hand) and\n\
                  a jaw-opening measurement.\n\n\
                  Phases:\n  \
                  1  Pill held up to the camera\n  \
                  2  Mouth open, empty tongue visible\n  \
                  3  Pill held on the tongue\n  \
                  4  Mouth closed\n  \
                  5  Mouth re-opened, pill gone\n  \
                  6  Empty tongue held - swallow confirmed\n\n\
                  Exit codes: 0 SUCCESS, 2 FATAL_FAILURE, 1 unfinished or error"
)]
struct Args {
    /// Replay a JSON-lines frame trace ("-" reads stdin)
    #[arg(short, long, value_name = "FILE")]
    replay: Option<PathBuf>,

    /// Interactive mode - one JSON frame per line, plus reset/status/stop/start/quit
    #[arg(short, long)]
    interactive: bool,

    /// Run as HTTP API server
    #[arg(short, long)]
    serve: bool,

    /// Server address
    #[arg(long, default_value = "127.0.0.1:8004")]
    addr: String,

    /// Protocol configuration file (TOML)
    #[arg(short, long, env = "DOSEWATCH_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print the active configuration as TOML and exit
    #[arg(long)]
    print_config: bool,

    /// Patient identifier recorded on the CLI session
    #[arg(long, default_value = "local")]
    patient: String,

    /// Output as JSON lines
    #[arg(long)]
    json: bool,

    /// Disable colors in output
    #[arg(long)]
    no_color: bool,

    /// Show per-class confidences for every frame
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(if args.serve { "info" } else { "warn" });

    if args.no_color {
        colored::control::set_override(false);
    }

    let config = match ProtocolConfig::load(args.config.as_deref()) {
        Ok(config) => Arc::new(config),
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            return ExitCode::from(1);
        }
    };

    if args.print_config {
        return match config.to_toml_string() {
            Ok(rendered) => {
                print!("{}", rendered);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{} {}", "error:".red().bold(), e);
                ExitCode::from(1)
            }
        };
    }

    if args.serve {
        run_serve(&args, config).await
    } else if let Some(ref path) = args.replay {
        run_replay(path, &args, config)
    } else {
        // Default to interactive if no mode specified
        run_interactive(&args, config)
    }
}

/// Logs go to stderr so stdout stays parseable
fn init_tracing(default_level: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(env_filter)
        .init();
}

/// Replay a recorded trace until it ends or the run completes
fn run_replay(path: &Path, args: &Args, config: Arc<ProtocolConfig>) -> ExitCode {
    let trace = match FrameTrace::open(path) {
        Ok(trace) => trace,
        Err(e) => {
            eprintln!("{} {}: {}", "error:".red().bold(), path.display(), e);
            return ExitCode::from(1);
        }
    };

    let mut session = ComplianceSession::new("replay", args.patient.clone(), config);

    for frame in trace {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                eprintln!("{} {}", "error:".red().bold(), e);
                return ExitCode::from(1);
            }
        };
        match session.process_frame(&frame) {
            Ok(result) => {
                print_step(&result, args);
                if result.completed {
                    break;
                }
            }
            Err(e) => {
                eprintln!("{} {}", "error:".red().bold(), e);
                return ExitCode::from(1);
            }
        }
    }

    let final_state = session.current_state();
    if !args.json {
        println!();
        println!(
            "Replay finished: {} frames | phase {} | {}",
            final_state.frames_processed,
            final_state.phase.number(),
            final_state.status.paint(&final_state.status.to_string())
        );
    }
    exit_code(final_state.status)
}

/// Read frames and commands from stdin
fn run_interactive(args: &Args, config: Arc<ProtocolConfig>) -> ExitCode {
    let mut session = ComplianceSession::new("interactive", args.patient.clone(), config);

    if !args.json {
        print_header();
        println!("Paste one JSON frame per line, e.g.");
        println!(r#"  {{"detections":[{{"class":"pill","confidence":0.8}}],"face":{{"jaw_drop_px":0,"landmarks_present":false}}}}"#);
        println!("Commands: reset, status, stop, start, quit");
        println!();
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        if !args.json {
            let state = session.current_state();
            print!("{} > ", state.status.paint(&format!("[{} | {}]", state.phase, state.status)));
            stdout.flush().ok();
        }

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(_) => break,
        }

        let command = line.trim().to_ascii_lowercase();
        match command.as_str() {
            "quit" | "exit" => break,
            "status" => {
                print_view(&session.current_state(), args);
                continue;
            }
            "reset" => {
                print_view(&session.apply(ControlCommand::Reset), args);
                continue;
            }
            "stop" => {
                print_view(&session.apply(ControlCommand::Stop), args);
                continue;
            }
            "start" => {
                print_view(&session.apply(ControlCommand::Start), args);
                continue;
            }
            _ => {}
        }

        match parse_frame_line(&line) {
            Ok(Some(frame)) => match session.process_frame(&frame) {
                Ok(result) => print_step(&result, args),
                Err(e) => eprintln!("{} {}", "rejected:".yellow(), e),
            },
            Ok(None) => continue,
            Err(e) => eprintln!("{} {}", "rejected:".yellow(), e),
        }
    }

    let final_state = session.current_state();
    if !args.json {
        println!(
            "\nSession ended. Frames: {} | {}",
            final_state.frames_processed, final_state.status
        );
    }
    exit_code(final_state.status)
}

/// Run HTTP API server
async fn run_serve(args: &Args, config: Arc<ProtocolConfig>) -> ExitCode {
    print_header();
    if let Err(e) = run_server(&args.addr, config).await {
        eprintln!("{} server: {}", "error:".red().bold(), e);
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn exit_code(status: ProtocolStatus) -> ExitCode {
    match status {
        ProtocolStatus::Success => ExitCode::SUCCESS,
        ProtocolStatus::FatalFailure => ExitCode::from(2),
        ProtocolStatus::Running => ExitCode::from(1),
    }
}

fn print_header() {
    println!("{}", "========================================".bold());
    println!("{}", format!("  DoseWatch v{}", VERSION).bold());
    println!("{}", "========================================".bold());
    println!();
}

/// Print one processed frame
fn print_step(result: &StepResult, args: &Args) {
    if args.json {
        match serde_json::to_string(result) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("{} {}", "error:".red().bold(), e),
        }
        return;
    }

    print_view(&result.state, args);
    if args.verbose {
        println!("{}", format!("        {}", result.confidences).dimmed());
    }
    if result.completed {
        print_outcome(&result.state);
    }
}

fn print_view(view: &ProtocolStateView, args: &Args) {
    if args.json {
        match serde_json::to_string(view) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("{} {}", "error:".red().bold(), e),
        }
    } else if args.no_color {
        println!("{} | {}", view.to_parseable_string(), view.guidance);
    } else {
        println!("{}", view.to_terminal_string());
    }
}

/// Print the end-of-run banner
fn print_outcome(view: &ProtocolStateView) {
    match view.status {
        ProtocolStatus::Success => {
            println!("{}", "  ✓ MEDICATION INTAKE VERIFIED".green().bold());
        }
        ProtocolStatus::FatalFailure => {
            let reason = view.fatal_reason.as_deref().unwrap_or("unknown");
            println!("{}", format!("  ✗ VERIFICATION FAILED - {}", reason).red().bold());
        }
        ProtocolStatus::Running => {}
    }
}
