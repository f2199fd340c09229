//! REPL – slash-commands read from stdin while the frame loop runs.
//!
//! Supported slash-commands:
//!   /help                – show this list
//!   /status              – link, frame and scene counters
//!   /bench               – start the before/after benchmark
//!   /cancel              – abort a running benchmark
//!   /optimize            – run the optimisation pass now
//!   /report              – export the performance report
//!   /report bench        – export (or retry exporting) the last benchmark
//!   /send <kind> <json>  – send a message to the sensor hub
//!   /quit | /exit        – gracefully exit the CLI
//!
//! Stdin is read on a dedicated thread; parsed commands are handed to the
//! frame loop over a channel so the scene is only touched from one place.

use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::ops::ControlFlow;
use std::path::Path;
use std::time::Instant;

use scenepulse_runtime::{BenchmarkProgress, SceneCoordinator};
use scenepulse_transport::{SendOutcome, TransportHandle};
use scenepulse_types::{BenchmarkReport, EventKind};
use serde_json::Value;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Status,
    Bench,
    Cancel,
    Optimize,
    Report,
    ReportBench,
    Send { kind: EventKind, payload: Value },
    Quit,
}

/// Parse one input line. `Ok(None)` for a blank line.
pub fn parse(line: &str) -> Result<Option<Command>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (head, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let command = match head {
        "/help" => Command::Help,
        "/status" => Command::Status,
        "/bench" => Command::Bench,
        "/cancel" => Command::Cancel,
        "/optimize" => Command::Optimize,
        "/report" => match rest.trim() {
            "" => Command::Report,
            "bench" => Command::ReportBench,
            other => return Err(format!("unknown report '{other}'")),
        },
        "/quit" | "/exit" => Command::Quit,
        "/send" => parse_send(rest.trim())?,
        other => return Err(format!("unknown command '{other}'")),
    };
    Ok(Some(command))
}

fn parse_send(args: &str) -> Result<Command, String> {
    let (kind, json) = args.split_once(char::is_whitespace).unwrap_or((args, ""));
    if kind.is_empty() {
        return Err("usage: /send <kind> <json>".to_string());
    }
    let kind: EventKind = kind.parse().map_err(|e| format!("{e}"))?;
    let payload = match json.trim() {
        "" => Value::Null,
        raw => serde_json::from_str(raw).map_err(|e| format!("invalid JSON payload: {e}"))?,
    };
    Ok(Command::Send { kind, payload })
}

/// Read stdin on a background thread, forwarding parsed commands. EOF is
/// treated as `/quit`.
pub fn spawn_reader(tx: mpsc::UnboundedSender<Command>) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        let stdin = io::stdin();
        let mut line = String::new();
        loop {
            print!("{} ", "scenepulse>".bold().cyan());
            io::stdout().flush().ok();

            line.clear();
            match stdin.lock().read_line(&mut line) {
                Ok(0) => {
                    let _ = tx.send(Command::Quit);
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    eprintln!("{}: {}", "Read error".red(), e);
                    let _ = tx.send(Command::Quit);
                    break;
                }
            }

            match parse(&line) {
                Ok(Some(command)) => {
                    let quit = command == Command::Quit;
                    if tx.send(command).is_err() || quit {
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => println!(
                    "{} {}. Type {} for available commands.",
                    "Error:".red(),
                    e.yellow(),
                    "/help".bold()
                ),
            }
        }
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Command handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Run `command` against the live session. `Break` ends the frame loop.
pub fn execute(
    command: Command,
    coordinator: &mut SceneCoordinator,
    transport: &TransportHandle,
    report_dir: &Path,
) -> ControlFlow<()> {
    match command {
        Command::Help => cmd_help(),
        Command::Status => cmd_status(coordinator),
        Command::Bench => match coordinator.start_benchmark(Instant::now()) {
            Ok(()) => println!(
                "{} {}",
                "▶ Benchmark started:".green(),
                coordinator.benchmark_config().description().bold()
            ),
            Err(e) => println!("{} {}", "Cannot start benchmark:".red(), e),
        },
        Command::Cancel => {
            if coordinator.cancel_benchmark() {
                println!("{}", "Benchmark cancelled.".yellow());
            } else {
                println!("{}", "No benchmark is running.".dimmed());
            }
        }
        Command::Optimize => {
            let summary = coordinator.optimize_now();
            println!(
                "{} {} material(s), {} map(s) removed, {} model(s) converted to LOD, {} skipped",
                "✓ Optimised".green(),
                summary.materials_changed,
                summary.maps_removed,
                summary.converted.len(),
                summary.skipped.len()
            );
        }
        Command::Report => match coordinator.export_perf_report(report_dir) {
            Ok(path) => println!("{} {}", "✓ Report written to".green(), path.display().to_string().bold()),
            Err(e) => println!("{}: {}", "Export failed".red(), e),
        },
        Command::ReportBench => save_benchmark(coordinator, report_dir),
        Command::Send { kind, payload } => match transport.send(kind, &payload) {
            SendOutcome::Sent => println!("{} {}", "✓ Sent".green(), kind.to_string().bold()),
            SendOutcome::NotConnected => {
                println!("{} link is {:?}", "Not sent:".yellow(), transport.state())
            }
        },
        Command::Quit => {
            println!("{}", "Goodbye.".green());
            return ControlFlow::Break(());
        }
    }
    ControlFlow::Continue(())
}

fn cmd_help() {
    println!();
    println!("{}", "ScenePulse Commands".bold().underline());
    println!("  {}              – link, frame and scene counters", "/status".bold().cyan());
    println!("  {}               – run the before/after benchmark", "/bench".bold().cyan());
    println!("  {}              – abort a running benchmark", "/cancel".bold().cyan());
    println!("  {}            – run the optimisation pass now", "/optimize".bold().cyan());
    println!("  {}              – export the performance report", "/report".bold().cyan());
    println!("  {}        – export the last benchmark report", "/report bench".bold().cyan());
    println!("  {} – send a message to the hub", "/send <kind> <json>".bold().cyan());
    println!("  {}        – exit the CLI", "/quit  /exit".bold().cyan());
    println!();
}

fn cmd_status(coordinator: &SceneCoordinator) {
    let data = coordinator.data();
    println!("{}", "Status".bold().underline());
    println!("  Link        : {:?}", data.link);
    match coordinator.monitor().latest() {
        Some(sample) => {
            println!(
                "  Frame       : {:.1} fps, {:.2} ms",
                sample.fps, sample.frame_time_ms
            );
            println!(
                "  Renderer    : {} draw calls, {} triangles",
                sample.draw_calls, sample.triangle_count
            );
            if let Some(mb) = sample.memory_mb {
                println!("  Memory      : {mb:.1} MB");
            }
        }
        None => println!("  Frame       : {}", "no frames yet".dimmed()),
    }
    println!(
        "  Scene       : {} object(s), {} under LOD",
        coordinator.scene().len(),
        coordinator.lod().managed().len()
    );
    println!(
        "  Events      : {} received, {} detection(s), gesture {:?}",
        data.events_received,
        data.detections.len(),
        data.gesture
    );
    if let Some(voice) = &data.last_voice {
        println!("  Last voice  : \"{voice}\"");
    }
    println!("  Benchmark   : {:?}", coordinator.benchmark_phase());
}

/// Print benchmark progress and export the report once it completes.
pub fn report_progress(
    progress: &[BenchmarkProgress],
    coordinator: &SceneCoordinator,
    report_dir: &Path,
) {
    for event in progress {
        match event {
            BenchmarkProgress::PhaseChanged(phase) => {
                println!("  {} {:?}", "benchmark ▸".cyan(), phase);
            }
            BenchmarkProgress::Sampled { .. } => {}
            BenchmarkProgress::Completed(report) => {
                print_summary(report);
                save_benchmark(coordinator, report_dir);
            }
        }
    }
}

/// Export the coordinator's last benchmark. The report stays in memory on
/// failure so `/report bench` can retry.
fn save_benchmark(coordinator: &SceneCoordinator, report_dir: &Path) {
    match coordinator.export_benchmark(report_dir) {
        Ok(path) => println!(
            "  {} {}",
            "✓ Benchmark written to".green(),
            path.display().to_string().bold()
        ),
        Err(e) => {
            println!("{}: {}", "Benchmark export failed".red(), e);
            if coordinator.last_report().is_some() {
                println!("  Fix the report directory and run {} to retry.", "/report bench".bold());
            }
        }
    }
}

fn print_summary(report: &BenchmarkReport) {
    let summary = report.summary();
    println!();
    println!("{}", "Benchmark Results".bold().underline());
    println!("  {}", report.meta.description.dimmed());
    println!("  {:<12} {:>10} {:>10} {:>10}", "", "baseline", "optimized", "delta");
    println!(
        "  {:<12} {:>10.1} {:>10.1} {:>+10.1}",
        "fps", summary.baseline.mean_fps, summary.optimized.mean_fps, summary.fps_delta
    );
    println!(
        "  {:<12} {:>10.2} {:>10.2} {:>+10.2}",
        "frame ms",
        summary.baseline.mean_frame_time_ms,
        summary.optimized.mean_frame_time_ms,
        summary.frame_time_delta_ms
    );
    println!(
        "  {:<12} {:>10.0} {:>10.0} {:>+10.0}",
        "triangles",
        summary.baseline.mean_triangles,
        summary.optimized.mean_triangles,
        summary.triangle_delta
    );
    println!();
}
