//! `scenepulse-cli` – ScenePulse command line front end.
//!
//! This binary drives the whole pipeline headlessly. It:
//!
//! 1. Loads `~/.scenepulse/config.toml`, writing the defaults on first run.
//! 2. Builds a demo scene and a [`SceneCoordinator`] around it.
//! 3. Connects to the sensor hub with a reconnecting [`TransportClient`].
//! 4. Runs a simulated ~60 Hz render loop on a current-thread tokio runtime,
//!    taking slash-commands from stdin (`/status`, `/bench`, `/report`, …).
//! 5. Intercepts **Ctrl-C** to disconnect the transport and exit cleanly.
//!
//! `scenepulse mock-hub` instead runs a local sensor hub on `MOCK_WS_PORT`
//! (default 8765) that emits sample envelopes.

mod config;
mod repl;

use colored::Colorize;
use std::ops::ControlFlow;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use scenepulse_perf::RendererStats;
use scenepulse_runtime::{CoordinatorConfig, SceneCoordinator, telemetry};
use scenepulse_scene::graph::fixtures::detailed_model;
use scenepulse_scene::{NodeId, Scene, SceneGraph, SceneObject};
use scenepulse_transport::{MockHub, TransportClient, mock_hub};
use scenepulse_types::Vec3;

const FRAME_INTERVAL: Duration = Duration::from_micros(16_667);
const PROP_COUNT: usize = 8;
const PROP_RING_RADIUS: f32 = 12.0;

fn main() {
    // RUST_LOG filters, SCENEPULSE_LOG_FORMAT=json switches to JSON lines.
    let _telemetry = telemetry::init_tracing("scenepulse");

    print_banner();

    if std::env::args().nth(1).as_deref() == Some("mock-hub") {
        run_mock_hub(mock_hub_port(std::env::var("MOCK_WS_PORT").ok().as_deref()));
        return;
    }

    let cfg = match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) => {
            match config::save(&config::Config::default()) {
                Ok(()) => println!(
                    "  {} Default config written to {}",
                    "✓".green().bold(),
                    config::config_path().display().to_string().bold()
                ),
                Err(e) => println!("{}: {}", "Error saving config".red(), e),
            }
            config::defaults_with_env()
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            config::defaults_with_env()
        }
    };

    let coordinator_config = match cfg.coordinator() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}: {}", "Invalid configuration".red(), e);
            std::process::exit(2);
        }
    };

    let (command_tx, command_rx) = mpsc::unbounded_channel();

    let ctrlc_tx = command_tx.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – shutting down …".yellow().bold());
        let _ = ctrlc_tx.send(repl::Command::Quit);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; graceful shutdown on Ctrl-C will not be available");
    }

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("{}: {}", "Failed to start runtime".red(), e);
            std::process::exit(1);
        }
    };

    println!("  Hub endpoint {}", cfg.endpoint_url.dimmed());
    println!("  Type {} for a list of commands.\n", "/help".bold().cyan());

    repl::spawn_reader(command_tx);
    runtime.block_on(run(cfg, coordinator_config, command_rx));
}

/// The frame loop. Returns once `/quit`, EOF or Ctrl-C arrives.
async fn run(
    cfg: config::Config,
    coordinator_config: CoordinatorConfig,
    mut commands: mpsc::UnboundedReceiver<repl::Command>,
) {
    let (scene, avatar) = demo_scene();
    let mut coordinator = SceneCoordinator::new(coordinator_config, scene);
    coordinator.set_avatar(avatar);

    let mut client = TransportClient::websocket(cfg.transport());
    coordinator.attach_transport(&mut client);
    let transport = client.handle();
    let transport_task = tokio::spawn(client.run());

    let mut frames = tokio::time::interval(FRAME_INTERVAL);
    frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let started = Instant::now();

    loop {
        tokio::select! {
            _ = frames.tick() => {
                let now = Instant::now();
                let cost = coordinator.scene().frame_cost();
                let stats = RendererStats {
                    draw_calls: cost.draw_calls,
                    triangles: cost.triangles,
                };
                let camera = orbit_camera(now.duration_since(started));
                let progress = coordinator.tick(now, camera, Some(&stats));
                repl::report_progress(&progress, &coordinator, &cfg.report_dir);
            }
            command = commands.recv() => {
                let Some(command) = command else { break };
                if let ControlFlow::Break(()) =
                    repl::execute(command, &mut coordinator, &transport, &cfg.report_dir)
                {
                    break;
                }
            }
        }
    }

    transport.disconnect();
    match transport_task.await {
        Ok(state) => info!(?state, "transport stopped"),
        Err(e) => warn!(error = %e, "transport task failed"),
    }
}

fn mock_hub_port(raw: Option<&str>) -> u16 {
    match raw.map(str::parse::<u16>) {
        Some(Ok(port)) => port,
        Some(Err(e)) => {
            warn!(error = %e, "invalid MOCK_WS_PORT; using default");
            mock_hub::DEFAULT_PORT
        }
        None => mock_hub::DEFAULT_PORT,
    }
}

/// Serve the mock hub until the process is interrupted.
fn run_mock_hub(port: u16) {
    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("{}: {}", "Failed to start runtime".red(), e);
            std::process::exit(1);
        }
    };
    let result = runtime.block_on(async {
        let listener = MockHub::bind(port).await?;
        println!(
            "  {} Mock hub listening on {}",
            "✓".green().bold(),
            format!("ws://localhost:{port}").bold()
        );
        MockHub::default().serve(listener).await
    });
    if let Err(e) = result {
        eprintln!("{}: {}", "Mock hub failed".red(), e);
        std::process::exit(1);
    }
}

/// An avatar at the origin surrounded by a ring of detailed props.
fn demo_scene() -> (Scene, NodeId) {
    let mut scene = Scene::new();
    let avatar = scene.add(SceneObject::Model(detailed_model("avatar", Vec3::ZERO, 2_000)));
    for i in 0..PROP_COUNT {
        let angle = i as f32 / PROP_COUNT as f32 * std::f32::consts::TAU;
        let position = Vec3::new(
            PROP_RING_RADIUS * angle.cos(),
            0.0,
            PROP_RING_RADIUS * angle.sin(),
        );
        scene.add(SceneObject::Model(detailed_model(
            &format!("prop-{i}"),
            position,
            5_000,
        )));
    }
    (scene, avatar)
}

/// Camera circling the scene while drifting between near and far range so
/// LOD levels change over time.
fn orbit_camera(elapsed: Duration) -> Vec3 {
    let t = elapsed.as_secs_f32();
    let radius = 25.0 + 20.0 * (t * 0.2).sin();
    let angle = t * 0.3;
    Vec3::new(radius * angle.cos(), 3.0, radius * angle.sin())
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   ____                     ___       __         "#.bold().cyan());
    println!("{}", r#"  / __/______ ___  ___ ____/ _ \__ __/ /__ ___   "#.bold().cyan());
    println!("{}", r#" _\ \/ __/ -_) _ \/ -_)___/ ___/ // / (_-</ -_)  "#.bold().cyan());
    println!("{}", r#"/___/\__/\__/_//_/\__/   /_/   \_,_/_/___/\__/   "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "ScenePulse".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Sensor-driven scene telemetry and adaptive rendering");
    println!();
}
