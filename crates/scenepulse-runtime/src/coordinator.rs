//! [`SceneCoordinator`] – the single owner of scene mutation.
//!
//! Each call to [`SceneCoordinator::tick`] runs, in order:
//!
//! 1. **Drain** – envelopes forwarded by the transport callbacks are pulled
//!    from the inbox without blocking and applied to [`SceneData`].
//! 2. **Link** – the transport's connection state is mapped to a
//!    [`LinkStatus`] ("reconnecting" is transient, "offline" persistent).
//! 3. **Animate** – gesture / voice effects are applied to the avatar.
//! 4. **Measure** – the [`PerformanceMonitor`] records this frame.
//! 5. **LOD** – managed objects switch level for the camera position.
//! 6. **Benchmark** – the orchestrator advances; any sample it takes sees
//!    the frame recorded in step 4.
//!
//! Transport callbacks never touch the scene directly: they only push into
//! the inbox, which keeps every mutation on the tick path.

use std::path::{Path, PathBuf};
use std::time::Instant;

use scenepulse_perf::{
    MonitorConfig, PerformanceMonitor, RendererStats, write_benchmark_report, write_perf_report,
};
use scenepulse_scene::{
    LodConfig, LodLevel, LodManager, MeshSimplifier, NodeId, ResourceOptimizer, Scene,
    SceneGraph, SceneObject, UniformDecimator,
};
use scenepulse_transport::{ConnectionState, TransportClient};
use scenepulse_types::{
    BenchmarkReport, Detection, Envelope, Event, EventKind, GestureKind, PerfSnapshot, PulseError,
    Vec3,
};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, instrument, warn};

use crate::benchmark::{
    BenchmarkConfig, BenchmarkOrchestrator, BenchmarkPhase, BenchmarkProgress, BenchmarkTarget,
};
use crate::interaction::{ModelCommand, interpret_gesture, interpret_voice};

/// Avatar spin rate while the peace gesture is held.
const SPIN_RADIANS_PER_SEC: f32 = 3.0;
/// Fraction of the remaining scale gap closed per 60 Hz frame.
const SCALE_EASING: f32 = 0.1;
/// Fraction of the remaining light intensity gap closed per 60 Hz frame.
const LIGHT_EASING: f32 = 0.05;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorConfig {
    pub monitor: MonitorConfig,
    pub lod: LodConfig,
    pub benchmark: BenchmarkConfig,
    /// Upper bound on models converted to LOD per optimisation pass.
    pub max_lod_conversions: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            monitor: MonitorConfig::default(),
            lod: LodConfig::default(),
            benchmark: BenchmarkConfig::default(),
            max_lod_conversions: 6,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// UI data bag
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkStatus {
    Connecting,
    Online,
    Reconnecting,
    Offline,
}

impl From<ConnectionState> for LinkStatus {
    fn from(state: ConnectionState) -> Self {
        match state {
            ConnectionState::Connecting => LinkStatus::Connecting,
            ConnectionState::Open => LinkStatus::Online,
            ConnectionState::Reconnecting => LinkStatus::Reconnecting,
            ConnectionState::Closed => LinkStatus::Offline,
        }
    }
}

/// Everything the UI layer reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneData {
    pub link: LinkStatus,
    pub detections: Vec<Detection>,
    pub gesture: Option<GestureKind>,
    pub last_voice: Option<String>,
    pub last_info: Option<String>,
    pub tint: u32,
    pub light_intensity: f32,
    pub target_light_intensity: f32,
    pub avatar_rotation: f32,
    pub avatar_scale: f32,
    pub target_scale: f32,
    pub spinning: bool,
    pub particle_bursts: u64,
    pub events_received: u64,
}

impl Default for SceneData {
    fn default() -> Self {
        Self {
            link: LinkStatus::Offline,
            detections: Vec::new(),
            gesture: None,
            last_voice: None,
            last_info: None,
            tint: 0xffffff,
            light_intensity: 1.0,
            target_light_intensity: 1.0,
            avatar_rotation: 0.0,
            avatar_scale: 1.0,
            target_scale: 1.0,
            spinning: false,
            particle_bursts: 0,
            events_received: 0,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Optimisation pass
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Default)]
pub struct OptimizationSummary {
    pub materials_changed: usize,
    pub maps_removed: usize,
    pub freed_bytes: u64,
    pub converted: Vec<NodeId>,
    pub skipped: Vec<(NodeId, PulseError)>,
}

/// The state the benchmark measures and the optimisation pass rewrites.
struct Workbench {
    scene: Scene,
    monitor: PerformanceMonitor,
    lod: LodManager,
    optimizer: ResourceOptimizer,
    simplifier: Box<dyn MeshSimplifier + Send>,
    max_lod_conversions: usize,
    avatar: Option<NodeId>,
    last_optimization: Option<OptimizationSummary>,
}

impl Workbench {
    /// Optimise every material, then convert up to `max_lod_conversions`
    /// plain models (the avatar excluded) to LOD. Failures are per object.
    #[instrument(skip(self), fields(max_conversions = self.max_lod_conversions))]
    fn optimize_scene(&mut self) -> OptimizationSummary {
        let mut summary = OptimizationSummary::default();

        for (_, object) in self.scene.objects_mut() {
            object.for_each_material_mut(|material| {
                let result = self.optimizer.optimize_material(material);
                if result.changed {
                    summary.materials_changed += 1;
                }
                summary.maps_removed += result.removed_maps;
                summary.freed_bytes += result.freed_bytes;
            });
        }

        let levels: Vec<LodLevel> = self.lod.config().default_levels.clone();
        let candidates: Vec<NodeId> = self
            .scene
            .top_level_models()
            .into_iter()
            .filter(|id| Some(*id) != self.avatar)
            .take(self.max_lod_conversions)
            .collect();

        for id in candidates {
            match self.lod.create_lod_from_model(
                &mut self.scene,
                self.simplifier.as_ref(),
                id,
                &levels,
            ) {
                Ok(lod_id) => summary.converted.push(lod_id),
                Err(e) => {
                    warn!(object = %id, error = %e, "lod conversion skipped");
                    summary.skipped.push((id, e));
                }
            }
        }

        info!(
            materials = summary.materials_changed,
            maps_removed = summary.maps_removed,
            freed_bytes = summary.freed_bytes,
            converted = summary.converted.len(),
            skipped = summary.skipped.len(),
            "optimisation pass finished"
        );
        summary
    }
}

impl BenchmarkTarget for Workbench {
    fn sample(&mut self) -> Option<PerfSnapshot> {
        self.monitor.snapshot(Some(self.scene.len()))
    }

    fn optimize(&mut self) {
        let summary = self.optimize_scene();
        self.last_optimization = Some(summary);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SceneCoordinator
// ─────────────────────────────────────────────────────────────────────────────

pub struct SceneCoordinator {
    bench: Workbench,
    orchestrator: BenchmarkOrchestrator,
    inbox_tx: mpsc::UnboundedSender<Envelope>,
    inbox_rx: mpsc::UnboundedReceiver<Envelope>,
    link_rx: Option<watch::Receiver<ConnectionState>>,
    data: SceneData,
    last_tick: Option<Instant>,
    last_report: Option<BenchmarkReport>,
}

impl SceneCoordinator {
    pub fn new(config: CoordinatorConfig, scene: Scene) -> Self {
        Self::with_monitor(
            PerformanceMonitor::new(config.monitor),
            config,
            scene,
        )
    }

    /// Use a pre-built monitor (e.g. one without a memory probe).
    pub fn with_monitor(monitor: PerformanceMonitor, config: CoordinatorConfig, scene: Scene) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        Self {
            bench: Workbench {
                scene,
                monitor,
                lod: LodManager::new(config.lod),
                optimizer: ResourceOptimizer::new(),
                simplifier: Box::new(UniformDecimator),
                max_lod_conversions: config.max_lod_conversions,
                avatar: None,
                last_optimization: None,
            },
            orchestrator: BenchmarkOrchestrator::new(config.benchmark),
            inbox_tx,
            inbox_rx,
            link_rx: None,
            data: SceneData::default(),
            last_tick: None,
            last_report: None,
        }
    }

    /// Forward every envelope kind from `client` into this coordinator and
    /// follow its connection state.
    pub fn attach_transport(&mut self, client: &mut TransportClient) {
        for kind in EventKind::ALL {
            let tx = self.inbox_tx.clone();
            client.on(kind, move |envelope| {
                let _ = tx.send(envelope.clone());
            });
        }
        let link_rx = client.handle().subscribe_state();
        self.data.link = LinkStatus::from(*link_rx.borrow());
        self.link_rx = Some(link_rx);
    }

    /// Sender for feeding envelopes without a transport (tests, replays).
    pub fn inbox(&self) -> mpsc::UnboundedSender<Envelope> {
        self.inbox_tx.clone()
    }

    /// Mark `id` as the interactive model driven by voice and gestures.
    pub fn set_avatar(&mut self, id: NodeId) {
        self.bench.avatar = Some(id);
    }

    pub fn data(&self) -> &SceneData {
        &self.data
    }

    pub fn scene(&self) -> &Scene {
        &self.bench.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.bench.scene
    }

    pub fn monitor(&self) -> &PerformanceMonitor {
        &self.bench.monitor
    }

    pub fn lod(&self) -> &LodManager {
        &self.bench.lod
    }

    pub fn benchmark_phase(&self) -> BenchmarkPhase {
        self.orchestrator.phase()
    }

    pub fn benchmark_config(&self) -> &BenchmarkConfig {
        self.orchestrator.config()
    }

    pub fn last_report(&self) -> Option<&BenchmarkReport> {
        self.last_report.as_ref()
    }

    pub fn last_optimization(&self) -> Option<&OptimizationSummary> {
        self.bench.last_optimization.as_ref()
    }

    // -------------------------------------------------------------------------
    // Frame tick
    // -------------------------------------------------------------------------

    /// Advance one frame. `renderer` carries the renderer's counters for the
    /// frame, if it reported any.
    pub fn tick(
        &mut self,
        now: Instant,
        camera: Vec3,
        renderer: Option<&RendererStats>,
    ) -> Vec<BenchmarkProgress> {
        self.drain_inbox();
        self.refresh_link();

        let dt = self
            .last_tick
            .map_or(0.0, |prev| now.saturating_duration_since(prev).as_secs_f32());
        self.last_tick = Some(now);
        self.animate(dt);

        self.bench.monitor.update_at(now, renderer);
        self.bench.lod.update(&mut self.bench.scene, camera);

        let progress = self.orchestrator.poll(now, &mut self.bench);
        for event in &progress {
            if let BenchmarkProgress::Completed(report) = event {
                self.last_report = Some(report.clone());
            }
        }
        progress
    }

    fn drain_inbox(&mut self) {
        while let Ok(envelope) = self.inbox_rx.try_recv() {
            self.apply(envelope);
        }
    }

    fn apply(&mut self, envelope: Envelope) {
        self.data.events_received += 1;
        debug!(id = %envelope.id, kind = %envelope.kind(), "applying envelope");
        match envelope.event {
            Event::Detection(detections) => {
                self.data.detections = detections;
            }
            Event::Gesture(gesture) => {
                let effect = interpret_gesture(gesture.kind);
                self.data.gesture = Some(gesture.kind);
                self.data.target_scale = effect.target_scale;
                self.data.spinning = effect.spinning;
                self.data.particle_bursts += 1;
            }
            Event::Voice(command) => {
                let effect = interpret_voice(&command);
                match effect.model {
                    Some(ModelCommand::Tint(color)) => self.data.tint = color,
                    Some(ModelCommand::Turn(radians)) => self.data.avatar_rotation += radians,
                    None => {}
                }
                if let Some(intensity) = effect.light_intensity {
                    self.data.target_light_intensity = intensity;
                }
                self.data.last_voice = Some(command.0);
            }
            Event::Info(text) => {
                info!(message = %text, "hub info");
                self.data.last_info = Some(text);
            }
        }
    }

    fn refresh_link(&mut self) {
        let Some(rx) = self.link_rx.as_mut() else {
            return;
        };
        if !rx.has_changed().unwrap_or(false) {
            return;
        }
        let status = LinkStatus::from(*rx.borrow_and_update());
        if status != self.data.link {
            match status {
                LinkStatus::Reconnecting => warn!("link lost; reconnecting"),
                LinkStatus::Offline => warn!("link offline"),
                _ => info!(?status, "link status"),
            }
            self.data.link = status;
        }
    }

    fn animate(&mut self, dt: f32) {
        let data = &mut self.data;
        if data.spinning {
            data.avatar_rotation += SPIN_RADIANS_PER_SEC * dt;
        }
        let frames = dt * 60.0;
        data.avatar_scale +=
            (data.target_scale - data.avatar_scale) * (SCALE_EASING * frames).min(1.0);
        data.light_intensity += (data.target_light_intensity - data.light_intensity)
            * (LIGHT_EASING * frames).min(1.0);

        let Some(id) = self.bench.avatar else {
            return;
        };
        let Some(SceneObject::Model(model)) = self.bench.scene.get_mut(id) else {
            return;
        };
        model.rotation_y = data.avatar_rotation;
        model.scale = data.avatar_scale;
        for mesh in &mut model.meshes {
            if mesh.material.color != data.tint {
                mesh.material.color = data.tint;
                mesh.material.mark_needs_update();
            }
        }
    }

    // -------------------------------------------------------------------------
    // UI actions
    // -------------------------------------------------------------------------

    pub fn start_benchmark(&mut self, now: Instant) -> Result<(), PulseError> {
        self.orchestrator.start(now, &self.bench.monitor)
    }

    pub fn cancel_benchmark(&mut self) -> bool {
        self.orchestrator.cancel()
    }

    /// Run the optimisation pass outside a benchmark.
    pub fn optimize_now(&mut self) -> OptimizationSummary {
        let summary = self.bench.optimize_scene();
        self.bench.last_optimization = Some(summary.clone());
        summary
    }

    pub fn export_perf_report(&self, dir: &Path) -> Result<PathBuf, PulseError> {
        let report = self.bench.monitor.perf_report(self.bench.scene.len());
        write_perf_report(dir, &report)
    }

    pub fn export_benchmark(&self, dir: &Path) -> Result<PathBuf, PulseError> {
        let report = self
            .last_report
            .as_ref()
            .ok_or_else(|| PulseError::Export("no benchmark has completed yet".to_string()))?;
        write_benchmark_report(dir, report)
    }
}
