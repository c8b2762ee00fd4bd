use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread;

use eframe::egui::{self, Context, Rect, TextureHandle, Vec2};
use eframe::glow;
use log::{error, info};

use crate::config::EngineConfig;
use crate::error::ViewError;
use crate::provider::{DependencyEdge, DependencyGraph, GraphDataProvider, ModNode, RemovalReport};

mod graph;
mod icons;
mod layout;
mod physics;
mod render;
mod render_utils;
mod ui;

use icons::IconCache;
use layout::LayoutEngine;
use physics::LivePhysicsEngine;
use render::{FrameBuffers, GpuScene};
use render_utils::Camera;

pub struct GraphSource {
    pub provider: Arc<dyn GraphDataProvider>,
    pub instance_id: String,
}

pub struct ModGraphApp {
    source: Arc<GraphSource>,
    config: Arc<EngineConfig>,
    gl: Option<Arc<glow::Context>>,
    state: AppState,
    reload_rx: Option<Receiver<Result<DependencyGraph, String>>>,
}

enum AppState {
    Loading {
        rx: Receiver<Result<DependencyGraph, String>>,
    },
    Ready(Box<ViewModel>),
    Error(ViewError),
}

/// Per-open view state. Dropping it releases GPU resources and marks the view unmounted.
struct ViewModel {
    instance_id: String,
    config: Arc<EngineConfig>,
    gl: Arc<glow::Context>,
    data: Arc<DependencyGraph>,
    graph: RenderGraph,
    camera: Camera,
    filters: VisibilityFilters,
    highlight_problems: bool,
    selected: Option<usize>,
    search: String,
    search_results: Vec<usize>,
    layout: LayoutPhase,
    physics: LivePhysicsEngine,
    live_physics: bool,
    fit_requested: bool,
    interaction: graph::InteractionState,
    icons: IconCache<TextureHandle>,
    gpu: Arc<Mutex<GpuScene>>,
    frame: FrameBuffers,
    committed: CommittedView,
    removal: RemovalState,
    mounted: Arc<AtomicBool>,
    fps_current: f32,
    fps_samples: VecDeque<f32>,
}

enum LayoutPhase {
    /// Waiting for a canvas with a non-zero size.
    Pending,
    Running { engine: Box<LayoutEngine>, progress: u8 },
    Settled,
}

impl LayoutPhase {
    fn is_settled(&self) -> bool {
        matches!(self, Self::Settled)
    }

    fn progress(&self) -> Option<u8> {
        match self {
            Self::Pending => Some(0),
            Self::Running { progress, .. } => Some(*progress),
            Self::Settled => None,
        }
    }
}

enum Transition {
    Open(DependencyGraph),
    Enter(AppState),
}

enum RemovalState {
    Idle,
    Running {
        node_id: String,
        rx: Receiver<Result<RemovalReport, String>>,
    },
    Done {
        node_id: String,
        result: Result<RemovalReport, String>,
    },
}

/// Snapshot refreshed whenever the live simulation commits.
#[derive(Clone, Copy, Debug, Default)]
struct CommittedView {
    revision: u64,
    bounds: Option<Rect>,
    kinetic_energy: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct VisibilityFilters {
    show_libraries: bool,
    show_disabled: bool,
    show_orphans: bool,
}

impl Default for VisibilityFilters {
    fn default() -> Self {
        Self {
            show_libraries: true,
            show_disabled: true,
            show_orphans: true,
        }
    }
}

impl VisibilityFilters {
    fn is_visible(&self, node: &ModNode) -> bool {
        (self.show_libraries || !node.is_library)
            && (self.show_disabled || node.enabled)
            && (self.show_orphans || !node.is_orphan())
    }

    fn revealing(mut self, node: &ModNode) -> Self {
        if node.is_library {
            self.show_libraries = true;
        }
        if !node.enabled {
            self.show_disabled = true;
        }
        if node.is_orphan() {
            self.show_orphans = true;
        }
        self
    }
}

/// Arena of render nodes indexed by position; edges refer to nodes by index.
struct RenderGraph {
    nodes: Vec<RenderNode>,
    edges: Vec<RenderEdge>,
    index_by_id: HashMap<String, usize>,
    dependencies: Vec<Vec<usize>>,
    dependents: Vec<Vec<usize>>,
}

struct RenderNode {
    node: ModNode,
    pos: Vec2,
    velocity: Vec2,
    radius: f32,
    pinned: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EdgeEnd {
    Node(usize),
    Missing,
}

impl EdgeEnd {
    fn index(self) -> Option<usize> {
        match self {
            Self::Node(index) => Some(index),
            Self::Missing => None,
        }
    }
}

struct RenderEdge {
    from: EdgeEnd,
    to: EdgeEnd,
    data: DependencyEdge,
}

impl ModGraphApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        source: GraphSource,
        config: EngineConfig,
    ) -> Self {
        let source = Arc::new(source);
        let gl = cc.gl.clone();
        let state = Self::start_load(gl.as_deref(), &source);
        Self {
            source,
            config: Arc::new(config),
            gl,
            state,
            reload_rx: None,
        }
    }

    fn spawn_load(source: &Arc<GraphSource>) -> Receiver<Result<DependencyGraph, String>> {
        let (tx, rx) = mpsc::channel();
        let source = Arc::clone(source);

        thread::spawn(move || {
            let result = source
                .provider
                .get_graph(&source.instance_id)
                .map_err(|error| format!("{error:#}"));
            let _ = tx.send(result);
        });

        rx
    }

    fn start_load(gl: Option<&glow::Context>, source: &Arc<GraphSource>) -> AppState {
        if let Err(error) = render::check_backend(gl) {
            error!("{error}");
            return AppState::Error(error);
        }

        info!("loading dependency graph for instance {}", source.instance_id);
        AppState::Loading {
            rx: Self::spawn_load(source),
        }
    }

    fn open_view(&self, ctx: &Context, graph: DependencyGraph) -> AppState {
        let Some(gl) = self.gl.clone() else {
            return AppState::Error(ViewError::UnsupportedBackend(
                "no OpenGL context is available".to_owned(),
            ));
        };

        match ViewModel::new(
            ctx,
            gl,
            graph,
            &self.source,
            Arc::clone(&self.config),
        ) {
            Ok(model) => AppState::Ready(Box::new(model)),
            Err(error) => {
                error!("{error}");
                AppState::Error(error)
            }
        }
    }
}

impl eframe::App for ModGraphApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        let mut transition = None;

        match &mut self.state {
            AppState::Loading { rx } => {
                match rx.try_recv() {
                    Ok(Ok(graph)) => transition = Some(Transition::Open(graph)),
                    Ok(Err(error)) => {
                        transition = Some(Transition::Enter(AppState::Error(ViewError::GraphFetch(error))));
                    }
                    Err(TryRecvError::Empty) => ctx.request_repaint(),
                    Err(TryRecvError::Disconnected) => {
                        transition = Some(Transition::Enter(AppState::Error(ViewError::GraphFetch(
                            "background load worker disconnected".to_owned(),
                        ))));
                    }
                }

                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.vertical_centered(|ui| {
                        ui.add_space(120.0);
                        ui.heading("Loading dependency graph...");
                        ui.add_space(8.0);
                        ui.spinner();
                    });
                });
            }
            AppState::Error(error) => {
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.heading(error.title());
                    ui.add_space(6.0);
                    ui.label(error.to_string());
                    ui.add_space(10.0);
                    if ui.button("Retry").clicked() {
                        transition = Some(Transition::Enter(Self::start_load(
                            self.gl.as_deref(),
                            &self.source,
                        )));
                    }
                });
            }
            AppState::Ready(model) => {
                let mut reload_requested = false;
                let is_reloading = self.reload_rx.is_some();
                model.show(ctx, &mut reload_requested, is_reloading);

                if reload_requested && self.reload_rx.is_none() {
                    self.reload_rx = Some(Self::spawn_load(&self.source));
                }

                if let Some(rx) = self.reload_rx.take() {
                    match rx.try_recv() {
                        Ok(Ok(graph)) => transition = Some(Transition::Open(graph)),
                        Ok(Err(error)) => {
                            transition =
                                Some(Transition::Enter(AppState::Error(ViewError::GraphFetch(error))));
                        }
                        Err(TryRecvError::Empty) => {
                            self.reload_rx = Some(rx);
                            ctx.request_repaint();
                        }
                        Err(TryRecvError::Disconnected) => {
                            transition = Some(Transition::Enter(AppState::Error(ViewError::GraphFetch(
                                "background load worker disconnected".to_owned(),
                            ))));
                        }
                    }
                }
            }
        }

        if let Some(next) = transition {
            self.reload_rx = None;
            let next_state = match next {
                Transition::Open(graph) => self.open_view(ctx, graph),
                Transition::Enter(state) => state,
            };
            self.state = next_state;
        }
    }

    fn on_exit(&mut self, _gl: Option<&glow::Context>) {
        if let AppState::Ready(model) = &mut self.state {
            model.teardown();
        }
    }
}

impl Drop for ViewModel {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl ViewModel {
    fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::Acquire)
    }

    fn teardown(&mut self) {
        if !self.mounted.swap(false, Ordering::AcqRel) {
            return;
        }
        self.physics.stop();
        if let Ok(mut scene) = self.gpu.lock() {
            scene.release(&self.gl);
        }
        info!("closed dependency view for {}", self.instance_id);
    }
}
