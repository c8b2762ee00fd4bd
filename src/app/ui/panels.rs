use std::collections::VecDeque;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use eframe::egui::{self, Align, Context, Key, Layout};
use eframe::glow;
use log::info;

use crate::config::EngineConfig;
use crate::error::ViewError;
use crate::provider::DependencyGraph;

use super::super::graph::InteractionState;
use super::super::icons::{self, IconCache};
use super::super::physics::LivePhysicsEngine;
use super::super::render::{FrameBuffers, GpuScene};
use super::super::render_utils::Camera;
use super::super::{
    CommittedView, GraphSource, LayoutPhase, RemovalState, RenderGraph, ViewModel,
    VisibilityFilters,
};

impl ViewModel {
    pub(in crate::app) fn new(
        ctx: &Context,
        gl: Arc<glow::Context>,
        data: DependencyGraph,
        source: &GraphSource,
        config: Arc<EngineConfig>,
    ) -> Result<Self, ViewError> {
        let gpu = GpuScene::new(&gl)?;
        let mounted = Arc::new(AtomicBool::new(true));

        let repaint_ctx = ctx.clone();
        let icons = IconCache::new(
            config.icons.capacity,
            Arc::new(icons::fetch_icon),
            Arc::new(move || repaint_ctx.request_repaint()),
            Arc::clone(&mounted),
        );

        let graph = RenderGraph::from_data(&data);
        info!(
            "opened dependency view for {}: {} mods, {} edges, {} missing dependencies",
            source.instance_id,
            data.node_count(),
            data.edge_count(),
            data.missing_dependency_count()
        );

        Ok(Self {
            instance_id: source.instance_id.clone(),
            physics: LivePhysicsEngine::new(config.live.clone()),
            config,
            gl,
            data: Arc::new(data),
            graph,
            camera: Camera::default(),
            filters: VisibilityFilters::default(),
            highlight_problems: true,
            selected: None,
            search: String::new(),
            search_results: Vec::new(),
            layout: LayoutPhase::Pending,
            live_physics: true,
            fit_requested: false,
            interaction: InteractionState::default(),
            icons,
            gpu: Arc::new(Mutex::new(gpu)),
            frame: FrameBuffers::default(),
            committed: CommittedView::default(),
            removal: RemovalState::Idle,
            mounted,
            fps_current: 0.0,
            fps_samples: VecDeque::new(),
        })
    }

    pub(in crate::app) fn show(
        &mut self,
        ctx: &Context,
        reload_requested: &mut bool,
        is_reloading: bool,
    ) {
        self.update_fps_counter(ctx);
        self.handle_shortcuts(ctx);

        egui::TopBottomPanel::top("top_bar")
            .resizable(false)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.heading("modgraph");
                    ui.separator();
                    ui.label(format!("instance: {}", self.instance_id));
                    ui.label(format!("mods: {}", self.data.node_count()));
                    ui.label(format!("edges: {}", self.data.edge_count()));
                    if let Some(progress) = self.layout.progress() {
                        ui.add(
                            egui::ProgressBar::new(f32::from(progress) / 100.0)
                                .desired_width(140.0)
                                .text(format!("layout {progress}%")),
                        );
                    }

                    let physics_toggle = ui
                        .checkbox(&mut self.live_physics, "Live physics")
                        .on_hover_text("Space");
                    if physics_toggle.changed() {
                        self.apply_live_physics();
                    }
                    let reload_button =
                        ui.add_enabled(!is_reloading, egui::Button::new("Reload graph"));
                    if reload_button.clicked() {
                        *reload_requested = true;
                    }
                    if ui.button("Fit view").on_hover_text("F").clicked() {
                        self.fit_requested = true;
                    }

                    ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                        ui.label(self.visible_graph_text());
                        if let Some(fps_text) = self.fps_display_text() {
                            ui.label(fps_text);
                        }
                    });
                });
            });

        egui::SidePanel::left("controls")
            .resizable(true)
            .default_width(300.0)
            .show(ctx, |ui| self.draw_controls(ui));

        egui::SidePanel::right("details")
            .resizable(true)
            .default_width(340.0)
            .show(ctx, |ui| self.draw_details(ui));

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| self.draw_graph(ui));
    }

    fn handle_shortcuts(&mut self, ctx: &Context) {
        if ctx.wants_keyboard_input() {
            return;
        }

        let (escape, fit, physics, pin) = ctx.input(|input| {
            (
                input.key_pressed(Key::Escape),
                input.key_pressed(Key::F),
                input.key_pressed(Key::Space),
                input.key_pressed(Key::P),
            )
        });

        if escape {
            self.selected = None;
        }
        if fit {
            self.fit_requested = true;
        }
        if physics {
            self.live_physics = !self.live_physics;
            self.apply_live_physics();
        }
        if pin && let Some(index) = self.selected {
            self.toggle_pin(index);
        }
    }

    /// Starts or stops the live simulation to match the toggle. Before the initial
    /// layout settles the toggle only takes effect at hand-off.
    fn apply_live_physics(&mut self) {
        if !self.layout.is_settled() {
            return;
        }
        if self.live_physics {
            self.physics.start(&self.graph);
        } else {
            self.physics.stop();
        }
    }
}
