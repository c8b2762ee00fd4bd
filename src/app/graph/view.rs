use eframe::egui::{Rect, Sense, TextureOptions, Ui, Vec2};
use log::{info, warn};

use super::super::layout::LayoutEngine;
use super::super::physics::TickOutcome;
use super::super::render::{FrameRequest, paint_callback};
use super::super::render_utils::draw_background;
use super::super::{LayoutPhase, RenderGraph, ViewModel, VisibilityFilters};

pub(in crate::app) fn world_bounds(graph: &RenderGraph, filters: VisibilityFilters) -> Option<Rect> {
    graph
        .nodes
        .iter()
        .filter(|render_node| filters.is_visible(&render_node.node))
        .filter(|render_node| render_node.pos.x.is_finite() && render_node.pos.y.is_finite())
        .map(|render_node| {
            Rect::from_center_size(
                render_node.pos.to_pos2(),
                Vec2::splat(render_node.radius * 2.0),
            )
        })
        .reduce(|bounds, node| bounds.union(node))
}

impl ViewModel {
    pub(in crate::app) fn draw_graph(&mut self, ui: &mut Ui) {
        let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());
        let painter = ui.painter_at(rect);
        draw_background(&painter, rect, self.camera.pan, self.camera.zoom);

        let layout_active = self.advance_layout(rect);

        self.handle_canvas_input(ui, rect, &response);

        if self.fit_requested {
            self.fit_requested = false;
            self.fit_view(rect);
        }

        let physics_active = self.step_physics();

        let ctx = ui.ctx().clone();
        let uploaded = self.icons.poll(|id, image| {
            ctx.load_texture(format!("mod-icon-{id}"), image, TextureOptions::LINEAR)
        });

        self.frame.build(
            &self.graph,
            &FrameRequest {
                camera: self.camera,
                rect,
                filters: self.filters,
                selected: self.selected,
                highlight_problems: self.highlight_problems,
                config: &self.config.render,
            },
        );
        if let Ok(mut scene) = self.gpu.lock() {
            scene.stage(&self.frame, rect, self.camera.pan, self.camera.zoom);
        }
        painter.add(paint_callback(rect, &self.gpu));

        self.draw_overlay(&painter, rect);

        if layout_active
            || physics_active
            || uploaded > 0
            || self.interaction.dragged_node().is_some()
        {
            ui.ctx().request_repaint();
        }
    }

    /// Drives the initial layout. Returns whether it still needs frames.
    fn advance_layout(&mut self, rect: Rect) -> bool {
        let finished = match &mut self.layout {
            LayoutPhase::Settled => return false,
            LayoutPhase::Pending => {
                match LayoutEngine::start(&mut self.graph, rect.size(), &self.config) {
                    Some(engine) => {
                        self.camera.pan = Vec2::ZERO;
                        self.layout = LayoutPhase::Running {
                            engine: Box::new(engine),
                            progress: 0,
                        };
                    }
                    None => warn!("canvas has no area yet, layout deferred"),
                }
                return true;
            }
            LayoutPhase::Running { engine, progress } => {
                engine.advance(&mut self.graph, |percent| *progress = percent)
            }
        };

        if !finished {
            return true;
        }

        self.layout = LayoutPhase::Settled;
        info!(
            "initial layout finished for {} ({} nodes)",
            self.instance_id,
            self.graph.nodes.len()
        );
        self.fit_view(rect);
        if self.live_physics {
            self.physics.start(&self.graph);
        }
        false
    }

    fn step_physics(&mut self) -> bool {
        let mounted = self.is_mounted();
        let dragged = self.interaction.dragged_node();
        match self
            .physics
            .tick(&mut self.graph, self.filters, dragged, mounted)
        {
            TickOutcome::Stepped {
                commit,
                settled,
                kinetic_energy,
            } => {
                if commit {
                    self.commit_view(kinetic_energy);
                }
                !settled
            }
            TickOutcome::Idle | TickOutcome::TornDown => false,
        }
    }

    fn commit_view(&mut self, kinetic_energy: f32) {
        self.committed.revision += 1;
        self.committed.bounds = world_bounds(&self.graph, self.filters);
        self.committed.kinetic_energy = kinetic_energy;
    }

    pub(in crate::app) fn fit_view(&mut self, rect: Rect) {
        let bounds = if self.physics.is_running() && self.physics.is_settled() {
            self.committed.bounds
        } else {
            None
        };
        let Some(bounds) = bounds.or_else(|| world_bounds(&self.graph, self.filters)) else {
            return;
        };
        let render = &self.config.render;
        self.camera
            .fit(rect, bounds, render.min_zoom, render.max_zoom);
    }
}
