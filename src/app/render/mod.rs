mod gpu;
mod overlay;

use std::collections::HashSet;

use bytemuck::{Pod, Zeroable};
use eframe::egui::{Color32, Rect, Vec2};

use crate::config::RenderConfig;
use crate::util::stable_pair;

use super::render_utils::{
    Camera, MISSING_EDGE_COLOR, blend_color, color_to_rgba, edge_color, node_color,
    segment_visible, unit_direction,
};
use super::{EdgeEnd, RenderGraph, VisibilityFilters};

pub(in crate::app) use gpu::{GpuScene, check_backend, paint_callback};

/// One instanced circle. Positions and radii are in world units.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub(in crate::app) struct NodeInstance {
    pub(in crate::app) center: [f32; 2],
    pub(in crate::app) radius: f32,
    pub(in crate::app) selected: f32,
    pub(in crate::app) color: [f32; 4],
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub(in crate::app) struct EdgeVertex {
    pub(in crate::app) position: [f32; 2],
    pub(in crate::app) color: [f32; 4],
}

pub(in crate::app) struct FrameRequest<'a> {
    pub(in crate::app) camera: Camera,
    pub(in crate::app) rect: Rect,
    pub(in crate::app) filters: VisibilityFilters,
    pub(in crate::app) selected: Option<usize>,
    pub(in crate::app) highlight_problems: bool,
    pub(in crate::app) config: &'a RenderConfig,
}

#[derive(Default)]
pub(in crate::app) struct FrameBuffers {
    pub(in crate::app) nodes: Vec<NodeInstance>,
    pub(in crate::app) edges: Vec<EdgeVertex>,
    /// Node indices in instance order.
    pub(in crate::app) drawn: Vec<usize>,
    /// Filter visibility per node, independent of culling.
    pub(in crate::app) visible: Vec<bool>,
    pub(in crate::app) problem_nodes: HashSet<usize>,
    pub(in crate::app) edge_stride: usize,
}

impl FrameBuffers {
    pub(in crate::app) fn drawn_edge_count(&self) -> usize {
        self.edges.len() / 2
    }

    pub(in crate::app) fn build(&mut self, graph: &RenderGraph, request: &FrameRequest<'_>) {
        let config = request.config;
        let zoom = request.camera.zoom.max(f32::EPSILON);
        let view = request.camera.world_view(request.rect, config.cull_margin);

        self.nodes.clear();
        self.edges.clear();
        self.drawn.clear();
        self.problem_nodes.clear();
        self.visible.clear();
        self.visible.extend(
            graph
                .nodes
                .iter()
                .map(|render_node| request.filters.is_visible(&render_node.node)),
        );

        for edge in graph.edges.iter().filter(|edge| edge.data.is_problem) {
            self.problem_nodes.extend(edge.from.index());
            self.problem_nodes.extend(edge.to.index());
        }

        for (index, render_node) in graph.nodes.iter().enumerate() {
            if !self.visible[index] {
                continue;
            }
            let world_rect = Rect::from_center_size(
                render_node.pos.to_pos2(),
                Vec2::splat(render_node.radius * 2.0),
            );
            if !view.intersects(world_rect) {
                continue;
            }

            self.drawn.push(index);
            self.nodes.push(NodeInstance {
                center: render_node.pos.into(),
                radius: render_node.radius,
                selected: if request.selected == Some(index) {
                    1.0
                } else {
                    0.0
                },
                color: color_to_rgba(node_color(&render_node.node)),
            });
        }

        self.edge_stride = if zoom < config.edge_sample_zoom && config.edge_budget > 0 {
            graph.edges.len().div_ceil(config.edge_budget).max(1)
        } else {
            1
        };

        let stub_length = config.stub_length / zoom;
        for (edge_index, edge) in graph.edges.iter().enumerate() {
            if edge_index % self.edge_stride != 0 {
                continue;
            }
            let Some(from) = edge.from.index() else {
                continue;
            };
            if !self.visible[from] {
                continue;
            }

            let start = graph.nodes[from].pos;
            let (end, color) = match edge.to {
                EdgeEnd::Node(to) if self.visible[to] => (
                    graph.nodes[to].pos,
                    edge_color(&edge.data, request.highlight_problems),
                ),
                EdgeEnd::Node(to) => {
                    let toward = graph.nodes[to].pos - start;
                    let direction = if toward.length_sq() > 0.0001 {
                        toward.normalized()
                    } else {
                        unit_direction(stable_pair(&edge.data.to), edge_index)
                    };
                    let color = blend_color(
                        edge_color(&edge.data, request.highlight_problems),
                        Color32::TRANSPARENT,
                        0.35,
                    );
                    (start + direction * stub_length, color)
                }
                EdgeEnd::Missing => (
                    start + unit_direction(stable_pair(&edge.data.to), edge_index) * stub_length,
                    if edge.data.dependency_type.is_attractive() {
                        MISSING_EDGE_COLOR
                    } else {
                        edge_color(&edge.data, request.highlight_problems)
                    },
                ),
            };

            if !segment_visible(view, start.to_pos2(), end.to_pos2()) {
                continue;
            }

            let color = color_to_rgba(color);
            self.edges.push(EdgeVertex {
                position: start.into(),
                color,
            });
            self.edges.push(EdgeVertex {
                position: end.into(),
                color,
            });
        }
    }
}
