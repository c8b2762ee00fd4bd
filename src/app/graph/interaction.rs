use eframe::egui::{self, Pos2, Rect, Response, Ui, Vec2};
use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;
use log::debug;

use super::super::render_utils::Camera;
use super::super::{RenderGraph, ViewModel, VisibilityFilters};

const MIN_HIT_RADIUS: f32 = 1.5;
const SEARCH_LIMIT: usize = 50;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(in crate::app) enum Gesture {
    #[default]
    Idle,
    DraggingNode(usize),
    Panning,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(in crate::app) struct Release {
    pub(in crate::app) click: bool,
    /// A node was moved; cached node sets must be rebuilt.
    pub(in crate::app) moved_node: bool,
}

#[derive(Debug, Default)]
pub(in crate::app) struct InteractionState {
    gesture: Gesture,
    was_dragged: bool,
}

impl InteractionState {
    pub(in crate::app) fn gesture(&self) -> Gesture {
        self.gesture
    }

    pub(in crate::app) fn dragged_node(&self) -> Option<usize> {
        match self.gesture {
            Gesture::DraggingNode(index) => Some(index),
            _ => None,
        }
    }

    pub(in crate::app) fn pointer_down(&mut self, hit: Option<usize>) -> Gesture {
        self.was_dragged = false;
        self.gesture = match hit {
            Some(index) => Gesture::DraggingNode(index),
            None => Gesture::Panning,
        };
        self.gesture
    }

    pub(in crate::app) fn pointer_move(
        &mut self,
        delta: Vec2,
        graph: &mut RenderGraph,
        camera: &mut Camera,
    ) {
        if delta == Vec2::ZERO {
            return;
        }
        match self.gesture {
            Gesture::Idle => return,
            Gesture::DraggingNode(index) => {
                if let Some(render_node) = graph.nodes.get_mut(index) {
                    render_node.pos += delta / camera.zoom;
                    render_node.velocity = Vec2::ZERO;
                }
            }
            Gesture::Panning => camera.pan += delta,
        }
        self.was_dragged = true;
    }

    pub(in crate::app) fn pointer_up(&mut self) -> Release {
        let release = Release {
            click: self.gesture != Gesture::Idle && !self.was_dragged,
            moved_node: matches!(self.gesture, Gesture::DraggingNode(_)) && self.was_dragged,
        };
        self.gesture = Gesture::Idle;
        self.was_dragged = false;
        release
    }
}

pub(in crate::app) fn hit_test(
    graph: &RenderGraph,
    filters: VisibilityFilters,
    world: Vec2,
    zoom: f32,
) -> Option<usize> {
    let min_radius = MIN_HIT_RADIUS / zoom.max(f32::EPSILON);
    graph
        .nodes
        .iter()
        .enumerate()
        .rev()
        .find(|(_, render_node)| {
            let radius = render_node.radius.max(min_radius);
            filters.is_visible(&render_node.node)
                && (world - render_node.pos).length_sq() <= radius * radius
        })
        .map(|(index, _)| index)
}

pub(in crate::app) fn toggle_pin(graph: &mut RenderGraph, index: usize) -> Option<bool> {
    let render_node = graph.nodes.get_mut(index)?;
    render_node.pinned = !render_node.pinned;
    render_node.velocity = Vec2::ZERO;
    Some(render_node.pinned)
}

pub(in crate::app) fn search_nodes(graph: &RenderGraph, query: &str) -> Vec<usize> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return Vec::new();
    }

    let matcher = SkimMatcherV2::default();
    let mut matches = graph
        .nodes
        .iter()
        .enumerate()
        .filter_map(|(index, render_node)| {
            let name = render_node.node.name.to_lowercase();
            let id = render_node.node.id.to_lowercase();
            if !name.contains(&query) && !id.contains(&query) {
                return None;
            }
            let score = matcher
                .fuzzy_match(&name, &query)
                .max(matcher.fuzzy_match(&id, &query))
                .unwrap_or(0);
            Some((index, score, name))
        })
        .collect::<Vec<_>>();

    matches.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.2.cmp(&b.2)));
    matches
        .into_iter()
        .take(SEARCH_LIMIT)
        .map(|(index, _, _)| index)
        .collect()
}

impl ViewModel {
    pub(in crate::app) fn handle_canvas_input(&mut self, ui: &Ui, rect: Rect, response: &Response) {
        self.handle_graph_zoom(ui, rect, response);
        self.handle_graph_pan(response);

        let (pressed, released, delta, pointer) = ui.input(|input| {
            (
                input.pointer.primary_pressed(),
                input.pointer.primary_released(),
                input.pointer.delta(),
                input.pointer.interact_pos(),
            )
        });

        if pressed
            && let Some(pointer) = pointer
            && rect.contains(pointer)
        {
            let hit = self.node_at(rect, pointer);
            if let Gesture::DraggingNode(index) = self.interaction.pointer_down(hit) {
                debug!("drag started on {}", self.graph.nodes[index].node.id);
                self.physics.wake();
            }
        }

        self.interaction
            .pointer_move(delta, &mut self.graph, &mut self.camera);

        if released && self.interaction.gesture() != Gesture::Idle {
            let release = self.interaction.pointer_up();
            if release.moved_node {
                self.physics.invalidate_active_nodes();
            }
            if release.click {
                self.selected = pointer.and_then(|pointer| self.node_at(rect, pointer));
            }
        }

        if response.double_clicked()
            && let Some(pointer) = pointer
            && let Some(index) = self.node_at(rect, pointer)
        {
            self.toggle_pin(index);
        }

        if self.interaction.dragged_node().is_some() {
            ui.ctx().set_cursor_icon(egui::CursorIcon::Grabbing);
        } else if let Some(pointer) = ui.input(|input| input.pointer.hover_pos())
            && rect.contains(pointer)
            && self.node_at(rect, pointer).is_some()
        {
            ui.ctx().set_cursor_icon(egui::CursorIcon::PointingHand);
        }
    }

    fn handle_graph_zoom(&mut self, ui: &Ui, rect: Rect, response: &Response) {
        if !response.hovered() {
            return;
        }

        let scroll = ui.input(|input| input.raw_scroll_delta.y);
        if scroll.abs() <= f32::EPSILON {
            return;
        }

        let pointer = ui
            .input(|input| input.pointer.hover_pos())
            .unwrap_or_else(|| rect.center());
        let factor = (1.0 + (scroll * 0.0018)).clamp(0.85, 1.15);
        let render = &self.config.render;
        self.camera
            .zoom_at(rect, pointer, factor, render.min_zoom, render.max_zoom);
    }

    fn handle_graph_pan(&mut self, response: &Response) {
        if response.dragged_by(egui::PointerButton::Secondary)
            || response.dragged_by(egui::PointerButton::Middle)
        {
            self.camera.pan += response.drag_delta();
        }
    }

    fn node_at(&self, rect: Rect, pointer: Pos2) -> Option<usize> {
        let world = self.camera.screen_to_world(rect, pointer);
        hit_test(&self.graph, self.filters, world, self.camera.zoom)
    }

    pub(in crate::app) fn toggle_pin(&mut self, index: usize) {
        if let Some(pinned) = toggle_pin(&mut self.graph, index) {
            debug!(
                "{} {}",
                self.graph.nodes[index].node.id,
                if pinned { "pinned" } else { "unpinned" }
            );
            self.physics.invalidate_active_nodes();
            self.physics.wake();
        }
    }

    pub(in crate::app) fn set_filters(&mut self, filters: VisibilityFilters) {
        if self.filters == filters {
            return;
        }
        self.filters = filters;
        self.physics.invalidate_active_nodes();
        self.physics.wake();
    }

    pub(in crate::app) fn refresh_search(&mut self) {
        self.search_results = search_nodes(&self.graph, &self.search);
    }

    pub(in crate::app) fn focus_node(&mut self, index: usize) {
        let Some(render_node) = self.graph.nodes.get(index) else {
            return;
        };
        let filters = self.filters.revealing(&render_node.node);
        let target = render_node.pos;

        self.set_filters(filters);
        self.camera.zoom = self.camera.zoom.max(self.config.render.focus_zoom);
        self.camera.center_on(target);
        self.selected = Some(index);
    }
}

#[cfg(test)]
mod tests {
    use eframe::egui::vec2;

    use super::*;
    use crate::provider::fixtures::{chain, node};

    fn placed_chain() -> RenderGraph {
        let mut data = chain();
        data.nodes.push(node("loner", 0, 0));
        let mut graph = RenderGraph::from_data(&data);
        for (index, render_node) in graph.nodes.iter_mut().enumerate() {
            render_node.pos = vec2(index as f32 * 100.0, 0.0);
        }
        graph
    }

    #[test]
    fn dragging_at_zoom_two_moves_half_the_delta() {
        let mut graph = placed_chain();
        let mut camera = Camera {
            pan: Vec2::ZERO,
            zoom: 2.0,
        };
        let mut state = InteractionState::default();
        let start = graph.nodes[0].pos;

        assert_eq!(state.pointer_down(Some(0)), Gesture::DraggingNode(0));
        state.pointer_move(vec2(30.0, -10.0), &mut graph, &mut camera);
        assert_eq!(state.dragged_node(), Some(0));
        assert_eq!(graph.nodes[0].pos - start, vec2(15.0, -5.0));
        assert_eq!(camera.pan, Vec2::ZERO);

        let release = state.pointer_up();
        assert!(release.moved_node);
        assert!(!release.click);
        assert_eq!(state.dragged_node(), None);
    }

    #[test]
    fn click_without_movement_selects() {
        let mut graph = placed_chain();
        let mut camera = Camera::default();
        let mut state = InteractionState::default();

        state.pointer_down(Some(1));
        state.pointer_move(Vec2::ZERO, &mut graph, &mut camera);
        let release = state.pointer_up();
        assert!(release.click);
        assert!(!release.moved_node);
    }

    #[test]
    fn empty_space_pans_the_camera() {
        let mut graph = placed_chain();
        let mut camera = Camera::default();
        let mut state = InteractionState::default();
        let before = graph.nodes.iter().map(|node| node.pos).collect::<Vec<_>>();

        assert_eq!(state.pointer_down(None), Gesture::Panning);
        state.pointer_move(vec2(12.0, 8.0), &mut graph, &mut camera);
        assert_eq!(camera.pan, vec2(12.0, 8.0));
        let after = graph.nodes.iter().map(|node| node.pos).collect::<Vec<_>>();
        assert_eq!(before, after);

        let release = state.pointer_up();
        assert!(!release.click);
        assert!(!release.moved_node);
    }

    #[test]
    fn hit_test_prefers_topmost_and_respects_filters() {
        let mut graph = placed_chain();
        graph.nodes[1].pos = graph.nodes[0].pos;
        assert_eq!(
            hit_test(&graph, VisibilityFilters::default(), Vec2::ZERO, 1.0),
            Some(1)
        );
        assert_eq!(
            hit_test(&graph, VisibilityFilters::default(), vec2(50.0, 0.0), 1.0),
            None
        );

        let loner = graph.index_of("loner").expect("loner present");
        let loner_pos = graph.nodes[loner].pos;
        let hide_orphans = VisibilityFilters {
            show_orphans: false,
            ..VisibilityFilters::default()
        };
        assert_eq!(hit_test(&graph, hide_orphans, loner_pos, 1.0), None);
        assert_eq!(
            hit_test(&graph, VisibilityFilters::default(), loner_pos, 1.0),
            Some(loner)
        );
    }

    #[test]
    fn pin_toggle_flips_and_stops_motion() {
        let mut graph = placed_chain();
        graph.nodes[2].velocity = vec2(3.0, 4.0);
        assert_eq!(toggle_pin(&mut graph, 2), Some(true));
        assert_eq!(graph.nodes[2].velocity, Vec2::ZERO);
        assert_eq!(toggle_pin(&mut graph, 2), Some(false));
        assert_eq!(toggle_pin(&mut graph, 99), None);
    }

    #[test]
    fn search_is_case_insensitive_over_name_and_id() {
        let mut data = chain();
        data.nodes.push(node("sodium-extra", 0, 0));
        data.nodes[3].name = "Sodium Extra".to_owned();
        data.nodes.push(node("sodium", 0, 0));
        data.nodes[4].name = "Sodium".to_owned();
        let graph = RenderGraph::from_data(&data);

        let results = search_nodes(&graph, "SODIUM");
        assert_eq!(results.len(), 2);
        assert!(results.contains(&3) && results.contains(&4));
        assert_eq!(search_nodes(&graph, "b"), vec![1]);
        assert!(search_nodes(&graph, "   ").is_empty());
        assert!(search_nodes(&graph, "lithium").is_empty());
    }
}
