use log::{debug, info};

use crate::config::LiveConfig;

use super::super::{RenderGraph, RenderNode, VisibilityFilters};
use super::{Adjacency, ForceSimulation, IterationBudget, StepContext};

/// Indices of nodes taking part in the live simulation under the filters in effect when the
/// set was last built. Callers must `invalidate` after changing filters, pins, or node identity.
#[derive(Default)]
pub(in crate::app) struct ActiveNodeCache {
    active: Option<Vec<usize>>,
}

impl ActiveNodeCache {
    pub(in crate::app) fn invalidate(&mut self) {
        self.active = None;
    }

    pub(in crate::app) fn get(
        &mut self,
        nodes: &[RenderNode],
        filters: VisibilityFilters,
    ) -> &[usize] {
        self.active.get_or_insert_with(|| {
            nodes
                .iter()
                .enumerate()
                .filter(|(_, render_node)| filters.is_visible(&render_node.node))
                .map(|(index, _)| index)
                .collect()
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(in crate::app) enum EngineState {
    Stopped,
    Running,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(in crate::app) enum TickOutcome {
    /// Not running; nothing was simulated and no further tick should be scheduled.
    Idle,
    /// The view is gone; the engine stopped itself.
    TornDown,
    Stepped {
        commit: bool,
        settled: bool,
        kinetic_energy: f32,
    },
}

pub(in crate::app) struct LivePhysicsEngine {
    state: EngineState,
    config: LiveConfig,
    simulation: ForceSimulation,
    adjacency: Option<Adjacency>,
    active: ActiveNodeCache,
    stable_frames: u32,
    frames_since_commit: u32,
}

impl LivePhysicsEngine {
    pub(in crate::app) fn new(config: LiveConfig) -> Self {
        Self {
            state: EngineState::Stopped,
            simulation: ForceSimulation::new(IterationBudget::Unbounded, config.forces),
            config,
            adjacency: None,
            active: ActiveNodeCache::default(),
            stable_frames: 0,
            frames_since_commit: 0,
        }
    }

    pub(in crate::app) fn state(&self) -> EngineState {
        self.state
    }

    pub(in crate::app) fn is_running(&self) -> bool {
        self.state == EngineState::Running
    }

    pub(in crate::app) fn start(&mut self, graph: &RenderGraph) {
        if self.is_running() {
            return;
        }
        let adjacency = Adjacency::build(graph);
        info!(
            "live physics started: {} nodes, {} springs",
            graph.nodes.len(),
            adjacency.spring_count()
        );
        self.adjacency = Some(adjacency);
        self.active.invalidate();
        self.stable_frames = 0;
        self.frames_since_commit = 0;
        self.state = EngineState::Running;
    }

    pub(in crate::app) fn stop(&mut self) {
        if !self.is_running() {
            return;
        }
        info!("live physics stopped");
        self.state = EngineState::Stopped;
        self.adjacency = None;
        self.active.invalidate();
    }

    /// Restarts stability detection, e.g. when a drag begins.
    pub(in crate::app) fn wake(&mut self) {
        self.stable_frames = 0;
    }

    pub(in crate::app) fn invalidate_active_nodes(&mut self) {
        self.active.invalidate();
    }

    #[cfg(test)]
    pub(in crate::app) fn active_nodes(
        &mut self,
        nodes: &[RenderNode],
        filters: VisibilityFilters,
    ) -> &[usize] {
        self.active.get(nodes, filters)
    }

    pub(in crate::app) fn is_settled(&self) -> bool {
        self.stable_frames >= self.config.stability_window
    }

    pub(in crate::app) fn tick(
        &mut self,
        graph: &mut RenderGraph,
        filters: VisibilityFilters,
        dragged: Option<usize>,
        mounted: bool,
    ) -> TickOutcome {
        if !mounted {
            self.stop();
            return TickOutcome::TornDown;
        }
        if !self.is_running() {
            return TickOutcome::Idle;
        }
        let Some(adjacency) = self.adjacency.as_ref() else {
            return TickOutcome::Idle;
        };

        let members = self.active.get(&graph.nodes, filters);
        let context = StepContext {
            members,
            dragged,
            drag_attraction: self.config.drag_attraction_scale,
        };
        let report = self.simulation.tick(&mut graph.nodes, adjacency, &context);

        if report.kinetic_energy < self.config.stability_energy {
            self.stable_frames = self.stable_frames.saturating_add(1);
        } else {
            self.stable_frames = 0;
        }
        if dragged.is_some() {
            self.stable_frames = 0;
        }

        let settled = self.is_settled();
        self.frames_since_commit = self.frames_since_commit.saturating_add(1);
        let commit = !settled && self.frames_since_commit >= self.config.commit_interval.max(1);
        if commit {
            self.frames_since_commit = 0;
            debug!("physics commit, kinetic energy {:.3}", report.kinetic_energy);
        }

        TickOutcome::Stepped {
            commit,
            settled,
            kinetic_energy: report.kinetic_energy,
        }
    }
}

#[cfg(test)]
mod tests {
    use eframe::egui::vec2;

    use super::super::test_support::star;
    use super::*;

    fn ready_graph() -> RenderGraph {
        let mut graph = RenderGraph::from_data(&star(6));
        for (index, node) in graph.nodes.iter_mut().enumerate() {
            let angle = index as f32 * 0.9;
            node.pos = vec2(angle.cos(), angle.sin()) * (40.0 + index as f32 * 25.0);
        }
        graph
    }

    fn quiet_config() -> LiveConfig {
        LiveConfig {
            stability_energy: f32::INFINITY,
            stability_window: 3,
            commit_interval: 2,
            ..LiveConfig::default()
        }
    }

    #[test]
    fn state_machine_follows_start_and_stop() {
        let mut graph = ready_graph();
        let mut engine = LivePhysicsEngine::new(LiveConfig::default());
        assert_eq!(engine.state(), EngineState::Stopped);
        assert_eq!(
            engine.tick(&mut graph, VisibilityFilters::default(), None, true),
            TickOutcome::Idle
        );

        engine.start(&graph);
        assert!(engine.is_running());
        assert!(matches!(
            engine.tick(&mut graph, VisibilityFilters::default(), None, true),
            TickOutcome::Stepped { .. }
        ));

        engine.stop();
        assert_eq!(engine.state(), EngineState::Stopped);
    }

    #[test]
    fn unmounted_view_tears_the_engine_down() {
        let mut graph = ready_graph();
        let mut engine = LivePhysicsEngine::new(LiveConfig::default());
        engine.start(&graph);
        let before = graph.nodes.iter().map(|node| node.pos).collect::<Vec<_>>();

        let outcome = engine.tick(&mut graph, VisibilityFilters::default(), None, false);
        assert_eq!(outcome, TickOutcome::TornDown);
        assert!(!engine.is_running());
        let after = graph.nodes.iter().map(|node| node.pos).collect::<Vec<_>>();
        assert_eq!(before, after);
    }

    #[test]
    fn active_set_is_stable_until_invalidated() {
        let graph = ready_graph();
        let mut engine = LivePhysicsEngine::new(LiveConfig::default());
        engine.start(&graph);
        let hide_orphans = VisibilityFilters {
            show_orphans: false,
            ..VisibilityFilters::default()
        };

        engine.invalidate_active_nodes();
        let first = engine.active_nodes(&graph.nodes, hide_orphans).to_vec();
        let second = engine.active_nodes(&graph.nodes, hide_orphans).to_vec();
        assert_eq!(first, second);
        assert_eq!(first.len(), graph.nodes.len() - 2);

        // Stale until the caller invalidates.
        let stale = engine
            .active_nodes(&graph.nodes, VisibilityFilters::default())
            .to_vec();
        assert_eq!(stale, first);
        engine.invalidate_active_nodes();
        let refreshed = engine
            .active_nodes(&graph.nodes, VisibilityFilters::default())
            .to_vec();
        assert_eq!(refreshed.len(), graph.nodes.len());
    }

    #[test]
    fn hidden_nodes_are_not_simulated() {
        let mut graph = ready_graph();
        let orphan = graph.index_of("orphan-a").expect("orphan present");
        let before = graph.nodes[orphan].pos;
        let mut engine = LivePhysicsEngine::new(LiveConfig::default());
        engine.start(&graph);
        let hide_orphans = VisibilityFilters {
            show_orphans: false,
            ..VisibilityFilters::default()
        };
        for _ in 0..5 {
            engine.tick(&mut graph, hide_orphans, None, true);
        }
        assert_eq!(graph.nodes[orphan].pos, before);
    }

    #[test]
    fn stability_skips_commits_and_drag_wakes() {
        let mut graph = ready_graph();
        let mut engine = LivePhysicsEngine::new(quiet_config());
        engine.start(&graph);
        let filters = VisibilityFilters::default();

        let commits = (0..3)
            .map(|_| match engine.tick(&mut graph, filters, None, true) {
                TickOutcome::Stepped { commit, .. } => commit,
                other => panic!("unexpected {other:?}"),
            })
            .collect::<Vec<_>>();
        assert_eq!(commits, vec![false, true, false]);
        assert!(engine.is_settled());

        for _ in 0..4 {
            let TickOutcome::Stepped {
                commit, settled, ..
            } = engine.tick(&mut graph, filters, None, true)
            else {
                panic!("engine should be running");
            };
            assert!(settled);
            assert!(!commit);
        }

        engine.wake();
        assert!(!engine.is_settled());
        let TickOutcome::Stepped { settled, .. } = engine.tick(&mut graph, filters, Some(1), true)
        else {
            panic!("engine should be running");
        };
        assert!(!settled);
    }

    #[test]
    fn dragged_neighbours_follow_faster() {
        let run = |dragged: Option<usize>| {
            let mut graph = ready_graph();
            graph.nodes[0].pos = vec2(600.0, 0.0);
            let spoke = graph.index_of("spoke-0").expect("spoke present");
            let start = graph.nodes[spoke].pos;
            let mut config = LiveConfig::default();
            config.forces.max_velocity = 1_000.0;
            let mut engine = LivePhysicsEngine::new(config);
            engine.start(&graph);
            let filters = VisibilityFilters::default();
            for _ in 0..3 {
                engine.tick(&mut graph, filters, dragged, true);
            }
            (graph.nodes[spoke].pos - start).length()
        };

        let free = run(None);
        let pulled = run(Some(0));
        assert!(pulled > free, "pulled {pulled} vs free {free}");
    }
}
