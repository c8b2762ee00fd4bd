use std::collections::{BTreeMap, HashSet};
use std::f32::consts::TAU;

use eframe::egui::{Vec2, vec2};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{EngineConfig, LayoutConfig};

use super::RenderGraph;
use super::physics::{Adjacency, ForceSimulation, IterationBudget, StepContext};

/// Topological level of every node: 0 without dependencies, otherwise one more than the
/// deepest dependency. A dependency still being resolved higher up the recursion (a cycle)
/// contributes level 0 for that edge.
pub(super) fn compute_levels(dependencies: &[Vec<usize>]) -> Vec<usize> {
    let mut memo = vec![None; dependencies.len()];
    let mut visiting = HashSet::new();
    for index in 0..dependencies.len() {
        level_of(index, dependencies, &mut memo, &mut visiting);
    }
    memo.into_iter().map(|level| level.unwrap_or(0)).collect()
}

fn level_of(
    index: usize,
    dependencies: &[Vec<usize>],
    memo: &mut [Option<usize>],
    visiting: &mut HashSet<usize>,
) -> usize {
    if let Some(level) = memo[index] {
        return level;
    }
    if !visiting.insert(index) {
        return 0;
    }

    let mut level = 0;
    for &dependency in &dependencies[index] {
        let dependency_level = if visiting.contains(&dependency) {
            0
        } else {
            level_of(dependency, dependencies, memo, visiting)
        };
        level = level.max(dependency_level + 1);
    }

    visiting.remove(&index);
    memo[index] = Some(level);
    level
}

pub(super) fn ring_radii(level_sizes: &[usize], ring_spacing: f32, node_spacing: f32) -> Vec<f32> {
    let mut radii = Vec::with_capacity(level_sizes.len());
    let mut previous: Option<f32> = None;
    for (level, &count) in level_sizes.iter().enumerate() {
        let natural = ring_spacing * (level as f32 + 0.5);
        let needed = count as f32 * node_spacing / TAU;
        let mut radius = natural.max(needed);
        if let Some(previous) = previous {
            radius = radius.max(previous + ring_spacing * 0.5);
        }
        radii.push(radius);
        previous = Some(radius);
    }
    radii
}

pub(super) struct LayoutEngine {
    simulation: ForceSimulation,
    adjacency: Adjacency,
    members: Vec<usize>,
    node_count: usize,
}

impl LayoutEngine {
    /// Seeds ring positions and prepares the relaxation. Returns `None` while the canvas has
    /// no area yet; the caller keeps the request pending and retries once it does.
    pub(super) fn start(
        graph: &mut RenderGraph,
        canvas: Vec2,
        config: &EngineConfig,
    ) -> Option<Self> {
        if canvas.x <= 0.0 || canvas.y <= 0.0 || !canvas.x.is_finite() || !canvas.y.is_finite() {
            return None;
        }

        let node_count = graph.nodes.len();
        let levels = compute_levels(&graph.dependencies);
        seed_rings(graph, &levels, canvas, &config.layout);

        let layout = &config.layout;
        let budget = if node_count > layout.large_graph_threshold {
            IterationBudget::Finite {
                total: layout.large_graph_iterations,
                per_tick: layout.large_graph_batch,
            }
        } else {
            IterationBudget::Finite {
                total: layout.small_graph_iterations,
                per_tick: layout.small_graph_batch,
            }
        };
        info!(
            "initial layout: {node_count} nodes over {} levels, budget {budget:?}",
            levels.iter().max().map_or(0, |max| max + 1)
        );

        Some(Self {
            simulation: ForceSimulation::new(budget, config.forces),
            adjacency: Adjacency::build(graph),
            members: (0..node_count).collect(),
            node_count,
        })
    }

    pub(super) fn advance(
        &mut self,
        graph: &mut RenderGraph,
        mut on_progress: impl FnMut(u8),
    ) -> bool {
        if graph.nodes.len() != self.node_count {
            self.node_count = graph.nodes.len();
            self.members = (0..self.node_count).collect();
            self.adjacency = Adjacency::build(graph);
        }

        let context = StepContext {
            members: &self.members,
            dragged: None,
            drag_attraction: 1.0,
        };
        let report = self
            .simulation
            .tick(&mut graph.nodes, &self.adjacency, &context);
        let progress = self.simulation.progress_percent();
        debug!(
            "layout batch of {} iterations, {progress}%, kinetic energy {:.2}",
            report.iterations, report.kinetic_energy
        );
        on_progress(progress);
        report.exhausted
    }

    #[cfg(test)]
    pub(super) fn run_to_completion(&mut self, graph: &mut RenderGraph) -> Vec<u8> {
        let mut reported = Vec::new();
        while !self.advance(graph, |progress| reported.push(progress)) {}
        reported
    }
}

fn seed_rings(graph: &mut RenderGraph, levels: &[usize], canvas: Vec2, config: &LayoutConfig) {
    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (index, &level) in levels.iter().enumerate() {
        groups.entry(level).or_default().push(index);
    }

    for members in groups.values_mut() {
        members.sort_by(|&a, &b| {
            let first_dependency = |index: usize| {
                graph.dependencies[index]
                    .first()
                    .map(|&dependency| graph.nodes[dependency].node.id.as_str())
                    .unwrap_or("")
            };
            first_dependency(a)
                .cmp(first_dependency(b))
                .then_with(|| graph.nodes[a].node.id.cmp(&graph.nodes[b].node.id))
        });
    }

    let scale = (canvas.x.min(canvas.y) / 800.0).clamp(0.5, 2.0);
    let level_sizes = groups.values().map(Vec::len).collect::<Vec<_>>();
    let radii = ring_radii(
        &level_sizes,
        config.ring_spacing * scale,
        config.ring_node_spacing,
    );

    let mut rng = StdRng::seed_from_u64(config.seed);
    for ((level, members), radius) in groups.iter().zip(radii) {
        let count = members.len().max(1) as f32;
        let offset = *level as f32 * 0.37;
        for (slot, &index) in members.iter().enumerate() {
            let angle = offset + (slot as f32 / count) * TAU;
            let jitter = if config.jitter > 0.0 {
                vec2(
                    rng.gen_range(-config.jitter..=config.jitter),
                    rng.gen_range(-config.jitter..=config.jitter),
                )
            } else {
                Vec2::ZERO
            };
            let node = &mut graph.nodes[index];
            node.pos = vec2(angle.cos(), angle.sin()) * radius + jitter;
            node.velocity = Vec2::ZERO;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::fixtures::{chain, edge, node};
    use crate::provider::{DependencyGraph, DependencyType};

    #[test]
    fn chain_levels_follow_dependency_depth() {
        let graph = RenderGraph::from_data(&chain());
        assert_eq!(compute_levels(&graph.dependencies), vec![0, 1, 2]);
    }

    #[test]
    fn nodes_without_dependencies_sit_on_level_zero() {
        let data = super::super::physics::test_support::star(5);
        let graph = RenderGraph::from_data(&data);
        let levels = compute_levels(&graph.dependencies);
        for (render_node, level) in graph.nodes.iter().zip(&levels) {
            if render_node.node.dependency_count == 0 {
                assert_eq!(*level, 0, "{}", render_node.node.id);
            } else {
                assert_eq!(*level, 1);
            }
        }
    }

    #[test]
    fn cycles_terminate_with_defined_levels() {
        let data = DependencyGraph {
            nodes: vec![node("a", 1, 1), node("b", 1, 1)],
            edges: vec![
                edge("a", "b", DependencyType::Required),
                edge("b", "a", DependencyType::Required),
            ],
        };
        let graph = RenderGraph::from_data(&data);
        let levels = compute_levels(&graph.dependencies);
        assert_eq!(levels.len(), 2);
        // a resolves first: b sees a in progress (0), so b = 1 and a = 2.
        assert_eq!(levels, vec![2, 1]);
    }

    #[test]
    fn optional_edges_count_but_incompatible_do_not() {
        let mut data = chain();
        data.edges.push(edge("a", "c", DependencyType::Incompatible));
        data.edges.push(edge("a", "b", DependencyType::Optional));
        let graph = RenderGraph::from_data(&data);
        let levels = compute_levels(&graph.dependencies);
        // a -> b -> a is a cycle through the optional edge; it must still terminate.
        assert_eq!(levels.len(), 3);
        assert!(levels.iter().all(|level| *level <= 3));
    }

    #[test]
    fn ring_radii_strictly_increase() {
        let radii = ring_radii(&[1, 1, 1], 140.0, 46.0);
        assert!(radii[0] < radii[1] && radii[1] < radii[2], "{radii:?}");

        let crowded = ring_radii(&[200, 3, 1], 140.0, 46.0);
        assert!(crowded[0] < crowded[1] && crowded[1] < crowded[2], "{crowded:?}");
    }

    #[test]
    fn seeded_rings_grow_with_level() {
        let mut graph = RenderGraph::from_data(&chain());
        let config = EngineConfig::default();
        LayoutEngine::start(&mut graph, vec2(800.0, 600.0), &config).expect("canvas has area");

        let distances = graph
            .nodes
            .iter()
            .map(|render_node| render_node.pos.length())
            .collect::<Vec<_>>();
        let jitter = config.layout.jitter * 2.0_f32.sqrt();
        assert!(distances[0] + jitter < distances[1] - jitter, "{distances:?}");
        assert!(distances[1] + jitter < distances[2] - jitter, "{distances:?}");
    }

    #[test]
    fn zero_canvas_defers_layout() {
        let mut graph = RenderGraph::from_data(&chain());
        let config = EngineConfig::default();
        assert!(LayoutEngine::start(&mut graph, Vec2::ZERO, &config).is_none());
        assert!(LayoutEngine::start(&mut graph, vec2(640.0, 0.0), &config).is_none());
        assert!(LayoutEngine::start(&mut graph, vec2(640.0, 480.0), &config).is_some());
    }

    #[test]
    fn completed_layout_is_finite_and_bounded() {
        let canvas = vec2(1024.0, 768.0);
        let config = EngineConfig::default();
        for data in [
            chain(),
            super::super::physics::test_support::star(40),
            DependencyGraph {
                nodes: (0..12).map(|index| node(&format!("n{index}"), 0, 0)).collect(),
                edges: Vec::new(),
            },
        ] {
            let mut graph = RenderGraph::from_data(&data);
            let mut engine =
                LayoutEngine::start(&mut graph, canvas, &config).expect("canvas has area");
            let progress = engine.run_to_completion(&mut graph);

            assert_eq!(progress.last().copied(), Some(100));
            assert!(progress.windows(2).all(|pair| pair[0] <= pair[1]));
            assert_eq!(progress.len(), 250 / config.layout.small_graph_batch);
            for render_node in &graph.nodes {
                assert!(render_node.pos.x.is_finite() && render_node.pos.y.is_finite());
                assert!(render_node.pos.x.abs() < canvas.x * 10.0);
                assert!(render_node.pos.y.abs() < canvas.y * 10.0);
            }
        }
    }

    #[test]
    fn large_graphs_use_the_reduced_budget() {
        let data = super::super::physics::test_support::star(320);
        let mut graph = RenderGraph::from_data(&data);
        let config = EngineConfig::default();
        let mut engine =
            LayoutEngine::start(&mut graph, vec2(1280.0, 800.0), &config).expect("canvas has area");
        let progress = engine.run_to_completion(&mut graph);
        assert_eq!(progress.len(), 150 / config.layout.large_graph_batch);
    }
}
