mod forces;
mod live;
mod quadtree;

use std::collections::HashSet;

use eframe::egui::{Vec2, vec2};

use crate::config::ForceConfig;
use crate::util::stable_pair;

use super::{RenderGraph, RenderNode};
use forces::{PairParams, accumulate_pairs, pair_key};
use quadtree::QuadNode;

pub(in crate::app) use live::{EngineState, LivePhysicsEngine, TickOutcome};

const REPAIR_RADIUS: f32 = 40.0;

/// Spring pairs and the connected-pair lookup, derived once from the dependency lists.
pub(in crate::app) struct Adjacency {
    springs: Vec<(usize, usize)>,
    connected: HashSet<(usize, usize)>,
}

impl Adjacency {
    pub(in crate::app) fn build(graph: &RenderGraph) -> Self {
        let mut connected = HashSet::new();
        for (source, targets) in graph.dependencies.iter().enumerate() {
            for &target in targets {
                connected.insert(pair_key(source, target));
            }
        }
        let mut springs = connected.iter().copied().collect::<Vec<_>>();
        springs.sort_unstable();

        Self { springs, connected }
    }

    pub(in crate::app) fn spring_count(&self) -> usize {
        self.springs.len()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(in crate::app) enum IterationBudget {
    Finite { total: usize, per_tick: usize },
    Unbounded,
}

pub(in crate::app) struct StepContext<'a> {
    pub(in crate::app) members: &'a [usize],
    pub(in crate::app) dragged: Option<usize>,
    pub(in crate::app) drag_attraction: f32,
}

#[derive(Clone, Copy, Debug, Default)]
pub(in crate::app) struct TickReport {
    pub(in crate::app) iterations: usize,
    pub(in crate::app) kinetic_energy: f32,
    pub(in crate::app) exhausted: bool,
}

#[derive(Default)]
struct PhysicsScratch {
    forces: Vec<Vec2>,
    positions: Vec<Vec2>,
    radii: Vec<f32>,
    member_mask: Vec<bool>,
}

/// The force model shared by the initial layout (finite budget) and the live simulation
/// (unbounded budget).
pub(in crate::app) struct ForceSimulation {
    budget: IterationBudget,
    completed: usize,
    params: ForceConfig,
    scratch: PhysicsScratch,
}

impl ForceSimulation {
    pub(in crate::app) fn new(budget: IterationBudget, params: ForceConfig) -> Self {
        Self {
            budget,
            completed: 0,
            params,
            scratch: PhysicsScratch::default(),
        }
    }

    pub(in crate::app) fn is_exhausted(&self) -> bool {
        match self.budget {
            IterationBudget::Finite { total, .. } => self.completed >= total,
            IterationBudget::Unbounded => false,
        }
    }

    pub(in crate::app) fn progress_percent(&self) -> u8 {
        match self.budget {
            IterationBudget::Finite { total, .. } if total > 0 => {
                ((self.completed.min(total) * 100) / total) as u8
            }
            IterationBudget::Finite { .. } => 100,
            IterationBudget::Unbounded => 0,
        }
    }

    pub(in crate::app) fn tick(
        &mut self,
        nodes: &mut [RenderNode],
        adjacency: &Adjacency,
        context: &StepContext<'_>,
    ) -> TickReport {
        let iterations = match self.budget {
            IterationBudget::Finite { total, per_tick } => {
                per_tick.max(1).min(total.saturating_sub(self.completed))
            }
            IterationBudget::Unbounded => 1,
        };

        let mut kinetic_energy = 0.0;
        for _ in 0..iterations {
            kinetic_energy = step(nodes, adjacency, context, &self.params, &mut self.scratch);
            self.completed += 1;
        }

        TickReport {
            iterations,
            kinetic_energy,
            exhausted: self.is_exhausted(),
        }
    }
}

/// Restores a corrupted node near the origin. Returns whether a repair happened.
pub(in crate::app) fn repair_non_finite(node: &mut RenderNode) -> bool {
    if node.pos.x.is_finite()
        && node.pos.y.is_finite()
        && node.velocity.x.is_finite()
        && node.velocity.y.is_finite()
    {
        return false;
    }

    let (jx, jy) = stable_pair(&node.node.id);
    node.pos = vec2(jx, jy) * REPAIR_RADIUS;
    node.velocity = Vec2::ZERO;
    true
}

fn step(
    nodes: &mut [RenderNode],
    adjacency: &Adjacency,
    context: &StepContext<'_>,
    params: &ForceConfig,
    scratch: &mut PhysicsScratch,
) -> f32 {
    let node_count = nodes.len();
    if node_count == 0 || context.members.is_empty() {
        return 0.0;
    }

    for &index in context.members {
        repair_non_finite(&mut nodes[index]);
    }

    scratch.forces.clear();
    scratch.forces.resize(node_count, Vec2::ZERO);
    scratch.member_mask.clear();
    scratch.member_mask.resize(node_count, false);
    scratch.positions.clear();
    scratch.radii.clear();
    for node in nodes.iter() {
        scratch.positions.push(node.pos);
        scratch.radii.push(node.radius);
    }
    for &index in context.members {
        scratch.member_mask[index] = true;
    }

    let forces = &mut scratch.forces;
    let positions = &scratch.positions;
    let radii = &scratch.radii;
    let member_mask = &scratch.member_mask;

    let pair_params = PairParams {
        repulsion: params.repulsion,
        cutoff_sq: params.repulsion_cutoff * params.repulsion_cutoff,
        connected_scale: params.connected_repulsion_scale,
        collision: params.collision,
        collision_padding: params.collision_padding,
    };
    if let Some(tree) = QuadNode::build(positions, context.members) {
        accumulate_pairs(
            &tree,
            &tree,
            true,
            positions,
            radii,
            &adjacency.connected,
            pair_params,
            forces,
        );
    }

    for &(a, b) in &adjacency.springs {
        if !member_mask[a] || !member_mask[b] {
            continue;
        }

        let delta = positions[b] - positions[a];
        let distance = delta.length();
        if distance <= 0.0001 {
            continue;
        }
        let direction = delta / distance;
        let target = radii[a] + radii[b] + params.spring_padding;
        let mut strength = params.spring;
        if context.dragged.is_some_and(|dragged| dragged == a || dragged == b) {
            strength *= context.drag_attraction;
        }
        let pull = direction * ((distance - target) * strength);
        forces[a] += pull;
        forces[b] -= pull;
    }

    let max_speed_sq = params.max_velocity * params.max_velocity;
    let mut kinetic_energy = 0.0;
    for &index in context.members {
        let node = &mut nodes[index];
        if node.pinned || context.dragged == Some(index) {
            node.velocity = Vec2::ZERO;
            continue;
        }

        let force = forces[index] - node.pos * params.center_pull;
        let mut velocity = (node.velocity + force) * params.damping;
        let speed_sq = velocity.length_sq();
        if speed_sq > max_speed_sq {
            velocity *= params.max_velocity / speed_sq.sqrt();
        }

        node.velocity = velocity;
        node.pos += velocity;
        if repair_non_finite(node) {
            continue;
        }
        kinetic_energy += 0.5 * node.velocity.length_sq();
    }

    kinetic_energy
}

#[cfg(test)]
pub(in crate::app) mod test_support {
    use crate::provider::{DependencyGraph, DependencyType};
    use crate::provider::fixtures::{edge, node};

    pub(in crate::app) fn star(spokes: usize) -> DependencyGraph {
        let mut nodes = vec![node("hub", 0, spokes)];
        let mut edges = Vec::new();
        for index in 0..spokes {
            let id = format!("spoke-{index}");
            nodes.push(node(&id, 1, 0));
            edges.push(edge(&id, "hub", DependencyType::Required));
        }
        nodes.push(node("orphan-a", 0, 0));
        nodes.push(node("orphan-b", 0, 0));
        DependencyGraph { nodes, edges }
    }
}
