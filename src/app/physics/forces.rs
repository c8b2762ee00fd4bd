use std::collections::HashSet;

use eframe::egui::{Vec2, vec2};

use super::quadtree::QuadNode;

const MIN_DISTANCE_SQ: f32 = 1.0;

#[derive(Clone, Copy)]
pub(super) struct PairParams {
    pub(super) repulsion: f32,
    pub(super) cutoff_sq: f32,
    pub(super) connected_scale: f32,
    pub(super) collision: f32,
    pub(super) collision_padding: f32,
}

pub(super) fn pair_key(a: usize, b: usize) -> (usize, usize) {
    if a < b { (a, b) } else { (b, a) }
}

fn separation_direction(delta: Vec2, distance: f32, from: usize, to: usize) -> Vec2 {
    if distance > 0.0001 {
        delta / distance
    } else {
        let angle =
            ((from as f32) * 0.618_034 + (to as f32) * 0.414_214) * std::f32::consts::TAU;
        vec2(angle.cos(), angle.sin())
    }
}

/// Inverse-square repulsion plus overlap correction for one pair within the cutoff.
fn apply_pair(
    from: usize,
    to: usize,
    positions: &[Vec2],
    radii: &[f32],
    connected: &HashSet<(usize, usize)>,
    params: PairParams,
    forces: &mut [Vec2],
) {
    let delta = positions[from] - positions[to];
    let distance_sq = delta.length_sq();
    if distance_sq > params.cutoff_sq {
        return;
    }

    let distance = distance_sq.sqrt();
    let direction = separation_direction(delta, distance, from, to);

    let mut repulsion = params.repulsion / distance_sq.max(MIN_DISTANCE_SQ);
    if connected.contains(&pair_key(from, to)) {
        repulsion *= params.connected_scale;
    }
    forces[from] += direction * repulsion;
    forces[to] -= direction * repulsion;

    let min_distance = radii[from] + radii[to] + params.collision_padding;
    if distance < min_distance {
        let overlap_push = (min_distance - distance) * params.collision;
        forces[from] += direction * overlap_push;
        forces[to] -= direction * overlap_push;
    }
}

#[allow(clippy::too_many_arguments)]
pub(super) fn accumulate_pairs(
    node_a: &QuadNode,
    node_b: &QuadNode,
    same_node: bool,
    positions: &[Vec2],
    radii: &[f32],
    connected: &HashSet<(usize, usize)>,
    params: PairParams,
    forces: &mut [Vec2],
) {
    if node_a.bounds.distance_sq_to(node_b.bounds) > params.cutoff_sq {
        return;
    }

    if node_a.is_leaf() && node_b.is_leaf() {
        if same_node {
            for i in 0..node_a.indices.len() {
                let from = node_a.indices[i];
                for &to in &node_a.indices[(i + 1)..] {
                    apply_pair(from, to, positions, radii, connected, params, forces);
                }
            }
        } else {
            for &from in &node_a.indices {
                for &to in &node_b.indices {
                    apply_pair(from, to, positions, radii, connected, params, forces);
                }
            }
        }
        return;
    }

    if same_node {
        for first in 0..4 {
            let Some(child_a) = node_a.children[first].as_ref() else {
                continue;
            };

            accumulate_pairs(
                child_a, child_a, true, positions, radii, connected, params, forces,
            );

            for second in (first + 1)..4 {
                let Some(child_b) = node_a.children[second].as_ref() else {
                    continue;
                };
                accumulate_pairs(
                    child_a, child_b, false, positions, radii, connected, params, forces,
                );
            }
        }
        return;
    }

    let split_a = if node_a.is_leaf() {
        false
    } else if node_b.is_leaf() {
        true
    } else {
        node_a.bounds.half_extent >= node_b.bounds.half_extent
    };

    if split_a {
        for child in node_a.children.iter().flatten() {
            accumulate_pairs(
                child, node_b, false, positions, radii, connected, params, forces,
            );
        }
    } else {
        for child in node_b.children.iter().flatten() {
            accumulate_pairs(
                node_a, child, false, positions, radii, connected, params, forces,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(cutoff: f32) -> PairParams {
        PairParams {
            repulsion: 1_000.0,
            cutoff_sq: cutoff * cutoff,
            connected_scale: 0.5,
            collision: 0.5,
            collision_padding: 0.0,
        }
    }

    fn brute_force(
        positions: &[Vec2],
        radii: &[f32],
        connected: &HashSet<(usize, usize)>,
        params: PairParams,
    ) -> Vec<Vec2> {
        let mut forces = vec![Vec2::ZERO; positions.len()];
        for from in 0..positions.len() {
            for to in (from + 1)..positions.len() {
                apply_pair(from, to, positions, radii, connected, params, &mut forces);
            }
        }
        forces
    }

    #[test]
    fn tree_traversal_matches_brute_force() {
        let positions = (0..60)
            .map(|index| {
                let angle = index as f32 * 0.7;
                vec2(angle.cos() * (index as f32 * 9.0), angle.sin() * (index as f32 * 7.0))
            })
            .collect::<Vec<_>>();
        let radii = vec![8.0; positions.len()];
        let connected = [(0, 1), (4, 9)].into_iter().collect::<HashSet<_>>();
        let params = params(150.0);
        let members = (0..positions.len()).collect::<Vec<_>>();

        let tree = QuadNode::build(&positions, &members).expect("tree");
        let mut forces = vec![Vec2::ZERO; positions.len()];
        accumulate_pairs(
            &tree, &tree, true, &positions, &radii, &connected, params, &mut forces,
        );

        let expected = brute_force(&positions, &radii, &connected, params);
        for (actual, expected) in forces.iter().zip(&expected) {
            assert!((*actual - *expected).length() < 1e-2, "{actual:?} vs {expected:?}");
        }
    }

    #[test]
    fn pairs_beyond_cutoff_do_not_interact() {
        let positions = vec![Vec2::ZERO, vec2(500.0, 0.0)];
        let radii = vec![8.0, 8.0];
        let forces = brute_force(&positions, &radii, &HashSet::new(), params(100.0));
        assert_eq!(forces, vec![Vec2::ZERO, Vec2::ZERO]);
    }

    #[test]
    fn connected_pairs_repel_less() {
        let positions = vec![Vec2::ZERO, vec2(50.0, 0.0)];
        let radii = vec![1.0, 1.0];
        let free = brute_force(&positions, &radii, &HashSet::new(), params(100.0));
        let linked = brute_force(
            &positions,
            &radii,
            &[(0, 1)].into_iter().collect(),
            params(100.0),
        );
        assert!(linked[0].length() < free[0].length());
        assert!(free[0].x < 0.0, "node 0 is pushed away from node 1");
    }
}
