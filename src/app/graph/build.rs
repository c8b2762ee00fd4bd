use std::collections::HashMap;

use eframe::egui::Vec2;

use crate::provider::DependencyGraph;

use super::super::render_utils::node_radius;
use super::super::{EdgeEnd, RenderEdge, RenderGraph, RenderNode};

impl RenderGraph {
    pub(in crate::app) fn from_data(data: &DependencyGraph) -> Self {
        let mut index_by_id = HashMap::with_capacity(data.nodes.len());
        let nodes = data
            .nodes
            .iter()
            .enumerate()
            .map(|(index, node)| {
                index_by_id.insert(node.id.clone(), index);
                RenderNode {
                    radius: node_radius(node),
                    node: node.clone(),
                    pos: Vec2::ZERO,
                    velocity: Vec2::ZERO,
                    pinned: false,
                }
            })
            .collect::<Vec<_>>();

        let resolve = |id: &str| {
            index_by_id
                .get(id)
                .map_or(EdgeEnd::Missing, |&index| EdgeEnd::Node(index))
        };

        let mut dependencies = vec![Vec::new(); nodes.len()];
        let mut dependents = vec![Vec::new(); nodes.len()];
        let mut edges = Vec::with_capacity(data.edges.len());
        for edge in &data.edges {
            let from = resolve(&edge.from);
            let to = resolve(&edge.to);

            if edge.dependency_type.is_attractive()
                && let (EdgeEnd::Node(source), EdgeEnd::Node(target)) = (from, to)
                && source != target
            {
                dependencies[source].push(target);
                dependents[target].push(source);
            }

            edges.push(RenderEdge {
                from,
                to,
                data: edge.clone(),
            });
        }

        for list in dependencies.iter_mut().chain(dependents.iter_mut()) {
            list.sort_unstable();
            list.dedup();
        }

        Self {
            nodes,
            edges,
            index_by_id,
            dependencies,
            dependents,
        }
    }

    pub(in crate::app) fn index_of(&self, id: &str) -> Option<usize> {
        self.index_by_id.get(id).copied()
    }

    /// Required or optional edges leaving `index` whose target is not loaded.
    pub(in crate::app) fn missing_dependencies(&self, index: usize) -> Vec<&RenderEdge> {
        self.edges
            .iter()
            .filter(|edge| {
                edge.from == EdgeEnd::Node(index)
                    && edge.to == EdgeEnd::Missing
                    && edge.data.dependency_type.is_attractive()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::DependencyType;
    use crate::provider::fixtures::{chain, edge};

    #[test]
    fn builds_dependency_adjacency_from_attractive_edges() {
        let mut data = chain();
        data.edges.push(edge("a", "c", DependencyType::Incompatible));
        data.edges.push(edge("c", "ghost", DependencyType::Required));

        let graph = RenderGraph::from_data(&data);
        assert_eq!(graph.nodes.len(), 3);
        assert_eq!(graph.edges.len(), 4);
        assert_eq!(graph.dependencies[1], vec![0]);
        assert_eq!(graph.dependencies[2], vec![1]);
        assert!(graph.dependencies[0].is_empty());
        assert_eq!(graph.dependents[0], vec![1]);
        assert_eq!(graph.edges[3].to, EdgeEnd::Missing);

        let missing = graph.missing_dependencies(2);
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].data.target_label(), "GHOST");
    }

    #[test]
    fn absent_incompatibility_is_not_listed_as_missing() {
        let mut data = chain();
        data.edges.push(edge("a", "optifine", DependencyType::Incompatible));

        let graph = RenderGraph::from_data(&data);
        assert_eq!(graph.edges[2].to, EdgeEnd::Missing);
        assert!(graph.missing_dependencies(0).is_empty());
    }
}
