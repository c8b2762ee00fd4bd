use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use anyhow::{Result, anyhow};

use super::graph::{DependencyGraph, DependencyType};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RemovalReport {
    pub is_safe: bool,
    pub affected: Vec<String>,
    pub warnings: Vec<String>,
}

pub trait RemovalAnalysis: Send + Sync {
    fn analyze(&self, instance_id: &str, node_id: &str) -> Result<RemovalReport>;
}

/// Answers removal questions from the graph already handed to the view.
#[derive(Clone, Debug)]
pub struct GraphRemovalAnalysis {
    graph: Arc<DependencyGraph>,
}

impl GraphRemovalAnalysis {
    pub fn new(graph: Arc<DependencyGraph>) -> Self {
        Self { graph }
    }

    fn display_name<'a>(&'a self, names: &HashMap<&'a str, &'a str>, id: &'a str) -> &'a str {
        names.get(id).copied().unwrap_or(id)
    }
}

impl RemovalAnalysis for GraphRemovalAnalysis {
    fn analyze(&self, _instance_id: &str, node_id: &str) -> Result<RemovalReport> {
        let names = self
            .graph
            .nodes
            .iter()
            .map(|node| (node.id.as_str(), node.name.as_str()))
            .collect::<HashMap<_, _>>();
        let target = self
            .graph
            .nodes
            .iter()
            .find(|node| node.id == node_id)
            .ok_or_else(|| anyhow!("unknown mod {node_id:?}"))?;

        let mut required_by: HashMap<&str, Vec<&str>> = HashMap::new();
        for edge in &self.graph.edges {
            if edge.dependency_type == DependencyType::Required {
                required_by
                    .entry(edge.to.as_str())
                    .or_default()
                    .push(edge.from.as_str());
            }
        }

        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        visited.insert(node_id);
        queue.push_back(node_id);
        while let Some(current) = queue.pop_front() {
            let Some(dependents) = required_by.get(current) else {
                continue;
            };
            for &dependent in dependents {
                if visited.insert(dependent) {
                    queue.push_back(dependent);
                }
            }
        }
        visited.remove(node_id);

        let mut affected = visited
            .into_iter()
            .map(|id| self.display_name(&names, id).to_owned())
            .collect::<Vec<_>>();
        affected.sort();

        let mut warnings = Vec::new();
        for edge in &self.graph.edges {
            match edge.dependency_type {
                DependencyType::Optional if edge.to == node_id => {
                    warnings.push(format!(
                        "{} loses optional integration with {}",
                        self.display_name(&names, &edge.from),
                        target.name
                    ));
                }
                DependencyType::Incompatible if edge.to == node_id || edge.from == node_id => {
                    let other = if edge.to == node_id {
                        &edge.from
                    } else {
                        &edge.to
                    };
                    warnings.push(format!(
                        "removing {} resolves the incompatibility with {}",
                        target.name,
                        self.display_name(&names, other)
                    ));
                }
                _ => {}
            }
        }
        if !target.enabled {
            warnings.push(format!("{} is already disabled", target.name));
        }

        Ok(RemovalReport {
            is_safe: affected.is_empty(),
            affected,
            warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::graph::fixtures::{chain, edge, node};

    #[test]
    fn transitive_required_dependents_are_affected() {
        let analysis = GraphRemovalAnalysis::new(Arc::new(chain()));
        let report = analysis.analyze("default", "a").expect("known node");
        assert!(!report.is_safe);
        assert_eq!(report.affected, vec!["B".to_owned(), "C".to_owned()]);
    }

    #[test]
    fn leaf_removal_is_safe_with_warnings() {
        let mut graph = chain();
        graph.nodes.push(node("d", 1, 0));
        graph.edges.push(edge("d", "c", DependencyType::Optional));
        graph.edges.push(edge("c", "x", DependencyType::Incompatible));

        let report = GraphRemovalAnalysis::new(Arc::new(graph))
            .analyze("default", "c")
            .expect("known node");
        assert!(report.is_safe);
        assert!(report.affected.is_empty());
        assert_eq!(report.warnings.len(), 2);
        assert!(report.warnings[0].contains("optional"));
    }

    #[test]
    fn unknown_node_is_an_error() {
        let analysis = GraphRemovalAnalysis::new(Arc::new(chain()));
        assert!(analysis.analyze("default", "zzz").is_err());
    }

    #[test]
    fn cycles_do_not_loop() {
        let mut graph = chain();
        graph.edges.push(edge("a", "c", DependencyType::Required));
        let report = GraphRemovalAnalysis::new(Arc::new(graph))
            .analyze("default", "a")
            .expect("known node");
        assert_eq!(report.affected.len(), 2);
    }
}
