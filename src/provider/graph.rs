use std::collections::{HashMap, HashSet};

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyType {
    Required,
    Optional,
    Incompatible,
}

impl DependencyType {
    pub fn label(self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::Optional => "optional",
            Self::Incompatible => "incompatible",
        }
    }

    /// Required and optional edges pull their endpoints together; incompatibility edges do not.
    pub fn is_attractive(self) -> bool {
        matches!(self, Self::Required | Self::Optional)
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ModNode {
    pub id: String,
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub icon_url: Option<String>,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub dependency_count: usize,
    #[serde(default)]
    pub dependent_count: usize,
    #[serde(default)]
    pub is_library: bool,
}

fn default_enabled() -> bool {
    true
}

impl ModNode {
    pub fn is_orphan(&self) -> bool {
        self.dependency_count == 0 && self.dependent_count == 0
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DependencyEdge {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub from_name: Option<String>,
    #[serde(default)]
    pub to_name: String,
    pub dependency_type: DependencyType,
    #[serde(default)]
    pub version_requirement: Option<String>,
    #[serde(default = "default_satisfied")]
    pub is_satisfied: bool,
    #[serde(default)]
    pub is_problem: bool,
}

fn default_satisfied() -> bool {
    true
}

impl DependencyEdge {
    /// Name shown for the dependency side; falls back to the id when the provider left it blank.
    pub fn target_label(&self) -> &str {
        if self.to_name.is_empty() {
            &self.to
        } else {
            &self.to_name
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct DependencyGraph {
    pub nodes: Vec<ModNode>,
    #[serde(default)]
    pub edges: Vec<DependencyEdge>,
}

impl DependencyGraph {
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::with_capacity(self.nodes.len());
        for node in &self.nodes {
            if node.id.is_empty() {
                bail!("graph contains a node with an empty id ({:?})", node.name);
            }
            if !seen.insert(node.id.as_str()) {
                bail!("graph contains duplicate node id {:?}", node.id);
            }
        }
        Ok(())
    }

    pub fn index_by_id(&self) -> HashMap<&str, usize> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (node.id.as_str(), index))
            .collect()
    }

    pub fn missing_dependency_count(&self) -> usize {
        let known = self.index_by_id();
        self.edges
            .iter()
            .filter(|edge| {
                edge.dependency_type.is_attractive() && !known.contains_key(edge.to.as_str())
            })
            .count()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub(crate) fn node(id: &str, dependencies: usize, dependents: usize) -> ModNode {
        ModNode {
            id: id.to_owned(),
            name: id.to_uppercase(),
            enabled: true,
            version: "1.0.0".to_owned(),
            icon_url: None,
            source: "modrinth".to_owned(),
            dependency_count: dependencies,
            dependent_count: dependents,
            is_library: false,
        }
    }

    pub(crate) fn edge(from: &str, to: &str, dependency_type: DependencyType) -> DependencyEdge {
        DependencyEdge {
            from: from.to_owned(),
            to: to.to_owned(),
            from_name: Some(from.to_uppercase()),
            to_name: to.to_uppercase(),
            dependency_type,
            version_requirement: None,
            is_satisfied: true,
            is_problem: false,
        }
    }

    /// A <- B <- C, all required.
    pub(crate) fn chain() -> DependencyGraph {
        DependencyGraph {
            nodes: vec![node("a", 0, 1), node("b", 1, 1), node("c", 1, 0)],
            edges: vec![
                edge("b", "a", DependencyType::Required),
                edge("c", "b", DependencyType::Required),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::{chain, edge, node};
    use super::*;

    #[test]
    fn deserializes_provider_payload_with_defaults() {
        let raw = r#"{
            "nodes": [
                {"id": "sodium", "name": "Sodium", "source": "modrinth", "dependency_count": 1},
                {"id": "fabric-api", "name": "Fabric API", "is_library": true, "enabled": false}
            ],
            "edges": [
                {"from": "sodium", "to": "fabric-api", "to_name": "Fabric API",
                 "dependency_type": "required", "version_requirement": ">=0.90"},
                {"from": "sodium", "to": "optifine", "to_name": "OptiFine",
                 "dependency_type": "incompatible", "is_satisfied": false, "is_problem": true}
            ]
        }"#;

        let graph: DependencyGraph = serde_json::from_str(raw).expect("payload parses");
        assert_eq!(graph.node_count(), 2);
        assert!(graph.nodes[0].enabled);
        assert!(!graph.nodes[1].enabled);
        assert!(graph.nodes[1].is_library);
        assert_eq!(graph.edges[0].dependency_type, DependencyType::Required);
        assert!(graph.edges[0].is_satisfied);
        assert_eq!(graph.edges[1].dependency_type, DependencyType::Incompatible);
        assert!(graph.edges[1].is_problem);
        assert_eq!(graph.missing_dependency_count(), 0);
    }

    #[test]
    fn absent_incompatibilities_are_not_missing_dependencies() {
        let mut graph = chain();
        graph.edges.push(edge("a", "optifine", DependencyType::Incompatible));
        assert_eq!(graph.missing_dependency_count(), 0);
        graph.edges.push(edge("a", "cloth-config", DependencyType::Optional));
        graph.edges.push(edge("b", "fabric-api", DependencyType::Required));
        assert_eq!(graph.missing_dependency_count(), 2);
    }

    #[test]
    fn rejects_duplicate_ids() {
        let mut graph = chain();
        graph.nodes.push(node("b", 0, 0));
        let error = graph.validate().expect_err("duplicate id is rejected");
        assert!(error.to_string().contains("duplicate node id"));
    }

    #[test]
    fn target_label_falls_back_to_id() {
        let mut dependency = edge("a", "missing-lib", DependencyType::Required);
        dependency.to_name.clear();
        assert_eq!(dependency.target_label(), "missing-lib");
    }

    #[test]
    fn orphan_detection_uses_both_counts() {
        assert!(node("lonely", 0, 0).is_orphan());
        assert!(!node("root", 0, 2).is_orphan());
        assert!(!DependencyType::Incompatible.is_attractive());
    }
}
