use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::info;

use super::graph::DependencyGraph;

pub trait GraphDataProvider: Send + Sync {
    fn get_graph(&self, instance_id: &str) -> Result<DependencyGraph>;
}

/// Reads precomputed graphs from disk. `path` is either a single JSON document or a
/// directory holding one `<instance>.json` per instance.
#[derive(Clone, Debug)]
pub struct JsonGraphProvider {
    path: PathBuf,
}

impl JsonGraphProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn resolve(&self, instance_id: &str) -> PathBuf {
        if self.path.is_dir() {
            self.path.join(format!("{instance_id}.json"))
        } else {
            self.path.clone()
        }
    }
}

impl GraphDataProvider for JsonGraphProvider {
    fn get_graph(&self, instance_id: &str) -> Result<DependencyGraph> {
        let path = self.resolve(instance_id);
        let graph = read_graph(&path)
            .with_context(|| format!("failed to load graph for instance {instance_id}"))?;
        info!(
            "loaded graph for {instance_id}: {} nodes, {} edges, {} missing dependencies",
            graph.node_count(),
            graph.edge_count(),
            graph.missing_dependency_count()
        );
        Ok(graph)
    }
}

pub(super) fn parse_graph(raw: &str) -> Result<DependencyGraph> {
    let graph: DependencyGraph =
        serde_json::from_str(raw).context("invalid dependency graph JSON")?;
    graph.validate()?;
    Ok(graph)
}

fn read_graph(path: &Path) -> Result<DependencyGraph> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_graph(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("modgraph-{name}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).expect("temp dir");
        dir
    }

    const SAMPLE: &str = r#"{"nodes":[{"id":"a","name":"A"},{"id":"b","name":"B"}],
        "edges":[{"from":"b","to":"a","to_name":"A","dependency_type":"required"}]}"#;

    #[test]
    fn reads_instance_file_from_directory() {
        let dir = scratch_dir("provider-dir");
        fs::write(dir.join("survival.json"), SAMPLE).expect("write graph");

        let provider = JsonGraphProvider::new(&dir);
        let graph = provider.get_graph("survival").expect("graph loads");
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);

        let missing = provider.get_graph("creative");
        assert!(missing.is_err());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn reads_single_file_for_any_instance() {
        let dir = scratch_dir("provider-file");
        let file = dir.join("graph.json");
        fs::write(&file, SAMPLE).expect("write graph");

        let graph = JsonGraphProvider::new(&file)
            .get_graph("whatever")
            .expect("graph loads");
        assert_eq!(graph.nodes[1].id, "b");
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn surfaces_parse_errors_with_context() {
        let error = parse_graph("{\"nodes\": 3}").expect_err("invalid payload");
        assert!(format!("{error:#}").contains("invalid dependency graph JSON"));

        let duplicate = r#"{"nodes":[{"id":"a","name":"A"},{"id":"a","name":"A2"}]}"#;
        assert!(parse_graph(duplicate).is_err());
    }
}
