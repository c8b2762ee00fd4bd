mod graph;
mod load;
mod removal;

pub use graph::{DependencyEdge, DependencyGraph, DependencyType, ModNode};
pub use load::{GraphDataProvider, JsonGraphProvider};
pub use removal::{GraphRemovalAnalysis, RemovalAnalysis, RemovalReport};

#[cfg(test)]
pub(crate) use graph::fixtures;
