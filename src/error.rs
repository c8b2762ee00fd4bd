use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ViewError {
    #[error("instanced rendering is not available: {0}")]
    UnsupportedBackend(String),
    #[error("failed to fetch the dependency graph: {0}")]
    GraphFetch(String),
}

impl ViewError {
    pub fn title(&self) -> &'static str {
        match self {
            Self::UnsupportedBackend(_) => "Graph renderer unavailable",
            Self::GraphFetch(_) => "Failed to load dependency graph",
        }
    }
}
