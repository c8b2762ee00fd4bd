use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    pub layout: LayoutConfig,
    pub forces: ForceConfig,
    pub live: LiveConfig,
    pub render: RenderConfig,
    pub icons: IconConfig,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub small_graph_iterations: usize,
    pub large_graph_iterations: usize,
    pub large_graph_threshold: usize,
    pub small_graph_batch: usize,
    pub large_graph_batch: usize,
    pub ring_spacing: f32,
    pub ring_node_spacing: f32,
    pub jitter: f32,
    pub seed: u64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            small_graph_iterations: 250,
            large_graph_iterations: 150,
            large_graph_threshold: 300,
            small_graph_batch: 5,
            large_graph_batch: 10,
            ring_spacing: 140.0,
            ring_node_spacing: 46.0,
            jitter: 12.0,
            seed: 0x6d6f_6467,
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct ForceConfig {
    pub repulsion: f32,
    pub repulsion_cutoff: f32,
    pub connected_repulsion_scale: f32,
    pub spring: f32,
    pub spring_padding: f32,
    pub collision: f32,
    pub collision_padding: f32,
    pub center_pull: f32,
    pub damping: f32,
    pub max_velocity: f32,
}

impl Default for ForceConfig {
    fn default() -> Self {
        Self {
            repulsion: 9_000.0,
            repulsion_cutoff: 700.0,
            connected_repulsion_scale: 0.35,
            spring: 0.045,
            spring_padding: 70.0,
            collision: 0.6,
            collision_padding: 8.0,
            center_pull: 0.0025,
            damping: 0.82,
            max_velocity: 28.0,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct LiveConfig {
    #[serde(deserialize_with = "live_forces")]
    pub forces: ForceConfig,
    pub drag_attraction_scale: f32,
    pub stability_energy: f32,
    pub stability_window: u32,
    pub commit_interval: u32,
}

impl ForceConfig {
    pub fn live() -> Self {
        Self {
            repulsion_cutoff: 420.0,
            damping: 0.78,
            max_velocity: 12.0,
            ..Self::default()
        }
    }
}

/// Missing fields of `live.forces` fall back to the live tuning, not the layout one.
fn live_forces<'de, D>(deserializer: D) -> Result<ForceConfig, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let overrides = Value::deserialize(deserializer)?;
    let Value::Object(overrides) = overrides else {
        return Err(D::Error::custom("live.forces must be an object"));
    };
    let mut merged = serde_json::to_value(ForceConfig::live()).map_err(D::Error::custom)?;
    if let Value::Object(fields) = &mut merged {
        fields.extend(overrides);
    }
    serde_json::from_value(merged).map_err(D::Error::custom)
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            forces: ForceConfig::live(),
            drag_attraction_scale: 4.0,
            stability_energy: 0.5,
            stability_window: 60,
            commit_interval: 4,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct RenderConfig {
    pub cull_margin: f32,
    pub edge_sample_zoom: f32,
    pub edge_budget: usize,
    pub label_zoom: f32,
    pub icon_zoom: f32,
    pub stub_length: f32,
    pub min_zoom: f32,
    pub max_zoom: f32,
    pub focus_zoom: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            cull_margin: 60.0,
            edge_sample_zoom: 0.35,
            edge_budget: 2_500,
            label_zoom: 0.55,
            icon_zoom: 0.9,
            stub_length: 36.0,
            min_zoom: 0.05,
            max_zoom: 6.0,
            focus_zoom: 1.4,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct IconConfig {
    pub capacity: usize,
}

impl Default for IconConfig {
    fn default() -> Self {
        Self { capacity: 200 }
    }
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<EngineConfig> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config: EngineConfig = serde_json::from_str(&contents)
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(config)
}
