mod app;
mod config;
mod error;
mod provider;
mod util;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::anyhow;
use clap::Parser;
use env_logger::Env;
use log::info;

use provider::JsonGraphProvider;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Graph JSON file, or a directory holding one `<instance>.json` per instance.
    #[arg(long)]
    graph: PathBuf,
    #[arg(long, default_value = "default")]
    instance: String,
    /// JSON file overriding engine tunables.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Seed for the initial layout jitter.
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut config = config::load_config(args.config.as_deref())?;
    if let Some(seed) = args.seed {
        config.layout.seed = seed;
    }
    info!(
        "viewing instance {} from {}",
        args.instance,
        args.graph.display()
    );

    let source = app::GraphSource {
        provider: Arc::new(JsonGraphProvider::new(args.graph)),
        instance_id: args.instance,
    };

    let options = eframe::NativeOptions {
        renderer: eframe::Renderer::Glow,
        viewport: eframe::egui::ViewportBuilder::default().with_inner_size([1440.0, 920.0]),
        ..Default::default()
    };

    eframe::run_native(
        "modgraph",
        options,
        Box::new(move |cc| Ok(Box::new(app::ModGraphApp::new(cc, source, config)))),
    )
    .map_err(|error| anyhow!("failed to start the viewer: {error}"))
}
