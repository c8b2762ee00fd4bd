use std::sync::Arc;
use std::sync::mpsc::{self, TryRecvError};
use std::thread;

use eframe::egui::{self, Color32, RichText, Ui};
use log::{info, warn};

use crate::provider::{DependencyType, GraphRemovalAnalysis, RemovalAnalysis};

use super::super::{EdgeEnd, RemovalState, ViewModel};

const MISSING_TEXT: Color32 = Color32::from_rgb(240, 180, 60);
const CONFLICT_TEXT: Color32 = Color32::from_rgb(232, 96, 96);

struct RelatedRow {
    index: usize,
    name: String,
    dependency_type: DependencyType,
    is_problem: bool,
}

impl ViewModel {
    pub(in crate::app) fn draw_details(&mut self, ui: &mut Ui) {
        if !self.poll_removal() {
            ui.ctx().request_repaint();
        }

        ui.heading("Selection Details");
        ui.add_space(6.0);

        let Some(index) = self.selected else {
            ui.label("Select a mod in the graph or from the search results.");
            return;
        };
        let Some(render_node) = self.graph.nodes.get(index) else {
            ui.label("Selected mod no longer exists in the graph.");
            return;
        };

        let node = render_node.node.clone();
        let pinned = render_node.pinned;
        let (dependencies, dependents) = self.related_rows(index);
        let missing = self
            .graph
            .missing_dependencies(index)
            .into_iter()
            .map(|edge| {
                let requirement = edge
                    .data
                    .version_requirement
                    .as_deref()
                    .map(|requirement| format!(" {requirement}"))
                    .unwrap_or_default();
                format!(
                    "{}{requirement} ({})",
                    edge.data.target_label(),
                    edge.data.dependency_type.label()
                )
            })
            .collect::<Vec<_>>();

        ui.label(RichText::new(&node.name).strong());
        ui.small(node.id.as_str());
        ui.add_space(6.0);

        if !node.version.is_empty() {
            ui.label(format!("Version: {}", node.version));
        }
        if !node.source.is_empty() {
            ui.label(format!("Source: {}", node.source));
        }
        ui.label(format!(
            "Status: {}{}",
            if node.enabled { "enabled" } else { "disabled" },
            if node.is_library { ", library" } else { "" }
        ));
        ui.label(format!("Dependencies: {}", node.dependency_count));
        ui.label(format!("Dependents: {}", node.dependent_count));

        ui.horizontal(|ui| {
            let pin_label = if pinned { "Unpin" } else { "Pin" };
            if ui.button(pin_label).on_hover_text("P").clicked() {
                self.toggle_pin(index);
            }
            let running = matches!(self.removal, RemovalState::Running { .. });
            if ui
                .add_enabled(!running, egui::Button::new("Analyze removal"))
                .clicked()
            {
                self.start_removal_analysis(node.id.clone());
            }
        });

        let mut focus = None;

        ui.separator();
        ui.label(RichText::new("Depends on").strong());
        if dependencies.is_empty() && missing.is_empty() {
            ui.label("No dependencies.");
        }
        egui::ScrollArea::vertical()
            .id_salt("dependencies_scroll")
            .max_height(200.0)
            .auto_shrink([false, true])
            .show(ui, |ui| {
                if let Some(index) = related_links(ui, &dependencies) {
                    focus = Some(index);
                }
                for label in &missing {
                    ui.label(RichText::new(format!("missing: {label}")).color(MISSING_TEXT));
                }
            });

        ui.separator();
        ui.label(RichText::new("Required by").strong());
        if dependents.is_empty() {
            ui.label("Nothing depends on this mod.");
        }
        egui::ScrollArea::vertical()
            .id_salt("dependents_scroll")
            .max_height(200.0)
            .auto_shrink([false, true])
            .show(ui, |ui| {
                if let Some(index) = related_links(ui, &dependents) {
                    focus = Some(index);
                }
            });

        self.draw_removal_report(ui, &node.id);

        if let Some(index) = focus {
            self.focus_node(index);
        }
    }

    fn related_rows(&self, index: usize) -> (Vec<RelatedRow>, Vec<RelatedRow>) {
        let mut dependencies = Vec::new();
        let mut dependents = Vec::new();

        for edge in &self.graph.edges {
            let (EdgeEnd::Node(from), EdgeEnd::Node(to)) = (edge.from, edge.to) else {
                continue;
            };
            let is_problem = edge.data.is_problem || !edge.data.is_satisfied;
            if from == index {
                dependencies.push(RelatedRow {
                    index: to,
                    name: self.graph.nodes[to].node.name.clone(),
                    dependency_type: edge.data.dependency_type,
                    is_problem,
                });
            } else if to == index {
                dependents.push(RelatedRow {
                    index: from,
                    name: self.graph.nodes[from].node.name.clone(),
                    dependency_type: edge.data.dependency_type,
                    is_problem,
                });
            }
        }

        dependencies.sort_by(|a, b| a.name.cmp(&b.name));
        dependents.sort_by(|a, b| a.name.cmp(&b.name));
        (dependencies, dependents)
    }

    fn start_removal_analysis(&mut self, node_id: String) {
        let (tx, rx) = mpsc::channel();
        let analysis = GraphRemovalAnalysis::new(Arc::clone(&self.data));
        let instance_id = self.instance_id.clone();
        let target = node_id.clone();

        info!("analyzing removal of {node_id} in {instance_id}");
        thread::spawn(move || {
            let result = analysis
                .analyze(&instance_id, &target)
                .map_err(|error| format!("{error:#}"));
            let _ = tx.send(result);
        });

        self.removal = RemovalState::Running { node_id, rx };
    }

    /// Collects a finished analysis. Returns false while one is still running.
    fn poll_removal(&mut self) -> bool {
        let RemovalState::Running { node_id, rx } = &self.removal else {
            return true;
        };

        let result = match rx.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return false,
            Err(TryRecvError::Disconnected) => {
                Err("removal analysis worker disconnected".to_owned())
            }
        };
        let node_id = node_id.clone();
        if let Err(error) = &result {
            warn!("removal analysis for {node_id} failed: {error}");
        }
        self.removal = RemovalState::Done { node_id, result };
        true
    }

    fn draw_removal_report(&self, ui: &mut Ui, selected_id: &str) {
        match &self.removal {
            RemovalState::Idle => {}
            RemovalState::Running { node_id, .. } if node_id == selected_id => {
                ui.separator();
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.label("Analyzing removal...");
                });
            }
            RemovalState::Done { node_id, result } if node_id == selected_id => {
                ui.separator();
                ui.label(RichText::new("Removal impact").strong());
                match result {
                    Ok(report) => {
                        if report.is_safe {
                            ui.label("Safe to remove: no other mod requires it.");
                        } else {
                            ui.label(
                                RichText::new(format!(
                                    "Removing breaks {} mod(s):",
                                    report.affected.len()
                                ))
                                .color(CONFLICT_TEXT),
                            );
                            for name in &report.affected {
                                ui.label(format!("- {name}"));
                            }
                        }
                        for warning in &report.warnings {
                            ui.label(RichText::new(warning).color(MISSING_TEXT));
                        }
                    }
                    Err(error) => {
                        ui.label(RichText::new(error).color(CONFLICT_TEXT));
                    }
                }
            }
            RemovalState::Running { .. } | RemovalState::Done { .. } => {}
        }
    }
}

fn related_links(ui: &mut Ui, rows: &[RelatedRow]) -> Option<usize> {
    let mut clicked = None;
    for row in rows {
        let mut text = RichText::new(format!("{}  ({})", row.name, row.dependency_type.label()));
        if row.is_problem {
            text = text.color(CONFLICT_TEXT);
        }
        if ui.link(text).clicked() {
            clicked = Some(row.index);
        }
    }
    clicked
}
