use eframe::egui::{self, RichText, Ui};

use super::super::ViewModel;

impl ViewModel {
    pub(in crate::app) fn draw_controls(&mut self, ui: &mut Ui) {
        ui.heading("Graph Controls");
        ui.separator();
        ui.add_space(4.0);

        ui.label(RichText::new("Visibility").strong());
        let mut filters = self.filters;
        ui.checkbox(&mut filters.show_libraries, "Show libraries")
            .on_hover_text("Library mods that other mods depend on.");
        ui.checkbox(&mut filters.show_disabled, "Show disabled mods");
        ui.checkbox(&mut filters.show_orphans, "Show orphans")
            .on_hover_text("Mods with no dependencies and no dependents.");
        self.set_filters(filters);

        ui.checkbox(&mut self.highlight_problems, "Highlight problems")
            .on_hover_text("Color conflicting and unsatisfied edges brightly.");

        ui.separator();
        ui.label(RichText::new("Search").strong());
        let search_response = ui.add(
            egui::TextEdit::singleline(&mut self.search)
                .hint_text("name or id")
                .desired_width(f32::INFINITY),
        );
        if search_response.changed() {
            self.refresh_search();
        }

        let mut focus = None;
        if search_response.lost_focus()
            && ui.input(|input| input.key_pressed(egui::Key::Enter))
        {
            focus = self.search_results.first().copied();
        }

        if !self.search.trim().is_empty() {
            ui.small(format!("{} matches", self.search_results.len()));
            egui::ScrollArea::vertical()
                .id_salt("search_results_scroll")
                .max_height(360.0)
                .auto_shrink([false, true])
                .show(ui, |ui| {
                    for &index in &self.search_results {
                        let node = &self.graph.nodes[index].node;
                        let mut label = node.name.clone();
                        if !self.filters.is_visible(node) {
                            label.push_str("  (hidden)");
                        }
                        let selected = self.selected == Some(index);
                        if ui
                            .selectable_label(selected, label)
                            .on_hover_text(node.id.as_str())
                            .clicked()
                        {
                            focus = Some(index);
                        }
                    }
                });
        }

        if let Some(index) = focus {
            self.focus_node(index);
        }

        ui.separator();
        ui.label(RichText::new("Legend").strong());
        ui.small("Click selects, drag moves a mod, double-click pins it.");
        ui.small("Drag empty space to pan; scroll zooms toward the cursor.");
        ui.small("Esc clears selection, F fits, Space toggles physics, P pins.");
    }
}
