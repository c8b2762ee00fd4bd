use eframe::egui::Context;

use super::super::ViewModel;
use super::super::physics::EngineState;

const FPS_SAMPLE_WINDOW: usize = 180;

impl ViewModel {
    pub(in crate::app) fn update_fps_counter(&mut self, ctx: &Context) {
        let dt = ctx.input(|input| input.stable_dt);
        if dt <= f32::EPSILON {
            return;
        }

        self.fps_current = (1.0 / dt).clamp(0.0, 1000.0);
        self.fps_samples.push_back(self.fps_current);
        while self.fps_samples.len() > FPS_SAMPLE_WINDOW {
            self.fps_samples.pop_front();
        }
    }

    pub(in crate::app) fn fps_display_text(&self) -> Option<String> {
        if self.fps_samples.is_empty() {
            return None;
        }

        let average = self.fps_samples.iter().sum::<f32>() / self.fps_samples.len() as f32;
        let mut text = format!("FPS {:.0} | avg {average:.1}", self.fps_current);
        if self.fps_current > f32::EPSILON {
            text.push_str(&format!(" | {:.1} ms", 1000.0 / self.fps_current));
        }
        Some(text)
    }

    pub(in crate::app) fn visible_graph_text(&self) -> String {
        let mut text = format!(
            "drawn: {} / {} mods, {} / {} edges",
            self.frame.drawn.len(),
            self.graph.nodes.len(),
            self.frame.drawn_edge_count(),
            self.graph.edges.len()
        );
        let physics = match self.physics.state() {
            EngineState::Running if self.physics.is_settled() => "settled",
            EngineState::Running => "running",
            EngineState::Stopped => "stopped",
        };
        text.push_str(&format!(
            " | physics {physics} | {} icons",
            self.icons.len()
        ));
        if self.committed.revision > 0 {
            text.push_str(&format!(
                " | commit #{} (energy {:.2})",
                self.committed.revision, self.committed.kinetic_energy
            ));
        }
        text
    }
}
