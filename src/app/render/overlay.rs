use eframe::egui::{Align2, Color32, FontId, Painter, Rect, Stroke, pos2, vec2};

use crate::util::initial;

use super::super::ViewModel;
use super::super::icons::IconLookup;

const PROBLEM_BADGE: Color32 = Color32::from_rgb(232, 72, 72);
const PINNED_BADGE: Color32 = Color32::from_rgb(92, 148, 232);

impl ViewModel {
    /// Text, icon and badge pass drawn over the instanced scene.
    pub(in crate::app) fn draw_overlay(&mut self, painter: &Painter, rect: Rect) {
        let camera = self.camera;
        let config = &self.config.render;
        let show_labels = camera.zoom >= config.label_zoom;
        let show_icons = camera.zoom >= config.icon_zoom;
        let uv = Rect::from_min_max(pos2(0.0, 0.0), pos2(1.0, 1.0));

        for &index in &self.frame.drawn {
            let render_node = &self.graph.nodes[index];
            let center = camera.world_to_screen(rect, render_node.pos);
            let radius = (render_node.radius * camera.zoom).max(1.5);
            let selected = self.selected == Some(index);

            if show_icons {
                let icon = render_node
                    .node
                    .icon_url
                    .as_deref()
                    .map(|url| self.icons.request(&render_node.node.id, url));
                match icon {
                    Some(IconLookup::Ready(texture)) => {
                        let side = radius * 1.3;
                        painter.image(
                            texture.id(),
                            Rect::from_center_size(center, vec2(side, side)),
                            uv,
                            Color32::WHITE,
                        );
                    }
                    Some(IconLookup::Pending | IconLookup::Unavailable) | None => {
                        painter.text(
                            center,
                            Align2::CENTER_CENTER,
                            initial(&render_node.node.name),
                            FontId::proportional((radius * 0.95).clamp(8.0, 28.0)),
                            Color32::from_gray(245),
                        );
                    }
                }
            }

            if show_labels || selected {
                painter.text(
                    center + vec2(0.0, radius + 4.0),
                    Align2::CENTER_TOP,
                    &render_node.node.name,
                    FontId::proportional(12.0),
                    if selected {
                        Color32::from_rgb(245, 206, 93)
                    } else {
                        Color32::from_gray(226)
                    },
                );
            }

            let badge_radius = (radius * 0.32).clamp(3.5, 7.0);
            let offset = radius * 0.75;
            if self.frame.problem_nodes.contains(&index) {
                let badge = center + vec2(offset, -offset);
                painter.circle(
                    badge,
                    badge_radius,
                    PROBLEM_BADGE,
                    Stroke::new(1.0, Color32::from_gray(20)),
                );
                if badge_radius >= 5.0 {
                    painter.text(
                        badge,
                        Align2::CENTER_CENTER,
                        "!",
                        FontId::proportional(badge_radius * 1.6),
                        Color32::WHITE,
                    );
                }
            }
            if render_node.pinned {
                let badge = center + vec2(-offset, -offset);
                painter.circle(
                    badge,
                    badge_radius,
                    PINNED_BADGE,
                    Stroke::new(1.0, Color32::from_gray(20)),
                );
                painter.circle_filled(badge, badge_radius * 0.35, Color32::WHITE);
            }
        }
    }
}
