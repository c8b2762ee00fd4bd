use eframe::egui::{Color32, Painter, Pos2, Rect, Stroke, Vec2, vec2};

use crate::provider::{DependencyEdge, DependencyType, ModNode};

/// Pan is the screen offset of the world origin from the canvas center, in points.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(super) struct Camera {
    pub(super) pan: Vec2,
    pub(super) zoom: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            pan: Vec2::ZERO,
            zoom: 1.0,
        }
    }
}

impl Camera {
    pub(super) fn world_to_screen(self, rect: Rect, world: Vec2) -> Pos2 {
        world_to_screen(rect, self.pan, self.zoom, world)
    }

    pub(super) fn screen_to_world(self, rect: Rect, screen: Pos2) -> Vec2 {
        screen_to_world(rect, self.pan, self.zoom, screen)
    }

    /// Zooms by `factor` keeping the world point under `pointer` fixed on screen.
    pub(super) fn zoom_at(&mut self, rect: Rect, pointer: Pos2, factor: f32, min: f32, max: f32) {
        let world_before = self.screen_to_world(rect, pointer);
        self.zoom = (self.zoom * factor).clamp(min, max);
        self.pan = pointer - rect.center() - (world_before * self.zoom);
    }

    pub(super) fn center_on(&mut self, world: Vec2) {
        self.pan = -world * self.zoom;
    }

    pub(super) fn fit(&mut self, rect: Rect, bounds: Rect, min: f32, max: f32) {
        let width = bounds.width().max(1.0);
        let height = bounds.height().max(1.0);
        let zoom = (rect.width() / width).min(rect.height() / height) * 0.9;
        self.zoom = if zoom.is_finite() {
            zoom.clamp(min, max)
        } else {
            1.0
        };
        self.center_on(bounds.center().to_vec2());
    }

    pub(super) fn world_view(self, rect: Rect, margin: f32) -> Rect {
        let grown = rect.expand(margin);
        let min = self.screen_to_world(rect, grown.min);
        let max = self.screen_to_world(rect, grown.max);
        Rect::from_min_max(min.to_pos2(), max.to_pos2())
    }
}

pub(super) fn blend_color(base: Color32, overlay: Color32, amount: f32) -> Color32 {
    let amount = amount.clamp(0.0, 1.0);
    let inverse = 1.0 - amount;

    Color32::from_rgba_unmultiplied(
        ((base.r() as f32 * inverse) + (overlay.r() as f32 * amount)) as u8,
        ((base.g() as f32 * inverse) + (overlay.g() as f32 * amount)) as u8,
        ((base.b() as f32 * inverse) + (overlay.b() as f32 * amount)) as u8,
        ((base.a() as f32 * inverse) + (overlay.a() as f32 * amount)) as u8,
    )
}

pub(super) fn color_to_rgba(color: Color32) -> [f32; 4] {
    let [r, g, b, a] = color.to_srgba_unmultiplied();
    [
        r as f32 / 255.0,
        g as f32 / 255.0,
        b as f32 / 255.0,
        a as f32 / 255.0,
    ]
}

pub(super) fn draw_background(painter: &Painter, rect: Rect, pan: Vec2, zoom: f32) {
    painter.rect_filled(rect, 0.0, Color32::from_rgb(19, 23, 29));

    let step = (56.0 * zoom.clamp(0.6, 1.8)).max(20.0);
    let origin = rect.center() + pan;
    let stroke = Stroke::new(1.0, Color32::from_rgba_unmultiplied(60, 70, 80, 60));

    let mut x = rect.left() + (origin.x - rect.left()).rem_euclid(step);
    while x < rect.right() {
        painter.line_segment([Pos2::new(x, rect.top()), Pos2::new(x, rect.bottom())], stroke);
        x += step;
    }

    let mut y = rect.top() + (origin.y - rect.top()).rem_euclid(step);
    while y < rect.bottom() {
        painter.line_segment([Pos2::new(rect.left(), y), Pos2::new(rect.right(), y)], stroke);
        y += step;
    }
}

pub(super) fn segment_visible(rect: Rect, start: Pos2, end: Pos2) -> bool {
    let min_x = start.x.min(end.x);
    let max_x = start.x.max(end.x);
    let min_y = start.y.min(end.y);
    let max_y = start.y.max(end.y);

    if max_x < rect.left() || min_x > rect.right() || max_y < rect.top() || min_y > rect.bottom() {
        return false;
    }

    if rect.contains(start) || rect.contains(end) {
        return true;
    }

    let top_left = rect.left_top();
    let top_right = rect.right_top();
    let bottom_left = rect.left_bottom();
    let bottom_right = rect.right_bottom();

    segments_intersect(start, end, top_left, top_right)
        || segments_intersect(start, end, top_right, bottom_right)
        || segments_intersect(start, end, bottom_right, bottom_left)
        || segments_intersect(start, end, bottom_left, top_left)
}

fn segments_intersect(a1: Pos2, a2: Pos2, b1: Pos2, b2: Pos2) -> bool {
    fn cross(o: Pos2, a: Pos2, b: Pos2) -> f32 {
        let oa = a - o;
        let ob = b - o;
        (oa.x * ob.y) - (oa.y * ob.x)
    }

    let c1 = cross(a1, a2, b1);
    let c2 = cross(a1, a2, b2);
    let c3 = cross(b1, b2, a1);
    let c4 = cross(b1, b2, a2);

    (c1 <= 0.0 && c2 >= 0.0 || c1 >= 0.0 && c2 <= 0.0)
        && (c3 <= 0.0 && c4 >= 0.0 || c3 >= 0.0 && c4 <= 0.0)
}

pub(super) fn world_to_screen(rect: Rect, pan: Vec2, zoom: f32, world: Vec2) -> Pos2 {
    rect.center() + pan + world * zoom
}

pub(super) fn screen_to_world(rect: Rect, pan: Vec2, zoom: f32, screen: Pos2) -> Vec2 {
    (screen - rect.center() - pan) / zoom
}

pub(super) const SMALL_RADIUS: f32 = 9.0;
pub(super) const MEDIUM_RADIUS: f32 = 13.0;
pub(super) const LARGE_RADIUS: f32 = 18.0;

pub(super) fn node_radius(node: &ModNode) -> f32 {
    if node.is_library || node.dependent_count > 5 {
        LARGE_RADIUS
    } else if node.dependent_count > 2 {
        MEDIUM_RADIUS
    } else {
        SMALL_RADIUS
    }
}

pub(super) fn node_color(node: &ModNode) -> Color32 {
    if !node.enabled {
        return Color32::from_rgb(112, 116, 124);
    }
    if node.is_library {
        return Color32::from_rgb(176, 128, 236);
    }

    match node.source.to_ascii_lowercase().as_str() {
        "modrinth" => Color32::from_rgb(48, 178, 110),
        "curseforge" => Color32::from_rgb(241, 100, 54),
        "local" | "file" => Color32::from_rgb(86, 156, 228),
        "git" | "github" => Color32::from_rgb(210, 190, 90),
        _ => Color32::from_rgb(70, 190, 196),
    }
}

pub(super) const MISSING_EDGE_COLOR: Color32 = Color32::from_rgb(236, 172, 64);

pub(super) fn edge_color(edge: &DependencyEdge, highlight_problems: bool) -> Color32 {
    match edge.dependency_type {
        DependencyType::Incompatible => {
            if highlight_problems && (edge.is_problem || !edge.is_satisfied) {
                Color32::from_rgb(255, 64, 64)
            } else {
                Color32::from_rgba_unmultiplied(150, 56, 60, 170)
            }
        }
        DependencyType::Optional => Color32::from_rgba_unmultiplied(96, 110, 128, 120),
        DependencyType::Required => {
            if highlight_problems && edge.is_problem {
                Color32::from_rgb(244, 140, 72)
            } else {
                Color32::from_rgba_unmultiplied(150, 156, 166, 190)
            }
        }
    }
}

pub(super) fn unit_direction(seed: (f32, f32), fallback_index: usize) -> Vec2 {
    let direction = vec2(seed.0, seed.1);
    if direction.length_sq() > 0.0001 {
        direction.normalized()
    } else {
        let angle = ((fallback_index as f32) * 0.618_034 + 0.11) * std::f32::consts::TAU;
        vec2(angle.cos(), angle.sin())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::fixtures::{edge, node};

    fn canvas() -> Rect {
        Rect::from_min_size(Pos2::new(0.0, 0.0), vec2(800.0, 600.0))
    }

    #[test]
    fn zoom_at_keeps_cursor_world_point_fixed() {
        let rect = canvas();
        let mut camera = Camera {
            pan: vec2(35.0, -20.0),
            zoom: 1.3,
        };
        let pointer = Pos2::new(612.0, 143.0);
        let world = camera.screen_to_world(rect, pointer);

        for factor in [1.15, 1.15, 0.85, 0.5, 3.0] {
            camera.zoom_at(rect, pointer, factor, 0.05, 6.0);
            let projected = camera.world_to_screen(rect, world);
            assert!((projected - pointer).length() < 1e-3, "{projected:?}");
        }
    }

    #[test]
    fn zoom_is_clamped() {
        let rect = canvas();
        let mut camera = Camera::default();
        camera.zoom_at(rect, rect.center(), 100.0, 0.05, 6.0);
        assert_eq!(camera.zoom, 6.0);
        camera.zoom_at(rect, rect.center(), 0.0001, 0.05, 6.0);
        assert_eq!(camera.zoom, 0.05);
    }

    #[test]
    fn fit_frames_bounds() {
        let rect = canvas();
        let mut camera = Camera::default();
        let bounds = Rect::from_min_max(Pos2::new(100.0, 100.0), Pos2::new(500.0, 300.0));
        camera.fit(rect, bounds, 0.05, 6.0);
        let top_left = camera.world_to_screen(rect, bounds.min.to_vec2());
        let bottom_right = camera.world_to_screen(rect, bounds.max.to_vec2());
        assert!(rect.contains(top_left) && rect.contains(bottom_right));
        let center = camera.world_to_screen(rect, bounds.center().to_vec2());
        assert!((center - rect.center()).length() < 1e-3);
    }

    #[test]
    fn radius_tracks_importance() {
        let mut library = node("lib", 0, 0);
        library.is_library = true;
        assert_eq!(node_radius(&library), LARGE_RADIUS);
        assert_eq!(node_radius(&node("popular", 0, 6)), LARGE_RADIUS);
        assert_eq!(node_radius(&node("shared", 0, 3)), MEDIUM_RADIUS);
        assert_eq!(node_radius(&node("leaf", 2, 1)), SMALL_RADIUS);
    }

    #[test]
    fn colors_follow_state_before_source() {
        let mut disabled = node("off", 0, 0);
        disabled.enabled = false;
        disabled.is_library = true;
        assert_eq!(node_color(&disabled), Color32::from_rgb(112, 116, 124));

        let mut conflict = edge("a", "b", DependencyType::Incompatible);
        conflict.is_problem = true;
        assert_eq!(edge_color(&conflict, true), Color32::from_rgb(255, 64, 64));
        assert_ne!(edge_color(&conflict, false), Color32::from_rgb(255, 64, 64));
        assert_ne!(
            edge_color(&edge("a", "b", DependencyType::Optional), true),
            edge_color(&edge("a", "b", DependencyType::Required), true)
        );
    }

    #[test]
    fn segment_crossing_view_is_visible() {
        let rect = canvas();
        assert!(segment_visible(rect, Pos2::new(-50.0, 300.0), Pos2::new(900.0, 300.0)));
        assert!(!segment_visible(rect, Pos2::new(-50.0, -10.0), Pos2::new(-10.0, -50.0)));
    }
}
