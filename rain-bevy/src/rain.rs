//! Draws the [`ParticleField`] behind the egui panels.

use bevy::prelude::*;
use bevy_egui::{egui, EguiContexts};
use rain_core::particles::{FrameEffects, RainStroke};
use rain_core::{Mood, ParticleField};

/// Background color behind the rain.
pub const NIGHT: egui::Color32 = egui::Color32::from_rgb(8, 10, 16);

/// Peak opacity of the fog at the bottom edge.
const FOG_ALPHA: u8 = 204;

#[derive(Resource)]
pub struct RainField {
    field: ParticleField,
    /// Strokes of the previous frame, redrawn faintly on trail frames.
    previous: Vec<RainStroke>,
}

impl RainField {
    pub fn new() -> Self {
        Self {
            field: ParticleField::from_entropy(),
            previous: Vec::new(),
        }
    }

    pub fn set_mood(&mut self, mood: Mood) {
        self.field.set_mood(mood);
    }

    pub fn mood(&self) -> Mood {
        self.field.mood()
    }
}

impl Default for RainField {
    fn default() -> Self {
        Self::new()
    }
}

/// Advance the rain one frame and paint it on the background layer.
pub fn draw_rain(mut contexts: EguiContexts, mut rain: ResMut<RainField>) {
    let ctx = contexts.ctx_mut();
    let screen = ctx.screen_rect();
    rain.field.resize(screen.width(), screen.height());

    let effects = rain.field.tick();
    let painter = ctx.layer_painter(egui::LayerId::background());
    painter.rect_filled(screen, 0.0, NIGHT);

    let [r, g, b] = rain.field.profile().color;
    if effects.trail {
        for stroke in &rain.previous {
            paint_stroke(&painter, stroke, [r, g, b], 0.3);
        }
    }

    let strokes: Vec<RainStroke> = rain.field.strokes().collect();
    for stroke in &strokes {
        paint_stroke(&painter, stroke, [r, g, b], 1.0);
    }
    rain.previous = strokes;

    paint_effects(&painter, screen, &effects, [r, g, b]);
}

fn paint_stroke(painter: &egui::Painter, stroke: &RainStroke, [r, g, b]: [u8; 3], fade: f32) {
    let alpha = (stroke.alpha * fade * 255.0) as u8;
    painter.line_segment(
        [
            egui::pos2(stroke.from[0], stroke.from[1]),
            egui::pos2(stroke.to[0], stroke.to[1]),
        ],
        egui::Stroke::new(
            stroke.width,
            egui::Color32::from_rgba_unmultiplied(r, g, b, alpha),
        ),
    );
}

fn paint_effects(
    painter: &egui::Painter,
    screen: egui::Rect,
    effects: &FrameEffects,
    [r, g, b]: [u8; 3],
) {
    if let Some(artifact) = effects.artifact {
        let rect = egui::Rect::from_min_size(
            egui::pos2(artifact.x, artifact.y),
            egui::vec2(artifact.width, artifact.height),
        );
        let alpha = (artifact.alpha * 255.0) as u8;
        painter.rect_filled(rect, 0.0, egui::Color32::from_rgba_unmultiplied(r, g, b, alpha));
    }

    if effects.fog {
        painter.add(egui::Shape::mesh(fog_mesh(screen)));
    }
}

/// Vertical gradient over the lower half, clear at the middle and dark at the bottom.
fn fog_mesh(screen: egui::Rect) -> egui::Mesh {
    let top = egui::Color32::from_rgba_unmultiplied(5, 5, 5, 0);
    let bottom = egui::Color32::from_rgba_unmultiplied(5, 5, 5, FOG_ALPHA);
    let mid = screen.center().y;

    let mut mesh = egui::Mesh::default();
    mesh.colored_vertex(egui::pos2(screen.left(), mid), top);
    mesh.colored_vertex(egui::pos2(screen.right(), mid), top);
    mesh.colored_vertex(screen.right_bottom(), bottom);
    mesh.colored_vertex(screen.left_bottom(), bottom);
    mesh.add_triangle(0, 1, 2);
    mesh.add_triangle(0, 2, 3);
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fog_darkens_toward_bottom() {
        let screen = egui::Rect::from_min_size(egui::Pos2::ZERO, egui::vec2(800.0, 600.0));
        let mesh = fog_mesh(screen);
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.indices.len(), 6);

        for vertex in &mesh.vertices {
            if vertex.pos.y == 300.0 {
                assert_eq!(vertex.color.a(), 0);
            } else {
                assert_eq!(vertex.pos.y, 600.0);
                assert_eq!(vertex.color.a(), FOG_ALPHA);
            }
        }
    }
}
