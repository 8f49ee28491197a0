// src/ui.rs - Theme, ring sprite textures and the try-on widgets
use std::collections::HashSet;

use eframe::egui::load::{SizeHint, SizedTexture, TexturePoll};
use eframe::egui::{self, Color32, Pos2, Rect, Stroke, Vec2};
use ring_tryon::detection::DetectionState;
use ring_tryon::overlay::{self, ViewMapping};
use ring_tryon::tracking::{RingSizeReadout, TrackingSnapshot};
use ring_tryon::video::VideoFrame;
use tracing::warn;
use usvg::TreeParsing;

const SPRITE_SIZE: u32 = 256;

/// Drawn when the selected product has no usable image.
const PLACEHOLDER_RING_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="256" height="256" viewBox="0 0 256 256">
  <defs>
    <linearGradient id="gold" x1="0" y1="0" x2="1" y2="1">
      <stop offset="0" stop-color="#f8e08e"/>
      <stop offset="0.5" stop-color="#c9a227"/>
      <stop offset="1" stop-color="#8a6d1c"/>
    </linearGradient>
  </defs>
  <ellipse cx="128" cy="150" rx="96" ry="44" fill="none" stroke="url(#gold)" stroke-width="22"/>
  <path d="M128 34 L150 70 L128 96 L106 70 Z" fill="#e8f4ff" stroke="#9fb8cc" stroke-width="3"/>
</svg>"##;

#[derive(Debug, Clone)]
pub struct Theme {
    pub primary: Color32,
    pub accent: Color32,
    pub background: Color32,
    pub surface: Color32,
    pub error: Color32,
    pub success: Color32,
    pub text_primary: Color32,
    pub text_secondary: Color32,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            primary: Color32::from_rgb(201, 162, 39),
            accent: Color32::from_rgb(70, 130, 240),
            background: Color32::from_rgb(20, 20, 25),
            surface: Color32::from_rgb(30, 30, 35),
            error: Color32::from_rgb(244, 67, 54),
            success: Color32::from_rgb(76, 175, 80),
            text_primary: Color32::WHITE,
            text_secondary: Color32::from_rgb(200, 200, 200),
        }
    }
}

pub struct UIComponents {
    pub theme: Theme,
    placeholder: Option<egui::TextureHandle>,
    /// Image URIs that failed to load, so each failure is logged once.
    failed_images: HashSet<String>,
    scan_spin: f32,
}

impl UIComponents {
    pub fn new(ctx: &egui::Context) -> Self {
        let placeholder = match render_svg_rgba(PLACEHOLDER_RING_SVG, SPRITE_SIZE) {
            Ok(rgba) => {
                let size = [SPRITE_SIZE as usize, SPRITE_SIZE as usize];
                let image = egui::ColorImage::from_rgba_unmultiplied(size, &rgba);
                Some(ctx.load_texture("ring_placeholder", image, Default::default()))
            }
            Err(e) => {
                warn!("Failed to render placeholder ring: {}", e);
                None
            }
        };

        Self {
            theme: Theme::default(),
            placeholder,
            failed_images: HashSet::new(),
            scan_spin: 0.0,
        }
    }

    /// Texture for a product image URI (`https://`, `file://` or `bytes://`)
    /// through egui's loaders. The placeholder stands in while it downloads
    /// and when it cannot be loaded.
    pub fn ring_sprite(&mut self, ctx: &egui::Context, uri: Option<&str>) -> Option<SizedTexture> {
        if let Some(uri) = uri.filter(|uri| !self.failed_images.contains(*uri)) {
            let hint = SizeHint::Size(SPRITE_SIZE, SPRITE_SIZE);
            match ctx.try_load_texture(uri, egui::TextureOptions::LINEAR, hint) {
                Ok(TexturePoll::Ready { texture }) => return Some(texture),
                Ok(TexturePoll::Pending { .. }) => {}
                Err(e) => {
                    warn!("Failed to load ring image {}: {}", uri, e);
                    self.failed_images.insert(uri.to_string());
                }
            }
        }
        self.placeholder.as_ref().map(SizedTexture::from_handle)
    }

    /// Spinner and progress bar shown while no hand is detected.
    pub fn draw_scanning_indicator(&mut self, ui: &mut egui::Ui, rect: Rect, snapshot: &TrackingSnapshot) {
        self.scan_spin += ui.input(|i| i.unstable_dt) * 3.0;

        let painter = ui.painter_at(rect);
        let center = rect.center();
        let radius = rect.width().min(rect.height()) * 0.12;
        painter.circle_stroke(center, radius, Stroke::new(3.0, self.theme.surface));
        let start = self.scan_spin;
        draw_arc(&painter, center, radius, start, start + 1.5, self.theme.primary, 4.0);

        let title = match snapshot.state {
            DetectionState::Lost => "Hand lost, show your hand again",
            _ => "Place your hand in front of the camera",
        };
        painter.text(
            Pos2::new(center.x, center.y + radius + 24.0),
            egui::Align2::CENTER_CENTER,
            title,
            egui::FontId::proportional(18.0),
            self.theme.text_primary,
        );

        if snapshot.state == DetectionState::Scanning && snapshot.scan_progress > 0 {
            let bar = Rect::from_center_size(
                Pos2::new(center.x, center.y + radius + 56.0),
                Vec2::new(rect.width() * 0.4, 8.0),
            );
            painter.rect_filled(bar, egui::Rounding::same(4.0), self.theme.surface);
            let fill = Rect::from_min_size(
                bar.min,
                Vec2::new(bar.width() * snapshot.scan_progress as f32 / 100.0, bar.height()),
            );
            painter.rect_filled(fill, egui::Rounding::same(4.0), self.theme.primary);
        }
    }

    pub fn draw_detected_badge(&self, ui: &egui::Ui, rect: Rect) {
        let badge = Rect::from_min_size(rect.min + Vec2::new(12.0, 12.0), Vec2::new(150.0, 28.0));
        let painter = ui.painter_at(rect);
        painter.rect_filled(badge, egui::Rounding::same(14.0), self.theme.success);
        painter.text(
            badge.center(),
            egui::Align2::CENTER_CENTER,
            "Hand detected",
            egui::FontId::proportional(14.0),
            self.theme.text_primary,
        );
    }

    pub fn draw_ring_size(&self, ui: &mut egui::Ui, size: &RingSizeReadout) {
        egui::Frame::none()
            .fill(self.theme.surface)
            .rounding(egui::Rounding::same(8.0))
            .inner_margin(egui::Margin::same(10.0))
            .show(ui, |ui| {
                ui.label(egui::RichText::new("Your ring size").color(self.theme.text_secondary));
                ui.label(
                    egui::RichText::new(size.turkish.to_string())
                        .size(28.0)
                        .strong()
                        .color(self.theme.primary),
                );
                ui.horizontal(|ui| {
                    ui.label(format!("US {}", size.us));
                    ui.separator();
                    ui.label(format!("EU {}", size.eu));
                    ui.separator();
                    ui.label(format!("UK {}", size.uk));
                });
            });
    }
}

fn draw_arc(
    painter: &egui::Painter,
    center: Pos2,
    radius: f32,
    start_angle: f32,
    end_angle: f32,
    color: Color32,
    thickness: f32,
) {
    let points_count = (((end_angle - start_angle).abs() * 50.0) as usize).max(1);
    let points: Vec<Pos2> = (0..=points_count)
        .map(|i| {
            let t = i as f32 / points_count as f32;
            let angle = start_angle + (end_angle - start_angle) * t;
            Pos2::new(center.x + radius * angle.cos(), center.y + radius * angle.sin())
        })
        .collect();

    painter.add(egui::Shape::line(points, Stroke::new(thickness, color)));
}

fn render_svg_rgba(svg_data: &str, size: u32) -> anyhow::Result<Vec<u8>> {
    let opt = usvg::Options::default();
    let tree = usvg::Tree::from_str(svg_data, &opt)?;

    let pixmap_size = tree.size.to_int_size();
    let mut pixmap = resvg::tiny_skia::Pixmap::new(size, size)
        .ok_or_else(|| anyhow::anyhow!("invalid pixmap size {}", size))?;

    let scale = size as f32 / pixmap_size.width().max(pixmap_size.height()) as f32;
    let transform = resvg::tiny_skia::Transform::from_scale(scale, scale);
    resvg::Tree::from_usvg(&tree).render(transform, &mut pixmap.as_mut());

    // tiny_skia stores premultiplied alpha
    Ok(pixmap
        .pixels()
        .iter()
        .flat_map(|p| {
            let c = p.demultiply();
            [c.red(), c.green(), c.blue(), c.alpha()]
        })
        .collect())
}

/// Live camera picture with the ring overlay on top.
#[derive(Default)]
pub struct VideoWidget {
    texture: Option<egui::TextureHandle>,
    last_sequence: Option<u64>,
    video_size: (u32, u32),
}

impl VideoWidget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update_frame(&mut self, ctx: &egui::Context, frame: &VideoFrame) {
        if self.last_sequence == Some(frame.sequence) {
            return;
        }
        let size = [frame.width() as usize, frame.height() as usize];
        let image = egui::ColorImage::from_rgb(size, frame.image.as_raw());
        match &mut self.texture {
            Some(texture) => texture.set(image, Default::default()),
            None => self.texture = Some(ctx.load_texture("video_frame", image, Default::default())),
        }
        self.last_sequence = Some(frame.sequence);
        self.video_size = (frame.width(), frame.height());
    }

    pub fn clear(&mut self) {
        self.texture = None;
        self.last_sequence = None;
        self.video_size = (0, 0);
    }

    /// Paints the frame and, when detected, the sprite with `caption` under
    /// it. Returns the video rect.
    pub fn show(
        &self,
        ui: &mut egui::Ui,
        snapshot: &TrackingSnapshot,
        sprite: Option<SizedTexture>,
        caption: Option<&str>,
    ) -> Rect {
        let (available, _response) = ui.allocate_exact_size(ui.available_size(), egui::Sense::hover());
        let (width, height) = self.video_size;
        let rect = overlay::fit_rect(available, width, height);

        let Some(texture) = &self.texture else {
            ui.painter().rect_filled(available, egui::Rounding::same(4.0), Color32::from_rgb(50, 50, 55));
            ui.painter().text(
                available.center(),
                egui::Align2::CENTER_CENTER,
                "No Video Signal",
                egui::FontId::proportional(16.0),
                Color32::from_rgb(150, 150, 155),
            );
            return available;
        };

        ui.painter().image(
            texture.id(),
            rect,
            Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0)),
            Color32::WHITE,
        );

        let mapping = ViewMapping::new(width, height, rect);
        let placement = sprite.and_then(|sprite| {
            overlay::sprite_placement(snapshot, &mapping, sprite.size).map(|placement| (sprite, placement))
        });
        if let Some((sprite, placement)) = placement {
            overlay::paint_sprite(ui, sprite.id, &placement);
            if let Some(caption) = caption {
                ui.painter_at(rect).text(
                    Pos2::new(placement.rect.center().x, placement.rect.bottom() + 6.0),
                    egui::Align2::CENTER_TOP,
                    caption,
                    egui::FontId::proportional(14.0),
                    Color32::WHITE,
                );
            }
        }
        rect
    }
}
