// src/overlay.rs - Maps placements from video pixels onto the widget
use egui::{Pos2, Rect, Vec2};

use crate::detection::DetectionState;
use crate::tracking::TrackingSnapshot;

/// Largest rect with the video's aspect ratio that fits `available`, centred.
pub fn fit_rect(available: Rect, video_width: u32, video_height: u32) -> Rect {
    if video_width == 0 || video_height == 0 {
        return available;
    }
    let aspect = video_width as f32 / video_height as f32;
    let mut size = available.size();
    if size.x / size.y > aspect {
        size.x = size.y * aspect;
    } else {
        size.y = size.x / aspect;
    }
    Rect::from_center_size(available.center(), size)
}

/// Video pixel space to screen space for one painted frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewMapping {
    pub video_size: Vec2,
    pub rect: Rect,
}

impl ViewMapping {
    pub fn new(video_width: u32, video_height: u32, rect: Rect) -> Self {
        Self {
            video_size: Vec2::new(video_width as f32, video_height as f32),
            rect,
        }
    }

    fn scale(&self) -> f32 {
        if self.video_size.x > 0.0 {
            self.rect.width() / self.video_size.x
        } else {
            1.0
        }
    }

    pub fn to_screen(&self, x: f64, y: f64) -> Pos2 {
        let scale = self.scale();
        self.rect.min + Vec2::new(x as f32 * scale, y as f32 * scale)
    }

    pub fn to_screen_len(&self, len: f64) -> f32 {
        len as f32 * self.scale()
    }
}

/// Where to paint the ring sprite this frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpritePlacement {
    pub rect: Rect,
    pub rotation_radians: f32,
}

/// `image_size` scaled to fit inside a `side` x `side` box without distortion.
pub fn contain_size(side: f32, image_size: Vec2) -> Vec2 {
    if image_size.x <= 0.0 || image_size.y <= 0.0 {
        return Vec2::splat(side);
    }
    image_size * (side / image_size.x.max(image_size.y))
}

/// Sprite placement for the snapshot, or `None` when nothing should be drawn.
/// The image is contained in a square box as wide as the placement.
pub fn sprite_placement(
    snapshot: &TrackingSnapshot,
    mapping: &ViewMapping,
    image_size: Vec2,
) -> Option<SpritePlacement> {
    if snapshot.state != DetectionState::Detected {
        return None;
    }
    let transform = snapshot.transform.filter(|t| t.is_renderable())?;
    let center = mapping.to_screen(transform.center_x, transform.center_y);
    let side = mapping.to_screen_len(transform.width);
    Some(SpritePlacement {
        rect: Rect::from_center_size(center, contain_size(side, image_size)),
        rotation_radians: (transform.angle_degrees as f32).to_radians(),
    })
}

/// Paints the sprite rotated about its own centre.
pub fn paint_sprite(ui: &egui::Ui, texture: egui::TextureId, placement: &SpritePlacement) {
    let sized = egui::load::SizedTexture::new(texture, placement.rect.size());
    egui::Image::from_texture(sized)
        .rotate(placement.rotation_radians, Vec2::splat(0.5))
        .paint_at(ui, placement.rect);
}
