// src/geometry.rs - Ring-finger keypoints to sprite placement
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TryOnError};

/// Hand landmark indices in the standard 21-point hand topology.
pub mod landmarks {
    pub const COUNT: usize = 21;

    pub const WRIST: usize = 0;
    pub const THUMB_CMC: usize = 1;
    pub const THUMB_MCP: usize = 2;
    pub const THUMB_IP: usize = 3;
    pub const THUMB_TIP: usize = 4;
    pub const INDEX_FINGER_MCP: usize = 5;
    pub const INDEX_FINGER_PIP: usize = 6;
    pub const INDEX_FINGER_DIP: usize = 7;
    pub const INDEX_FINGER_TIP: usize = 8;
    pub const MIDDLE_FINGER_MCP: usize = 9;
    pub const MIDDLE_FINGER_PIP: usize = 10;
    pub const MIDDLE_FINGER_DIP: usize = 11;
    pub const MIDDLE_FINGER_TIP: usize = 12;
    pub const RING_FINGER_MCP: usize = 13;
    pub const RING_FINGER_PIP: usize = 14;
    pub const RING_FINGER_DIP: usize = 15;
    pub const RING_FINGER_TIP: usize = 16;
    pub const PINKY_MCP: usize = 17;
    pub const PINKY_PIP: usize = 18;
    pub const PINKY_DIP: usize = 19;
    pub const PINKY_TIP: usize = 20;
}

/// Empirical factor from PIP-MCP joint spacing to a plausible ring diameter.
/// Cosmetic only, not a finger measurement.
pub const DEFAULT_WIDTH_SCALE: f64 = 3.5;

/// Keeps the sprite's upright orientation along the finger axis.
const ANGLE_OFFSET_DEGREES: f64 = 90.0;

/// A normalized keypoint, x and y in [0, 1] relative to the frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HandKeypoint {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl HandKeypoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, z: 0.0 }
    }

    pub fn xy(&self) -> Vector2<f64> {
        Vector2::new(self.x, self.y)
    }
}

/// The 21 keypoints of one detected hand in one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct HandFrame([HandKeypoint; landmarks::COUNT]);

impl HandFrame {
    pub fn new(points: [HandKeypoint; landmarks::COUNT]) -> Self {
        Self(points)
    }

    pub fn from_slice(points: &[HandKeypoint]) -> Result<Self> {
        let points: [HandKeypoint; landmarks::COUNT] = points
            .try_into()
            .map_err(|_| TryOnError::LandmarkCount(points.len()))?;
        Ok(Self(points))
    }

    pub fn point(&self, index: usize) -> HandKeypoint {
        self.0[index]
    }

    pub fn ring_finger_pip(&self) -> HandKeypoint {
        self.0[landmarks::RING_FINGER_PIP]
    }

    pub fn ring_finger_mcp(&self) -> HandKeypoint {
        self.0[landmarks::RING_FINGER_MCP]
    }

    pub fn points(&self) -> &[HandKeypoint] {
        &self.0
    }
}

/// Where and how to draw the ring sprite, in native video pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlacementTransform {
    pub center_x: f64,
    pub center_y: f64,
    /// Sprite side length. Zero for degenerate keypoints.
    pub width: f64,
    pub angle_degrees: f64,
}

impl PlacementTransform {
    /// Zero-width (or non-finite) transforms must not be drawn.
    pub fn is_renderable(&self) -> bool {
        self.width.is_finite() && self.width > 0.0 && self.center_x.is_finite() && self.center_y.is_finite()
    }

    /// Exponential blend toward `next`; `alpha` is the weight kept from `self`.
    pub fn blend(&self, next: &PlacementTransform, alpha: f64) -> PlacementTransform {
        let keep = alpha.clamp(0.0, 1.0);
        let take = 1.0 - keep;
        // Blend the angle through the shortest arc so 179 -> -179 doesn't spin
        let delta = normalize_degrees(next.angle_degrees - self.angle_degrees);
        PlacementTransform {
            center_x: self.center_x * keep + next.center_x * take,
            center_y: self.center_y * keep + next.center_y * take,
            width: self.width * keep + next.width * take,
            angle_degrees: normalize_degrees(self.angle_degrees + delta * take),
        }
    }

    /// Blends toward `next` only while the change stays inside `band`; larger
    /// moves snap. The result never trails `next` by more than the band.
    pub fn smooth_toward(&self, next: &PlacementTransform, alpha: f64, band: &JitterBand) -> PlacementTransform {
        if band.contains(self, next) {
            self.blend(next, alpha)
        } else {
            *next
        }
    }
}

/// Largest change between ticks that smoothing treats as detector jitter.
/// Anything bigger is real motion and is shown as is.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JitterBand {
    /// Centre shift or width change, in video pixels.
    pub max_shift_px: f64,
    pub max_turn_degrees: f64,
}

impl Default for JitterBand {
    fn default() -> Self {
        Self {
            max_shift_px: 4.0,
            max_turn_degrees: 3.0,
        }
    }
}

impl JitterBand {
    pub fn is_valid(&self) -> bool {
        self.max_shift_px.is_finite()
            && self.max_shift_px >= 0.0
            && self.max_turn_degrees.is_finite()
            && self.max_turn_degrees >= 0.0
    }

    fn contains(&self, from: &PlacementTransform, to: &PlacementTransform) -> bool {
        let shift = (to.center_x - from.center_x).hypot(to.center_y - from.center_y);
        let grow = (to.width - from.width).abs();
        let turn = normalize_degrees(to.angle_degrees - from.angle_degrees).abs();
        shift <= self.max_shift_px && grow <= self.max_shift_px && turn <= self.max_turn_degrees
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryConfig {
    pub width_scale: f64,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            width_scale: DEFAULT_WIDTH_SCALE,
        }
    }
}

/// Maps an angle in degrees into (-180, 180].
pub fn normalize_degrees(angle: f64) -> f64 {
    let mut a = angle % 360.0;
    if a > 180.0 {
        a -= 360.0;
    } else if a <= -180.0 {
        a += 360.0;
    }
    a
}

/// Resolves the placement from the ring-finger PIP (`a`) and MCP (`b`) joints.
///
/// The sprite is anchored at the PIP joint so it sits nearer mid-finger.
/// Width is the joint spacing scaled by frame width and `width_scale`; the
/// angle follows the MCP->PIP vector plus a quarter turn.
pub fn resolve(
    a: &HandKeypoint,
    b: &HandKeypoint,
    frame_width_px: u32,
    frame_height_px: u32,
    config: &GeometryConfig,
) -> PlacementTransform {
    let frame_width = f64::from(frame_width_px);
    let frame_height = f64::from(frame_height_px);

    let axis = a.xy() - b.xy();
    let width = axis.norm() * frame_width * config.width_scale;
    let angle = axis.y.atan2(axis.x).to_degrees() + ANGLE_OFFSET_DEGREES;

    PlacementTransform {
        center_x: a.x * frame_width,
        center_y: a.y * frame_height,
        width,
        angle_degrees: normalize_degrees(angle),
    }
}

pub fn resolve_frame(
    hand: &HandFrame,
    frame_width_px: u32,
    frame_height_px: u32,
    config: &GeometryConfig,
) -> PlacementTransform {
    resolve(
        &hand.ring_finger_pip(),
        &hand.ring_finger_mcp(),
        frame_width_px,
        frame_height_px,
        config,
    )
}
