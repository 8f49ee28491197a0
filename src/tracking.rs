// src/tracking.rs - Per-frame ring finger tracking loop
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::detection::{DetectionMachine, DetectionState, LossPolicy};
use crate::geometry::{resolve_frame, GeometryConfig, JitterBand, PlacementTransform};
use crate::mediapipe_bridge::LandmarkSource;
use crate::scheduler::{DisplayLink, TickToken};
use crate::video::{VideoFeed, VideoFrame};

/// Simulated scan: progress step and how often it is applied.
const SCAN_STEP: f64 = 2.0;
const SCAN_STEP_INTERVAL_MS: f64 = 50.0;
/// Canned sprite width for a 640 px wide frame.
const SIMULATED_WIDTH_AT_640: f64 = 45.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScanMode {
    /// Per-tick detection drives the state.
    #[default]
    Live,
    /// Timed progress, then a canned placement. No detector involved.
    Simulated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    pub mode: ScanMode,
    pub geometry: GeometryConfig,
    pub loss_policy: LossPolicy,
    /// Weight kept from the previous placement, 0.0 disables smoothing.
    pub smoothing: f64,
    /// Only changes inside this band are smoothed.
    pub jitter: JitterBand,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            mode: ScanMode::Live,
            geometry: GeometryConfig::default(),
            loss_policy: LossPolicy::Immediate,
            smoothing: 0.0,
            jitter: JitterBand::default(),
        }
    }
}

/// Cosmetic ring size badge. Not derived from any measurement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RingSizeReadout {
    pub turkish: u32,
    pub us: u32,
    pub eu: u32,
    pub uk: String,
}

impl Default for RingSizeReadout {
    fn default() -> Self {
        Self {
            turkish: 17,
            us: 7,
            eu: 54,
            uk: "N".to_string(),
        }
    }
}

/// What the loop publishes to the overlay and UI once per tick.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrackingSnapshot {
    pub state: DetectionState,
    /// Present only while DETECTED with a fresh placement.
    pub transform: Option<PlacementTransform>,
    pub scan_progress: u8,
    pub ring_size: Option<RingSizeReadout>,
    pub frame_size: (u32, u32),
    /// Sequence of the video frame the state was computed from.
    pub frame_sequence: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// No tick was due.
    Idle,
    /// Video frame unchanged since the last tick.
    Skipped,
    Detected(PlacementTransform),
    Missed,
    /// The detector errored; handled like a miss.
    Failed,
    Scanning(u8),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackingStats {
    pub ticks: u64,
    pub detector_calls: u64,
    pub skipped: u64,
    pub failures: u64,
}

enum Strategy {
    AwaitingSource,
    Live(Box<dyn LandmarkSource>),
    Simulated { started_ms: Option<f64> },
}

pub struct TrackingLoop {
    config: TrackingConfig,
    strategy: Strategy,
    link: DisplayLink,
    token: Option<TickToken>,
    machine: DetectionMachine,
    transform: Option<PlacementTransform>,
    ring_size: Option<RingSizeReadout>,
    frame_size: (u32, u32),
    last_frame_time: Option<f64>,
    /// Frame the last detection ran on.
    tracked_frame: Option<VideoFrame>,
    last_detect_ms: Option<u64>,
    stats: TrackingStats,
    closed: bool,
}

impl TrackingLoop {
    pub fn new(config: TrackingConfig) -> Self {
        let strategy = match config.mode {
            ScanMode::Live => Strategy::AwaitingSource,
            ScanMode::Simulated => Strategy::Simulated { started_ms: None },
        };
        Self {
            machine: DetectionMachine::new(config.loss_policy),
            config,
            strategy,
            link: DisplayLink::new(),
            token: None,
            transform: None,
            ring_size: None,
            frame_size: (0, 0),
            last_frame_time: None,
            tracked_frame: None,
            last_detect_ms: None,
            stats: TrackingStats::default(),
            closed: false,
        }
    }

    pub fn with_source(config: TrackingConfig, source: Box<dyn LandmarkSource>) -> Self {
        let mut tracking = Self::new(config);
        tracking.attach_source(source);
        tracking
    }

    /// Hands the initialized detector to a live loop. Replaces (and closes)
    /// any previous detector.
    pub fn attach_source(&mut self, source: Box<dyn LandmarkSource>) {
        if self.config.mode != ScanMode::Live {
            warn!("Ignoring landmark source '{}' in simulated mode", source.name());
            return;
        }
        if let Strategy::Live(old) = &mut self.strategy {
            old.close();
        }
        info!("Landmark source '{}' attached", source.name());
        self.strategy = Strategy::Live(source);
    }

    pub fn has_source(&self) -> bool {
        matches!(self.strategy, Strategy::Live(_) | Strategy::Simulated { .. })
    }

    pub fn mode(&self) -> ScanMode {
        self.config.mode
    }

    pub fn is_running(&self) -> bool {
        self.token.is_some()
    }

    pub fn stats(&self) -> TrackingStats {
        self.stats
    }

    pub fn state(&self) -> DetectionState {
        self.machine.state()
    }

    pub fn snapshot(&self) -> TrackingSnapshot {
        let state = self.machine.state();
        TrackingSnapshot {
            state,
            transform: if state == DetectionState::Detected { self.transform } else { None },
            scan_progress: self.machine.scan_progress(),
            ring_size: self.ring_size.clone(),
            frame_size: self.frame_size,
            frame_sequence: self.tracked_frame.as_ref().map(|f| f.sequence),
        }
    }

    pub fn tracked_frame(&self) -> Option<&VideoFrame> {
        self.tracked_frame.as_ref()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn preconditions_hold(&self, feed: &dyn VideoFeed) -> bool {
        !self.closed && self.has_source() && feed.is_ready() && feed.is_playing()
    }

    /// Requests the first tick once the detector is ready and the feed has
    /// decoded a frame. Returns whether the loop is running.
    pub fn start(&mut self, feed: &dyn VideoFeed) -> bool {
        if self.token.is_some() {
            return true;
        }
        if !self.preconditions_hold(feed) {
            return false;
        }
        debug!("Tracking loop started");
        self.token = Some(self.link.request_tick());
        true
    }

    /// Cancels the pending tick. Detection state is left as is.
    pub fn stop(&mut self) {
        if let Some(token) = self.token.take() {
            self.link.cancel(token);
            debug!("Tracking loop stopped");
        }
    }

    /// Stops and returns to SCANNING with no placement, as on camera switch.
    pub fn reset(&mut self) {
        self.stop();
        self.machine.reset();
        self.transform = None;
        self.ring_size = None;
        self.last_frame_time = None;
        self.tracked_frame = None;
        if let Strategy::Simulated { started_ms } = &mut self.strategy {
            *started_ms = None;
        }
    }

    /// Ends the session: cancels the pending tick and closes the detector.
    pub fn shutdown(&mut self) {
        self.stop();
        if let Strategy::Live(source) = &mut self.strategy {
            source.close();
        }
        self.strategy = Strategy::AwaitingSource;
        self.machine.reset();
        self.transform = None;
        self.tracked_frame = None;
        self.closed = true;
    }

    /// Display-frame callback. Runs the pending tick, if any, and requests
    /// the next one while the feed keeps playing. A halted feed drops the
    /// loop back to SCANNING with no placement.
    pub fn pump(&mut self, feed: &dyn VideoFeed, now_ms: f64) -> TickOutcome {
        let Some(token) = self.token.take() else {
            return TickOutcome::Idle;
        };
        if !self.link.fire(&token) {
            return TickOutcome::Idle;
        }
        if !self.preconditions_hold(feed) {
            debug!("Tracking loop halted: feed not playing");
            self.reset();
            return TickOutcome::Idle;
        }

        let outcome = self.tick(feed, now_ms);
        self.token = Some(self.link.request_tick());
        outcome
    }

    fn tick(&mut self, feed: &dyn VideoFeed, now_ms: f64) -> TickOutcome {
        self.stats.ticks += 1;
        self.frame_size = (feed.video_width(), feed.video_height());

        if matches!(self.strategy, Strategy::Simulated { .. }) {
            return self.simulated_tick(now_ms);
        }

        let current_time = feed.current_time();
        if self.last_frame_time == Some(current_time) {
            self.stats.skipped += 1;
            return TickOutcome::Skipped;
        }
        let Some(frame) = feed.current_frame() else {
            self.stats.skipped += 1;
            return TickOutcome::Skipped;
        };
        self.last_frame_time = Some(current_time);

        let timestamp_ms = self.next_detect_timestamp(now_ms);
        let Strategy::Live(source) = &mut self.strategy else {
            return TickOutcome::Idle;
        };
        self.stats.detector_calls += 1;

        let detected = source.detect(&frame, timestamp_ms);
        self.tracked_frame = Some(frame);
        match detected {
            Ok(Some(hand)) => {
                let (width, height) = self.frame_size;
                let resolved = resolve_frame(&hand, width, height, &self.config.geometry);
                let placement = match self.transform {
                    Some(previous) if self.config.smoothing > 0.0 => {
                        previous.smooth_toward(&resolved, self.config.smoothing, &self.config.jitter)
                    }
                    _ => resolved,
                };
                self.transform = Some(placement);
                self.machine.on_found();
                TickOutcome::Detected(placement)
            }
            Ok(None) => {
                self.transform = None;
                self.machine.on_missing();
                TickOutcome::Missed
            }
            Err(e) => {
                warn!("Detection failed at {} ms: {}", timestamp_ms, e);
                self.stats.failures += 1;
                self.transform = None;
                self.machine.on_missing();
                TickOutcome::Failed
            }
        }
    }

    fn simulated_tick(&mut self, now_ms: f64) -> TickOutcome {
        if self.machine.is_detected() {
            return self.transform.map_or(TickOutcome::Missed, TickOutcome::Detected);
        }

        let Strategy::Simulated { started_ms } = &mut self.strategy else {
            return TickOutcome::Idle;
        };
        let started = *started_ms.get_or_insert(now_ms);
        let steps = ((now_ms - started).max(0.0) / SCAN_STEP_INTERVAL_MS).floor();
        let progress = (steps * SCAN_STEP).min(100.0) as u8;
        self.machine.set_scan_progress(progress);

        if progress < 100 {
            return TickOutcome::Scanning(progress);
        }

        let placement = self.canned_placement();
        self.transform = Some(placement);
        self.ring_size = Some(RingSizeReadout::default());
        self.machine.on_found();
        info!("Simulated scan complete");
        TickOutcome::Detected(placement)
    }

    /// Frame centre, width 45 px at 640 px, upright.
    fn canned_placement(&self) -> PlacementTransform {
        let (width, height) = self.frame_size;
        let (width, height) = (f64::from(width.max(1)), f64::from(height.max(1)));
        PlacementTransform {
            center_x: width / 2.0,
            center_y: height / 2.0,
            width: SIMULATED_WIDTH_AT_640 * width / 640.0,
            angle_degrees: 0.0,
        }
    }

    /// Video-mode detectors reject non-increasing timestamps.
    fn next_detect_timestamp(&mut self, now_ms: f64) -> u64 {
        let candidate = now_ms.max(0.0) as u64;
        let timestamp = match self.last_detect_ms {
            Some(last) if candidate <= last => last + 1,
            _ => candidate,
        };
        self.last_detect_ms = Some(timestamp);
        timestamp
    }
}

impl Drop for TrackingLoop {
    fn drop(&mut self) {
        if !self.closed {
            self.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detector_timestamps_strictly_increase() {
        let mut tracking = TrackingLoop::new(TrackingConfig::default());
        assert_eq!(tracking.next_detect_timestamp(16.7), 16);
        assert_eq!(tracking.next_detect_timestamp(16.9), 17);
        assert_eq!(tracking.next_detect_timestamp(10.0), 18);
        assert_eq!(tracking.next_detect_timestamp(50.0), 50);
    }

    #[test]
    fn canned_placement_scales_with_frame() {
        let mut tracking = TrackingLoop::new(TrackingConfig {
            mode: ScanMode::Simulated,
            ..TrackingConfig::default()
        });
        tracking.frame_size = (1280, 720);
        let placement = tracking.canned_placement();
        assert_eq!((placement.center_x, placement.center_y), (640.0, 360.0));
        assert_eq!(placement.width, 90.0);
        assert_eq!(placement.angle_degrees, 0.0);
    }

    #[test]
    fn live_loop_without_source_has_no_source() {
        let tracking = TrackingLoop::new(TrackingConfig::default());
        assert!(!tracking.has_source());
        assert!(!tracking.is_running());
        assert_eq!(tracking.snapshot(), TrackingSnapshot::default());
    }

    #[test]
    fn config_parses_debounced_policy() {
        let config: TrackingConfig =
            serde_json::from_str(r#"{ "loss_policy": { "after_misses": 3 }, "smoothing": 0.25 }"#).unwrap();
        assert_eq!(config.loss_policy, LossPolicy::AfterMisses(3));
        assert_eq!(config.mode, ScanMode::Live);
        assert_eq!(config.smoothing, 0.25);
        assert_eq!(config.jitter, JitterBand::default());
    }

    #[test]
    fn config_parses_partial_jitter_band() {
        let config: TrackingConfig =
            serde_json::from_str(r#"{ "smoothing": 0.8, "jitter": { "max_shift_px": 6.0 } }"#).unwrap();
        assert_eq!(config.jitter.max_shift_px, 6.0);
        assert_eq!(config.jitter.max_turn_degrees, 3.0);
    }
}
