// src/session.rs - One camera session: feed, tracking loop and detector
use chrono::{DateTime, Local};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::mediapipe_bridge::LandmarkSource;
use crate::tracking::{TickOutcome, TrackingConfig, TrackingLoop, TrackingSnapshot};
use crate::video::{FacingMode, FeedProvider, VideoFeed, VideoFrame};

pub struct TryOnSession<P: FeedProvider> {
    id: Uuid,
    started_at: DateTime<Local>,
    provider: P,
    facing: FacingMode,
    feed: Option<P::Feed>,
    camera_error: Option<String>,
    tracking: TrackingLoop,
}

impl<P: FeedProvider> TryOnSession<P> {
    /// Opens the camera for `facing`. A camera failure is kept and reported
    /// through `camera_error`; the tracking loop then never starts.
    pub fn new(provider: P, facing: FacingMode, config: TrackingConfig) -> Self {
        let mut session = Self {
            id: Uuid::new_v4(),
            started_at: Local::now(),
            provider,
            facing,
            feed: None,
            camera_error: None,
            tracking: TrackingLoop::new(config),
        };
        info!("Session {} started", session.id);
        session.open_feed();
        session
    }

    fn open_feed(&mut self) {
        match self.provider.open(self.facing) {
            Ok(feed) => {
                self.feed = Some(feed);
                self.camera_error = None;
            }
            Err(e) => {
                warn!("Session {}: {}", self.id, e);
                self.camera_error = Some(e.to_string());
            }
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    pub fn facing(&self) -> FacingMode {
        self.facing
    }

    pub fn feed(&self) -> Option<&P::Feed> {
        self.feed.as_ref()
    }

    pub fn camera_error(&self) -> Option<&str> {
        self.camera_error.as_deref()
    }

    pub fn tracking(&self) -> &TrackingLoop {
        &self.tracking
    }

    pub fn attach_source(&mut self, source: Box<dyn LandmarkSource>) {
        self.tracking.attach_source(source);
    }

    pub fn snapshot(&self) -> TrackingSnapshot {
        self.tracking.snapshot()
    }

    /// Frame to paint under the overlay. While tracking this is the frame the
    /// current placement came from, otherwise the feed's latest.
    pub fn display_frame(&self) -> Option<VideoFrame> {
        match self.tracking.tracked_frame() {
            Some(frame) => Some(frame.clone()),
            None => self.feed.as_ref().and_then(|feed| feed.current_frame()),
        }
    }

    /// Display-frame callback: (re)starts the loop once its preconditions
    /// hold, then runs the due tick. A stream that died is released and
    /// reported through `camera_error`.
    pub fn pump(&mut self, now_ms: f64) -> TickOutcome {
        let Some(feed) = self.feed.as_ref() else {
            return TickOutcome::Idle;
        };
        if let Some(reason) = feed.error() {
            warn!("Session {}: camera stream stopped: {}", self.id, reason);
            self.tracking.reset();
            self.feed = None;
            self.camera_error = Some(format!("Camera stream stopped: {}", reason));
            return TickOutcome::Idle;
        }
        if !self.tracking.is_running() && !self.tracking.start(feed) {
            return TickOutcome::Idle;
        }
        self.tracking.pump(feed, now_ms)
    }

    /// Tears down the current stream and opens the opposite camera. Tracking
    /// is back to SCANNING with no placement before the new stream delivers
    /// its first frame.
    pub fn switch_camera(&mut self) -> Result<()> {
        self.tracking.reset();
        self.feed = None;
        self.facing = self.facing.opposite();
        info!("Session {}: switching to {}", self.id, self.facing.label());

        match self.provider.open(self.facing) {
            Ok(feed) => {
                self.feed = Some(feed);
                self.camera_error = None;
                Ok(())
            }
            Err(e) => {
                self.camera_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Retries the camera after a failure, keeping the facing mode.
    pub fn reopen_camera(&mut self) {
        self.tracking.reset();
        self.feed = None;
        self.open_feed();
    }

    /// Cancels the pending tick, closes the detector, then releases the camera.
    pub fn teardown(&mut self) {
        self.tracking.shutdown();
        self.feed = None;
        info!("Session {} ended", self.id);
    }
}

impl<P: FeedProvider> Drop for TryOnSession<P> {
    fn drop(&mut self) {
        if !self.tracking.is_closed() {
            self.teardown();
        }
    }
}
