// Scripted stand-ins for the camera and the hand landmarker.
#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::Arc;

use image::RgbImage;
use ring_tryon::error::{Result, TryOnError};
use ring_tryon::geometry::{landmarks, HandFrame, HandKeypoint};
use ring_tryon::mediapipe_bridge::LandmarkSource;
use ring_tryon::video::{FacingMode, FeedProvider, VideoFeed, VideoFrame};

pub const WIDTH: u32 = 640;
pub const HEIGHT: u32 = 480;

struct FeedState {
    time: f64,
    sequence: u64,
    ready: bool,
    playing: bool,
    error: Option<String>,
}

/// Video feed whose clock only moves when the test says so. Clones share state.
#[derive(Clone)]
pub struct FakeFeed {
    state: Rc<RefCell<FeedState>>,
    image: Arc<RgbImage>,
    facing: FacingMode,
}

impl FakeFeed {
    pub fn new(facing: FacingMode) -> Self {
        Self {
            state: Rc::new(RefCell::new(FeedState {
                time: 0.0,
                sequence: 0,
                ready: false,
                playing: true,
                error: None,
            })),
            image: Arc::new(RgbImage::new(WIDTH, HEIGHT)),
            facing,
        }
    }

    /// A feed that has already decoded its first frame.
    pub fn playing(facing: FacingMode) -> Self {
        let feed = Self::new(facing);
        feed.advance();
        feed
    }

    /// Delivers a new decoded frame.
    pub fn advance(&self) {
        let mut state = self.state.borrow_mut();
        state.time += 1.0 / 30.0;
        state.sequence += 1;
        state.ready = true;
    }

    pub fn set_playing(&self, playing: bool) {
        self.state.borrow_mut().playing = playing;
    }

    /// The stream dies the way an unplugged camera does.
    pub fn fail_stream(&self, reason: &str) {
        let mut state = self.state.borrow_mut();
        state.playing = false;
        state.error = Some(reason.to_string());
    }
}

impl VideoFeed for FakeFeed {
    fn current_time(&self) -> f64 {
        self.state.borrow().time
    }

    fn video_width(&self) -> u32 {
        WIDTH
    }

    fn video_height(&self) -> u32 {
        HEIGHT
    }

    fn is_ready(&self) -> bool {
        self.state.borrow().ready
    }

    fn is_playing(&self) -> bool {
        self.state.borrow().playing
    }

    fn current_frame(&self) -> Option<VideoFrame> {
        let state = self.state.borrow();
        state.ready.then(|| VideoFrame {
            image: Arc::clone(&self.image),
            timestamp: state.time,
            sequence: state.sequence,
        })
    }

    fn facing(&self) -> FacingMode {
        self.facing
    }

    fn error(&self) -> Option<String> {
        self.state.borrow().error.clone()
    }
}

/// Opens fresh `FakeFeed`s and remembers them so tests can drive them.
/// Clones share the record of opened feeds.
#[derive(Clone, Default)]
pub struct FakeProvider {
    pub opened: Rc<RefCell<Vec<FakeFeed>>>,
    pub fail: Rc<Cell<bool>>,
}

impl FakeProvider {
    pub fn latest(&self) -> FakeFeed {
        self.opened.borrow().last().cloned().expect("no feed opened")
    }
}

impl FeedProvider for FakeProvider {
    type Feed = FakeFeed;

    fn open(&mut self, facing: FacingMode) -> Result<FakeFeed> {
        if self.fail.get() {
            return Err(TryOnError::Camera("permission denied".into()));
        }
        let feed = FakeFeed::new(facing);
        self.opened.borrow_mut().push(feed.clone());
        Ok(feed)
    }
}

#[derive(Clone, Default)]
pub struct SourceLog {
    pub calls: Rc<Cell<u32>>,
    pub timestamps: Rc<RefCell<Vec<u64>>>,
    pub closed: Rc<Cell<bool>>,
}

/// Landmark source that replays a fixed script, then reports no hand.
pub struct ScriptedSource {
    script: VecDeque<Result<Option<HandFrame>>>,
    log: SourceLog,
}

impl ScriptedSource {
    pub fn new(script: Vec<Result<Option<HandFrame>>>) -> (Self, SourceLog) {
        let log = SourceLog::default();
        let source = Self {
            script: script.into(),
            log: log.clone(),
        };
        (source, log)
    }
}

impl LandmarkSource for ScriptedSource {
    fn detect(&mut self, _frame: &VideoFrame, timestamp_ms: u64) -> Result<Option<HandFrame>> {
        if self.log.closed.get() {
            return Err(TryOnError::Detection("closed".into()));
        }
        self.log.calls.set(self.log.calls.get() + 1);
        self.log.timestamps.borrow_mut().push(timestamp_ms);
        self.script.pop_front().unwrap_or(Ok(None))
    }

    fn close(&mut self) {
        self.log.closed.set(true);
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// A hand whose ring finger PIP sits at `pip` and MCP at `mcp`.
pub fn hand(pip: (f64, f64), mcp: (f64, f64)) -> HandFrame {
    let mut points = [HandKeypoint::new(0.5, 0.8); landmarks::COUNT];
    points[landmarks::RING_FINGER_PIP] = HandKeypoint::new(pip.0, pip.1);
    points[landmarks::RING_FINGER_MCP] = HandKeypoint::new(mcp.0, mcp.1);
    HandFrame::new(points)
}

pub fn reference_hand() -> HandFrame {
    hand((0.5, 0.5), (0.45, 0.45))
}

/// `count` detections of the reference hand.
pub fn found(count: usize) -> Vec<Result<Option<HandFrame>>> {
    (0..count).map(|_| Ok(Some(reference_hand()))).collect()
}
