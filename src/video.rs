// src/video.rs - Camera feed exposed as a video-element-like source
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use image::RgbImage;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution};
use nokhwa::Camera;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::CameraSettings;
use crate::error::{Result, TryOnError};

const OPEN_TIMEOUT: Duration = Duration::from_secs(5);

/// Front ("user") or rear ("environment") camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FacingMode {
    #[default]
    User,
    Environment,
}

impl FacingMode {
    pub fn opposite(self) -> Self {
        match self {
            FacingMode::User => FacingMode::Environment,
            FacingMode::Environment => FacingMode::User,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FacingMode::User => "Front camera",
            FacingMode::Environment => "Rear camera",
        }
    }
}

/// One decoded frame. Cloning shares the pixel buffer.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub image: Arc<RgbImage>,
    /// Seconds since the stream started.
    pub timestamp: f64,
    pub sequence: u64,
}

impl VideoFrame {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// What the tracking loop needs from a playing video source.
pub trait VideoFeed {
    /// Playback position of the latest decoded frame, in seconds.
    fn current_time(&self) -> f64;
    fn video_width(&self) -> u32;
    fn video_height(&self) -> u32;
    /// True once the first frame has been decoded.
    fn is_ready(&self) -> bool;
    /// False when the stream is paused, ended or failed.
    fn is_playing(&self) -> bool;
    fn current_frame(&self) -> Option<VideoFrame>;
    fn facing(&self) -> FacingMode;
    /// Why the stream died, once it has.
    fn error(&self) -> Option<String>;
}

/// Opens feeds for a facing mode. Camera switching goes through this.
pub trait FeedProvider {
    type Feed: VideoFeed;

    fn open(&mut self, facing: FacingMode) -> Result<Self::Feed>;
}

#[derive(Default)]
struct FeedShared {
    latest: Option<VideoFrame>,
    resolution: (u32, u32),
    error: Option<String>,
    ended: bool,
}

/// A `nokhwa` camera captured on its own thread. Only the latest frame is kept.
pub struct CameraFeed {
    facing: FacingMode,
    device_index: u32,
    shared: Arc<Mutex<FeedShared>>,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl CameraFeed {
    pub fn open(settings: &CameraSettings, facing: FacingMode) -> Result<Self> {
        let device_index = settings.device_index(facing);
        let mirror = facing == FacingMode::User && settings.mirror_front;
        let preferences = format_preferences(settings);

        let shared = Arc::new(Mutex::new(FeedShared::default()));
        let running = Arc::new(AtomicBool::new(true));
        let (opened_tx, opened_rx) = mpsc::channel::<std::result::Result<(u32, u32), String>>();

        info!("Opening {} (device {})", facing.label(), device_index);

        let worker = {
            let shared = Arc::clone(&shared);
            let running = Arc::clone(&running);
            std::thread::Builder::new()
                .name(format!("camera-{}", device_index))
                .spawn(move || capture_loop(device_index, preferences, mirror, shared, running, opened_tx))?
        };

        let mut feed = Self {
            facing,
            device_index,
            shared,
            running,
            worker: Some(worker),
        };

        match opened_rx.recv_timeout(OPEN_TIMEOUT) {
            Ok(Ok((width, height))) => {
                info!("Camera {} streaming at {}x{}", device_index, width, height);
                Ok(feed)
            }
            Ok(Err(reason)) => {
                feed.stop();
                Err(TryOnError::Camera(reason))
            }
            Err(_) => {
                feed.stop();
                Err(TryOnError::Camera(format!(
                    "camera {} did not start within {:?}",
                    device_index, OPEN_TIMEOUT
                )))
            }
        }
    }

    pub fn device_index(&self) -> u32 {
        self.device_index
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Camera {} capture thread panicked", self.device_index);
            }
        }
    }

    fn with_shared<T>(&self, f: impl FnOnce(&FeedShared) -> T) -> Option<T> {
        self.shared.lock().ok().map(|s| f(&s))
    }
}

impl VideoFeed for CameraFeed {
    fn current_time(&self) -> f64 {
        self.with_shared(|s| s.latest.as_ref().map_or(0.0, |f| f.timestamp))
            .unwrap_or(0.0)
    }

    fn video_width(&self) -> u32 {
        self.with_shared(|s| s.resolution.0).unwrap_or(0)
    }

    fn video_height(&self) -> u32 {
        self.with_shared(|s| s.resolution.1).unwrap_or(0)
    }

    fn is_ready(&self) -> bool {
        self.with_shared(|s| s.latest.is_some()).unwrap_or(false)
    }

    fn is_playing(&self) -> bool {
        self.running.load(Ordering::SeqCst) && !self.with_shared(|s| s.ended).unwrap_or(true)
    }

    fn current_frame(&self) -> Option<VideoFrame> {
        self.with_shared(|s| s.latest.clone()).flatten()
    }

    fn facing(&self) -> FacingMode {
        self.facing
    }

    fn error(&self) -> Option<String> {
        self.with_shared(|s| s.error.clone()).flatten()
    }
}

impl Drop for CameraFeed {
    fn drop(&mut self) {
        debug!("Releasing camera {}", self.device_index);
        self.stop();
    }
}

/// Formats to ask the device for, in order: the configured one or its
/// nearest match, then whatever the device streams fastest.
fn format_preferences(settings: &CameraSettings) -> [RequestedFormatType; 2] {
    let format = CameraFormat::new(
        Resolution::new(settings.width, settings.height),
        FrameFormat::MJPEG,
        settings.fps,
    );
    [
        RequestedFormatType::Closest(format),
        RequestedFormatType::AbsoluteHighestFrameRate,
    ]
}

fn open_camera(device_index: u32, preference: RequestedFormatType) -> std::result::Result<Camera, String> {
    let requested = RequestedFormat::new::<RgbFormat>(preference);
    let mut camera = Camera::new(CameraIndex::Index(device_index), requested)
        .map_err(|e| format!("Failed to open camera {}: {}", device_index, e))?;
    camera
        .open_stream()
        .map_err(|e| format!("Failed to open camera stream: {}", e))?;
    Ok(camera)
}

fn capture_loop(
    device_index: u32,
    preferences: [RequestedFormatType; 2],
    mirror: bool,
    shared: Arc<Mutex<FeedShared>>,
    running: Arc<AtomicBool>,
    opened_tx: mpsc::Sender<std::result::Result<(u32, u32), String>>,
) {
    let mut opened = Err(format!("camera {} offered no usable format", device_index));
    for preference in preferences {
        opened = open_camera(device_index, preference);
        match &opened {
            Ok(_) => break,
            Err(reason) => warn!("Camera {} with {:?}: {}", device_index, preference, reason),
        }
    }
    let mut camera = match opened {
        Ok(camera) => camera,
        Err(reason) => {
            let _ = opened_tx.send(Err(reason));
            return;
        }
    };

    let resolution = camera.resolution();
    let size = (resolution.width(), resolution.height());
    if let Ok(mut s) = shared.lock() {
        s.resolution = size;
    }
    let _ = opened_tx.send(Ok(size));

    let started = Instant::now();
    let mut sequence = 0u64;

    while running.load(Ordering::SeqCst) {
        let decoded = camera
            .frame()
            .map_err(|e| format!("Failed to capture frame: {}", e))
            .and_then(|buffer| {
                buffer
                    .decode_image::<RgbFormat>()
                    .map_err(|e| format!("Failed to decode frame: {}", e))
            });

        match decoded {
            Ok(image) => {
                // Front camera previews are mirrored so the hand moves like in a mirror
                let image = if mirror {
                    image::imageops::flip_horizontal(&image)
                } else {
                    image
                };
                sequence += 1;
                let frame = VideoFrame {
                    timestamp: started.elapsed().as_secs_f64(),
                    sequence,
                    image: Arc::new(image),
                };
                if let Ok(mut s) = shared.lock() {
                    s.resolution = (frame.width(), frame.height());
                    s.latest = Some(frame);
                }
            }
            Err(reason) => {
                warn!("Camera {}: {}", device_index, reason);
                if let Ok(mut s) = shared.lock() {
                    s.error = Some(reason);
                    s.ended = true;
                }
                break;
            }
        }
    }

    if let Err(e) = camera.stop_stream() {
        warn!("Failed to stop camera {} stream: {}", device_index, e);
    }
}

/// Opens real cameras according to the configured device indices.
pub struct CameraProvider {
    settings: CameraSettings,
}

impl CameraProvider {
    pub fn new(settings: CameraSettings) -> Self {
        Self { settings }
    }
}

impl FeedProvider for CameraProvider {
    type Feed = CameraFeed;

    fn open(&mut self, facing: FacingMode) -> Result<CameraFeed> {
        CameraFeed::open(&self.settings, facing)
    }
}

/// Lists attached cameras for diagnostics.
pub fn list_cameras() -> Result<Vec<String>> {
    let cameras = nokhwa::query(nokhwa::utils::ApiBackend::Auto)
        .map_err(|e| TryOnError::Camera(format!("Failed to query cameras: {}", e)))?;
    Ok(cameras
        .iter()
        .map(|camera| format!("[{}] {}", camera.index(), camera.human_name()))
        .collect())
}
