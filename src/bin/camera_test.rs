// Checks that the configured front and rear cameras open and deliver a frame.
use std::time::{Duration, Instant};

use ring_tryon::config::AppConfig;
use ring_tryon::video::{self, CameraFeed, FacingMode, VideoFeed};

const FIRST_FRAME_TIMEOUT: Duration = Duration::from_secs(5);

fn check_camera(config: &AppConfig, facing: FacingMode) -> bool {
    let index = config.camera.device_index(facing);
    println!("{} (device {}):", facing.label(), index);

    let feed = match CameraFeed::open(&config.camera, facing) {
        Ok(feed) => feed,
        Err(e) => {
            println!("  ✗ {}", e);
            return false;
        }
    };
    println!("  ✓ Stream opened");

    let deadline = Instant::now() + FIRST_FRAME_TIMEOUT;
    while !feed.is_ready() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(20));
    }

    if let Some(frame) = feed.current_frame() {
        println!("  ✓ Frame captured: {}x{}", frame.width(), frame.height());
        true
    } else {
        println!("  ✗ No frame within {:?}", FIRST_FRAME_TIMEOUT);
        if let Some(e) = feed.error() {
            println!("    {}", e);
        }
        false
    }
}

fn main() {
    tracing_subscriber::fmt::init();
    println!("Testing camera access...\n");

    match video::list_cameras() {
        Ok(cameras) => {
            for camera in cameras {
                println!("  {}", camera);
            }
        }
        Err(e) => println!("✗ {}", e),
    }
    println!();

    let config = AppConfig::load_or_default(&AppConfig::default_path()).unwrap_or_default();
    let results = [
        check_camera(&config, FacingMode::User),
        check_camera(&config, FacingMode::Environment),
    ];

    if results.iter().all(|ok| !ok) {
        println!("\nPossible causes:");
        println!("1. Camera is being used by another app");
        println!("2. Camera permissions not granted");
        println!("3. No camera connected");
        std::process::exit(1);
    }
}
