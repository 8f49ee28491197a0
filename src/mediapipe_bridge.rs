// src/mediapipe_bridge.rs - Hand landmark source backed by a MediaPipe helper process
//
// The helper (scripts/hand_landmarker.py) runs the MediaPipe hand landmarker in
// VIDEO mode for a single hand. Protocol, little endian:
//   -> width u32, height u32, channels u32, timestamp_ms u64, RGB bytes
//   <- one JSON line: {"hands": [{"handedness", "score", "landmarks": [{x,y,z}]}], "error"}
// The helper prints READY once the model is loaded.

use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Result, TryOnError};
use crate::geometry::{HandFrame, HandKeypoint};
use crate::video::VideoFrame;

/// Per-frame hand keypoint detector. Owned by one tracking session.
pub trait LandmarkSource {
    /// Returns the hand in `frame`, if any. `timestamp_ms` must increase
    /// strictly between calls.
    fn detect(&mut self, frame: &VideoFrame, timestamp_ms: u64) -> Result<Option<HandFrame>>;

    /// Releases the detector. Further `detect` calls fail.
    fn close(&mut self);

    fn name(&self) -> &str {
        "landmarks"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Delegate {
    #[default]
    Gpu,
    Cpu,
}

impl Delegate {
    pub fn as_arg(self) -> &'static str {
        match self {
            Delegate::Gpu => "GPU",
            Delegate::Cpu => "CPU",
        }
    }
}

#[derive(Debug, Clone)]
pub struct LandmarkerOptions {
    pub python: PathBuf,
    pub script: PathBuf,
    pub model_asset_path: PathBuf,
    pub delegate: Delegate,
    pub min_confidence: f32,
}

#[derive(Deserialize, Debug)]
struct LandmarkJson {
    x: f64,
    y: f64,
    #[serde(default)]
    z: f64,
}

#[derive(Deserialize, Debug)]
struct HandJson {
    #[serde(default)]
    handedness: String,
    score: f32,
    landmarks: Vec<LandmarkJson>,
}

#[derive(Deserialize, Debug)]
struct DetectionResponse {
    #[serde(default)]
    hands: Vec<HandJson>,
    #[serde(default)]
    error: Option<String>,
}

struct HelperProcess {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

pub struct MediaPipeLandmarker {
    process: Option<HelperProcess>,
    min_confidence: f32,
}

impl MediaPipeLandmarker {
    /// Starts the helper and blocks until it reports READY.
    pub fn spawn(options: LandmarkerOptions) -> Result<Self> {
        require_file(&options.model_asset_path, "model asset")?;
        require_file(&options.script, "landmarker script")?;

        info!(
            "Starting hand landmarker ({} delegate, model {})",
            options.delegate.as_arg(),
            options.model_asset_path.display()
        );

        let mut child = Command::new(&options.python)
            .arg(&options.script)
            .arg("--model")
            .arg(&options.model_asset_path)
            .arg("--delegate")
            .arg(options.delegate.as_arg())
            .arg("--num-hands")
            .arg("1")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| {
                TryOnError::ModelLoad(format!("failed to start {}: {}", options.python.display(), e))
            })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            let _ = child.kill();
            return Err(TryOnError::ModelLoad("helper pipes unavailable".into()));
        };
        let mut stdout = BufReader::new(stdout);

        let mut ready_line = String::new();
        let ready = stdout.read_line(&mut ready_line).map(|_| ready_line.trim() == "READY");
        if !matches!(ready, Ok(true)) {
            let _ = child.kill();
            let _ = child.wait();
            return Err(TryOnError::ModelLoad(format!(
                "helper did not signal READY, got {:?}",
                ready_line.trim()
            )));
        }

        info!("Hand landmarker ready");

        Ok(Self {
            process: Some(HelperProcess { child, stdin, stdout }),
            min_confidence: options.min_confidence,
        })
    }

    /// Loads the model off the UI thread.
    pub async fn initialize(options: LandmarkerOptions) -> Result<Self> {
        tokio::task::spawn_blocking(move || Self::spawn(options))
            .await
            .map_err(|e| TryOnError::ModelLoad(format!("initializer task failed: {}", e)))?
    }

    fn exchange(process: &mut HelperProcess, frame: &VideoFrame, timestamp_ms: u64) -> std::io::Result<String> {
        let stdin = &mut process.stdin;
        stdin.write_all(&frame.width().to_le_bytes())?;
        stdin.write_all(&frame.height().to_le_bytes())?;
        stdin.write_all(&3u32.to_le_bytes())?;
        stdin.write_all(&timestamp_ms.to_le_bytes())?;
        stdin.write_all(frame.image.as_raw())?;
        stdin.flush()?;

        let mut response = String::new();
        let read = process.stdout.read_line(&mut response)?;
        if read == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "landmarker helper exited",
            ));
        }
        Ok(response)
    }
}

impl LandmarkSource for MediaPipeLandmarker {
    fn detect(&mut self, frame: &VideoFrame, timestamp_ms: u64) -> Result<Option<HandFrame>> {
        let process = self
            .process
            .as_mut()
            .ok_or_else(|| TryOnError::Detection("landmarker is closed".into()))?;

        let response = Self::exchange(process, frame, timestamp_ms)
            .map_err(|e| TryOnError::Detection(e.to_string()))?;
        parse_response(&response, self.min_confidence)
    }

    fn close(&mut self) {
        if let Some(mut process) = self.process.take() {
            // Closing stdin lets the helper exit its read loop
            drop(process.stdin);
            let _ = process.child.kill();
            let _ = process.child.wait();
            info!("Hand landmarker closed");
        }
    }

    fn name(&self) -> &str {
        "mediapipe"
    }
}

impl Drop for MediaPipeLandmarker {
    fn drop(&mut self) {
        self.close();
    }
}

fn require_file(path: &Path, what: &str) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(TryOnError::ModelLoad(format!("{} not found at {}", what, path.display())))
    }
}

/// Picks the first hand at or above `min_confidence`.
fn parse_response(response: &str, min_confidence: f32) -> Result<Option<HandFrame>> {
    let parsed: DetectionResponse = serde_json::from_str(response.trim())
        .map_err(|e| TryOnError::Detection(format!("bad helper response: {}", e)))?;

    if let Some(error) = parsed.error {
        return Err(TryOnError::Detection(error));
    }

    for hand in parsed.hands {
        if hand.score < min_confidence {
            continue;
        }
        let points: Vec<HandKeypoint> = hand
            .landmarks
            .iter()
            .map(|lm| HandKeypoint { x: lm.x, y: lm.y, z: lm.z })
            .collect();
        match HandFrame::from_slice(&points) {
            Ok(frame) => {
                debug!("Hand detected: {} (score {:.2})", hand.handedness, hand.score);
                return Ok(Some(frame));
            }
            Err(e) => warn!("Skipping hand: {}", e),
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::landmarks;

    fn hand_json(score: f32, count: usize) -> String {
        let landmarks: Vec<String> = (0..count)
            .map(|i| format!(r#"{{"x": {}, "y": 0.5, "z": 0.0}}"#, i as f64 / 100.0))
            .collect();
        format!(
            r#"{{"handedness": "Left", "score": {}, "landmarks": [{}]}}"#,
            score,
            landmarks.join(",")
        )
    }

    #[test]
    fn parses_single_hand() {
        let response = format!(r#"{{"hands": [{}]}}"#, hand_json(0.9, 21));
        let hand = parse_response(&response, 0.5).unwrap().unwrap();
        assert!((hand.point(landmarks::RING_FINGER_PIP).x - 0.14).abs() < 1e-12);
    }

    #[test]
    fn empty_hands_is_no_detection() {
        assert!(parse_response(r#"{"hands": []}"#, 0.5).unwrap().is_none());
    }

    #[test]
    fn low_confidence_and_malformed_hands_are_skipped() {
        let response = format!(r#"{{"hands": [{}, {}]}}"#, hand_json(0.2, 21), hand_json(0.9, 5));
        assert!(parse_response(&response, 0.5).unwrap().is_none());
    }

    #[test]
    fn helper_error_is_a_detection_error() {
        let result = parse_response(r#"{"hands": [], "error": "bad frame"}"#, 0.5);
        assert!(matches!(result, Err(TryOnError::Detection(msg)) if msg == "bad frame"));
    }

    #[test]
    fn garbage_is_a_detection_error() {
        assert!(matches!(parse_response("Traceback", 0.5), Err(TryOnError::Detection(_))));
    }

    #[tokio::test]
    async fn missing_model_fails_initialization() {
        let options = LandmarkerOptions {
            python: PathBuf::from("python3"),
            script: PathBuf::from("scripts/hand_landmarker.py"),
            model_asset_path: PathBuf::from("/nonexistent/hand_landmarker.task"),
            delegate: Delegate::Cpu,
            min_confidence: 0.5,
        };
        let err = MediaPipeLandmarker::initialize(options).await.err().unwrap();
        assert!(err.is_session_fatal());
    }
}
