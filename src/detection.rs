// src/detection.rs - Scanning / detected / lost state machine
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetectionState {
    /// No successful detection since the loop started or was reset.
    #[default]
    Scanning,
    Detected,
    /// The most recent tick found no hand.
    Lost,
}

impl DetectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scanning => "scanning",
            Self::Detected => "detected",
            Self::Lost => "lost",
        }
    }
}

/// When a miss turns DETECTED into LOST.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LossPolicy {
    /// Every tick is authoritative.
    #[default]
    Immediate,
    /// Stay DETECTED until this many consecutive misses.
    AfterMisses(u32),
}

impl LossPolicy {
    fn misses_to_lose(&self) -> u32 {
        match self {
            LossPolicy::Immediate => 1,
            LossPolicy::AfterMisses(n) => (*n).max(1),
        }
    }
}

/// Result of feeding one tick into the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: DetectionState,
    pub to: DetectionState,
}

impl Transition {
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

#[derive(Debug, Clone)]
pub struct DetectionMachine {
    state: DetectionState,
    policy: LossPolicy,
    consecutive_misses: u32,
    scan_progress: u8,
}

impl DetectionMachine {
    pub fn new(policy: LossPolicy) -> Self {
        Self {
            state: DetectionState::Scanning,
            policy,
            consecutive_misses: 0,
            scan_progress: 0,
        }
    }

    pub fn state(&self) -> DetectionState {
        self.state
    }

    pub fn policy(&self) -> LossPolicy {
        self.policy
    }

    /// Visual scan progress, 0-100. Only meaningful while scanning.
    pub fn scan_progress(&self) -> u8 {
        self.scan_progress
    }

    pub fn set_scan_progress(&mut self, progress: u8) {
        if self.state == DetectionState::Scanning {
            self.scan_progress = progress.min(100);
        }
    }

    pub fn is_detected(&self) -> bool {
        self.state == DetectionState::Detected
    }

    pub fn on_found(&mut self) -> Transition {
        self.consecutive_misses = 0;
        self.scan_progress = 100;
        self.move_to(DetectionState::Detected)
    }

    pub fn on_missing(&mut self) -> Transition {
        self.consecutive_misses = self.consecutive_misses.saturating_add(1);
        match self.state {
            // Scanning only ends on a hit
            DetectionState::Scanning => self.move_to(DetectionState::Scanning),
            DetectionState::Detected if self.consecutive_misses < self.policy.misses_to_lose() => {
                self.move_to(DetectionState::Detected)
            }
            _ => self.move_to(DetectionState::Lost),
        }
    }

    /// Back to SCANNING, as on camera switch or session restart.
    pub fn reset(&mut self) -> Transition {
        self.consecutive_misses = 0;
        self.scan_progress = 0;
        self.move_to(DetectionState::Scanning)
    }

    fn move_to(&mut self, to: DetectionState) -> Transition {
        let transition = Transition { from: self.state, to };
        if transition.changed() {
            debug!("Detection state {} -> {}", self.state.as_str(), to.as_str());
        }
        self.state = to;
        transition
    }
}

impl Default for DetectionMachine {
    fn default() -> Self {
        Self::new(LossPolicy::default())
    }
}
