// src/lib.rs - Virtual ring try-on: hand tracking and ring placement
pub mod catalog;
pub mod config;
pub mod detection;
pub mod error;
pub mod geometry;
pub mod mediapipe_bridge;
pub mod overlay;
pub mod scheduler;
pub mod session;
pub mod tracking;
pub mod video;

pub use error::{Result, TryOnError};
