//! moodcam-hw: hardware abstraction for webcam capture.
//!
//! Provides V4L2-based camera access and RGB frame utilities.

pub mod camera;
pub mod frame;

pub use camera::{Camera, CameraError, DeviceInfo, FrameSource, PixelFormat};
pub use frame::{Frame, FrameError};
