//! moodcam-core: face location and emotion scoring.
//!
//! SCRFD finds faces and a FER-style classifier scores each crop, both via
//! ONNX Runtime on the CPU. [`scorer::EmotionScorer`] turns the classifier's
//! raw percentages into one label per face.

pub mod classifier;
pub mod detector;
pub mod enhance;
pub mod history;
pub mod scorer;
pub mod types;
pub mod visual;

pub use classifier::{ClassifierError, EmotionClassifier, OnnxEmotionClassifier, TensorLayout};
pub use detector::{DetectionQuality, DetectorError, FaceDetector, FaceLocator};
pub use history::{LabelHistory, HISTORY_CAPACITY};
pub use scorer::{EmotionScorer, Fallback, ScoreOutcome, Thresholds, Weights};
pub use types::{Assessment, Emotion, FaceBox, RawScores, UnknownEmotion};

use std::path::PathBuf;

/// Model directory used when none is configured.
///
/// `$XDG_DATA_HOME/moodcam/models`, falling back to `~/.local/share`.
pub fn default_model_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("moodcam/models")
}
