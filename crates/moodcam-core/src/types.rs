use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The closed set of facial emotions the classifier distinguishes.
///
/// Declaration order matches the classifier's output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Angry,
    Disgust,
    Fear,
    Happy,
    Sad,
    Surprise,
    Neutral,
}

impl Emotion {
    pub const COUNT: usize = 7;

    /// All classes in canonical (model output) order.
    pub const ALL: [Emotion; Emotion::COUNT] = [
        Emotion::Angry,
        Emotion::Disgust,
        Emotion::Fear,
        Emotion::Happy,
        Emotion::Sad,
        Emotion::Surprise,
        Emotion::Neutral,
    ];

    /// Position of this class in [`Emotion::ALL`] and in score vectors.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Lowercase label as used in logs, the journal and settings.
    pub fn as_str(self) -> &'static str {
        match self {
            Emotion::Angry => "angry",
            Emotion::Disgust => "disgust",
            Emotion::Fear => "fear",
            Emotion::Happy => "happy",
            Emotion::Sad => "sad",
            Emotion::Surprise => "surprise",
            Emotion::Neutral => "neutral",
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown emotion label: {0}")]
pub struct UnknownEmotion(pub String);

impl FromStr for Emotion {
    type Err = UnknownEmotion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Emotion::ALL
            .into_iter()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| UnknownEmotion(s.to_string()))
    }
}

/// Per-class classifier output, each value a percentage in [0, 100].
///
/// Always covers exactly the seven known classes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawScores(pub [f32; Emotion::COUNT]);

impl RawScores {
    /// Build from `(emotion, score)` pairs; classes not listed score 0.
    pub fn from_pairs(pairs: &[(Emotion, f32)]) -> Self {
        let mut values = [0.0f32; Emotion::COUNT];
        for &(emotion, score) in pairs {
            values[emotion.index()] = score;
        }
        Self(values)
    }

    pub fn get(&self, emotion: Emotion) -> f32 {
        self.0[emotion.index()]
    }

    /// Iterate `(emotion, score)` in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (Emotion, f32)> + '_ {
        Emotion::ALL.into_iter().map(|e| (e, self.get(e)))
    }

    /// True when every score is finite and within [0, 100].
    pub fn is_well_formed(&self) -> bool {
        self.0
            .iter()
            .all(|v| v.is_finite() && (0.0..=100.0).contains(v))
    }
}

/// A detected face in frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceBox {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    /// Detector confidence in [0, 1].
    pub confidence: f32,
}

impl FaceBox {
    /// The shorter side, used for minimum-size filtering.
    pub fn min_side(&self) -> u32 {
        self.width.min(self.height)
    }
}

/// A label with its confidence, as reported to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub emotion: Emotion,
    /// Normalized strength of the selected class's raw score, in [0, 1].
    pub confidence: f32,
}

impl Assessment {
    pub fn new(emotion: Emotion, confidence: f32) -> Self {
        Self {
            emotion,
            confidence: if confidence.is_finite() {
                confidence.clamp(0.0, 1.0)
            } else {
                0.0
            },
        }
    }

    /// Confidence as a rounded percentage (0–100).
    pub fn confidence_percent(&self) -> u8 {
        (self.confidence * 100.0).round() as u8
    }
}

impl fmt::Display for Assessment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}%)", self.emotion, self.confidence_percent())
    }
}
