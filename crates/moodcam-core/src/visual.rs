//! Display lookups for emotion labels.
//!
//! All functions are total: labels outside the known set map to the
//! "unknown" entry instead of failing.

use crate::types::Emotion;

/// Color for labels that are not one of the seven classes.
pub const UNKNOWN_COLOR: [u8; 3] = [128, 128, 128];
pub const UNKNOWN_EMOJI: &str = "❓";
pub const UNKNOWN_DESCRIPTION: &str = "Unable to determine emotion";

impl Emotion {
    /// RGB color used for boxes and labels.
    pub fn color(self) -> [u8; 3] {
        match self {
            Emotion::Happy => [255, 255, 0],
            Emotion::Sad => [255, 128, 0],
            Emotion::Angry => [255, 0, 0],
            Emotion::Surprise => [0, 255, 255],
            Emotion::Fear => [255, 0, 255],
            Emotion::Disgust => [0, 255, 0],
            Emotion::Neutral => [255, 255, 255],
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            Emotion::Happy => "😄",
            Emotion::Sad => "😢",
            Emotion::Angry => "😡",
            Emotion::Surprise => "😮",
            Emotion::Fear => "😨",
            Emotion::Disgust => "🤢",
            Emotion::Neutral => "😐",
        }
    }

    /// Adjective shown in the description line.
    fn adjective(self) -> &'static str {
        match self {
            Emotion::Happy => "Happy",
            Emotion::Sad => "Sad",
            Emotion::Angry => "Angry",
            Emotion::Surprise => "Surprised",
            Emotion::Fear => "Afraid",
            Emotion::Disgust => "Disgusted",
            Emotion::Neutral => "Neutral",
        }
    }

    /// e.g. `"Surprised (82% confidence)"`.
    pub fn describe(self, confidence: f32) -> String {
        let pct = if confidence.is_finite() {
            (confidence * 100.0).round()
        } else {
            0.0
        };
        format!("{} ({pct:.0}% confidence)", self.adjective())
    }
}

pub fn color_for(label: &str) -> [u8; 3] {
    label.parse::<Emotion>().map_or(UNKNOWN_COLOR, Emotion::color)
}

pub fn emoji_for(label: &str) -> &'static str {
    label.parse::<Emotion>().map_or(UNKNOWN_EMOJI, Emotion::emoji)
}

pub fn describe(label: &str, confidence: f32) -> String {
    match label.parse::<Emotion>() {
        Ok(e) => e.describe(confidence),
        Err(_) => UNKNOWN_DESCRIPTION.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_labels() {
        assert_eq!(color_for("happy"), [255, 255, 0]);
        assert_eq!(color_for("neutral"), [255, 255, 255]);
        assert_eq!(emoji_for("angry"), "😡");
        assert_eq!(emoji_for("disgust"), "🤢");
        assert_eq!(describe("fear", 0.42), "Afraid (42% confidence)");
        assert_eq!(describe("surprise", 0.826), "Surprised (83% confidence)");
    }

    #[test]
    fn test_unknown_labels_are_total() {
        for label in ["unknown", "", "contempt", "😄"] {
            assert_eq!(color_for(label), UNKNOWN_COLOR);
            assert_eq!(emoji_for(label), UNKNOWN_EMOJI);
            assert_eq!(describe(label, 0.9), UNKNOWN_DESCRIPTION);
        }
    }

    #[test]
    fn test_every_class_has_distinct_color_and_emoji() {
        for (i, a) in Emotion::ALL.iter().enumerate() {
            for b in &Emotion::ALL[i + 1..] {
                assert_ne!(a.color(), b.color(), "{a} vs {b}");
                assert_ne!(a.emoji(), b.emoji(), "{a} vs {b}");
            }
            assert_ne!(a.color(), UNKNOWN_COLOR);
        }
    }

    #[test]
    fn test_describe_bounds() {
        assert_eq!(Emotion::Neutral.describe(0.0), "Neutral (0% confidence)");
        assert_eq!(Emotion::Happy.describe(1.0), "Happy (100% confidence)");
        assert_eq!(Emotion::Sad.describe(f32::NAN), "Sad (0% confidence)");
    }
}
