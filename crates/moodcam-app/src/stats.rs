//! Running per-emotion counters for the statistics panel.

use moodcam_core::Emotion;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmotionStats {
    counts: [u64; Emotion::COUNT],
}

impl EmotionStats {
    pub fn record(&mut self, emotion: Emotion) {
        self.counts[emotion.index()] += 1;
    }

    pub fn count(&self, emotion: Emotion) -> u64 {
        self.counts[emotion.index()]
    }

    /// Number of faces scored since the last reset.
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }
}
