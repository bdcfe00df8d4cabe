//! Bounded window of recently accepted labels.

use crate::types::Emotion;
use std::collections::VecDeque;

/// Number of recent assessments the scorer remembers.
pub const HISTORY_CAPACITY: usize = 3;

/// Recent labels and their confidences, oldest first.
///
/// The two sequences are always the same length and never exceed
/// [`HISTORY_CAPACITY`]; pushing onto a full window evicts the oldest entry.
#[derive(Debug, Clone, Default)]
pub struct LabelHistory {
    labels: VecDeque<Emotion>,
    confidences: VecDeque<f32>,
}

impl LabelHistory {
    pub fn new() -> Self {
        Self {
            labels: VecDeque::with_capacity(HISTORY_CAPACITY),
            confidences: VecDeque::with_capacity(HISTORY_CAPACITY),
        }
    }

    pub fn push(&mut self, label: Emotion, confidence: f32) {
        if self.labels.len() == HISTORY_CAPACITY {
            self.labels.pop_front();
            self.confidences.pop_front();
        }
        self.labels.push_back(label);
        self.confidences.push_back(confidence);
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn clear(&mut self) {
        self.labels.clear();
        self.confidences.clear();
    }

    pub fn labels(&self) -> impl Iterator<Item = Emotion> + '_ {
        self.labels.iter().copied()
    }

    pub fn confidences(&self) -> impl Iterator<Item = f32> + '_ {
        self.confidences.iter().copied()
    }

    /// Most recent entry.
    pub fn latest(&self) -> Option<(Emotion, f32)> {
        Some((*self.labels.back()?, *self.confidences.back()?))
    }

    /// The label shared by the two most recent entries, if they agree.
    pub fn recent_agreement(&self) -> Option<Emotion> {
        let n = self.labels.len();
        if n < 2 {
            return None;
        }
        let (prev, last) = (self.labels[n - 2], self.labels[n - 1]);
        (prev == last).then_some(last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_evicts_oldest() {
        let mut h = LabelHistory::new();
        h.push(Emotion::Angry, 0.1);
        h.push(Emotion::Happy, 0.2);
        h.push(Emotion::Sad, 0.3);
        h.push(Emotion::Fear, 0.4);

        assert_eq!(h.len(), HISTORY_CAPACITY);
        let labels: Vec<_> = h.labels().collect();
        assert_eq!(labels, vec![Emotion::Happy, Emotion::Sad, Emotion::Fear]);
        let confs: Vec<_> = h.confidences().collect();
        assert_eq!(confs, vec![0.2, 0.3, 0.4]);
    }

    #[test]
    fn test_never_exceeds_capacity() {
        let mut h = LabelHistory::new();
        for i in 0..100 {
            h.push(Emotion::ALL[i % Emotion::COUNT], 0.5);
            assert!(h.len() <= HISTORY_CAPACITY);
            assert_eq!(h.labels().count(), h.confidences().count());
        }
    }

    #[test]
    fn test_recent_agreement() {
        let mut h = LabelHistory::new();
        assert_eq!(h.recent_agreement(), None);
        h.push(Emotion::Happy, 0.5);
        assert_eq!(h.recent_agreement(), None);
        h.push(Emotion::Happy, 0.6);
        assert_eq!(h.recent_agreement(), Some(Emotion::Happy));
        h.push(Emotion::Sad, 0.6);
        assert_eq!(h.recent_agreement(), None);
    }

    #[test]
    fn test_clear_and_latest() {
        let mut h = LabelHistory::new();
        h.push(Emotion::Neutral, 0.7);
        assert_eq!(h.latest(), Some((Emotion::Neutral, 0.7)));
        h.clear();
        assert!(h.is_empty());
        assert_eq!(h.latest(), None);
    }
}
