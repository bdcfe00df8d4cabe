//! Emotion scoring: turns raw classifier output into one stable label.
//!
//! Per face the scorer weights the raw percentages, picks the weighted
//! argmax, and falls back down the weighted ranking when the winner's own
//! confidence misses its threshold. Accepted labels go into a three-entry
//! history. Scoring never fails: every error path maps to a defined neutral
//! [`Fallback`].

use crate::classifier::EmotionClassifier;
use crate::enhance;
use crate::history::LabelHistory;
use crate::types::{Assessment, Emotion, RawScores};
use image::RgbImage;
use std::panic::{self, AssertUnwindSafe};

/// Per-class multipliers applied to raw scores before ranking.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weights(pub [f32; Emotion::COUNT]);

impl Weights {
    pub fn get(&self, emotion: Emotion) -> f32 {
        self.0[emotion.index()]
    }

    pub fn set(&mut self, emotion: Emotion, weight: f32) {
        self.0[emotion.index()] = weight;
    }
}

impl Default for Weights {
    /// Favors happy and surprise, slightly discounts neutral.
    fn default() -> Self {
        let mut w = Weights([1.0; Emotion::COUNT]);
        w.set(Emotion::Happy, 1.2);
        w.set(Emotion::Surprise, 1.2);
        w.set(Emotion::Neutral, 0.8);
        w
    }
}

/// Minimum confidence per class, with a default for classes without an entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    per_class: [Option<f32>; Emotion::COUNT],
    default: f32,
}

impl Thresholds {
    pub const DEFAULT_THRESHOLD: f32 = 0.25;

    /// A table where every class uses `default`.
    pub fn uniform(default: f32) -> Self {
        Self {
            per_class: [None; Emotion::COUNT],
            default,
        }
    }

    pub fn with(mut self, emotion: Emotion, threshold: f32) -> Self {
        self.per_class[emotion.index()] = Some(threshold);
        self
    }

    pub fn get(&self, emotion: Emotion) -> f32 {
        self.per_class[emotion.index()].unwrap_or(self.default)
    }

    pub fn default_threshold(&self) -> f32 {
        self.default
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds::uniform(Self::DEFAULT_THRESHOLD)
            .with(Emotion::Happy, 0.20)
            .with(Emotion::Surprise, 0.20)
            .with(Emotion::Neutral, 0.30)
    }
}

/// Why a face could not be classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    /// Zero-sized crop.
    EmptyInput,
    /// The classifier returned an error.
    ClassifierFailed,
    /// Anything unexpected: a panic during inference or malformed scores.
    Internal,
}

impl Fallback {
    /// The label reported in place of a classification.
    pub fn assessment(self) -> Assessment {
        let confidence = match self {
            Fallback::EmptyInput | Fallback::ClassifierFailed => 0.0,
            Fallback::Internal => 0.1,
        };
        Assessment::new(Emotion::Neutral, confidence)
    }
}

/// Result of scoring one face.
#[derive(Debug, Clone, PartialEq)]
pub enum ScoreOutcome {
    Classified {
        assessment: Assessment,
        raw: RawScores,
        /// True when the weighted argmax missed its threshold and a
        /// lower-ranked class was accepted instead.
        reranked: bool,
    },
    Fallback(Fallback),
}

impl ScoreOutcome {
    pub fn assessment(&self) -> Assessment {
        match self {
            ScoreOutcome::Classified { assessment, .. } => *assessment,
            ScoreOutcome::Fallback(f) => f.assessment(),
        }
    }
}

/// Label selection for one score vector, without history.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Selection {
    pub emotion: Emotion,
    pub confidence: f32,
    pub reranked: bool,
}

/// Pick the reported label for a raw score vector.
///
/// Ties in weighted score resolve to the earlier class in [`Emotion::ALL`].
/// When the argmax misses its threshold, the remaining classes are tried in
/// descending weighted order and the first one meeting its own threshold
/// wins; if none does, the argmax is kept anyway.
pub fn select(raw: &RawScores, weights: &Weights, thresholds: &Thresholds) -> Selection {
    let weighted: Vec<(Emotion, f32)> = raw
        .iter()
        .map(|(e, score)| (e, score * weights.get(e)))
        .collect();

    let mut ranked = weighted.clone();
    // Stable sort keeps canonical order among equal scores.
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

    let top = ranked[0].0;
    let confidence = raw.get(top) / 100.0;
    if confidence >= thresholds.get(top) {
        return Selection {
            emotion: top,
            confidence,
            reranked: false,
        };
    }

    ranked[1..]
        .iter()
        .map(|&(e, _)| (e, raw.get(e) / 100.0))
        .find(|&(e, conf)| conf >= thresholds.get(e))
        .map(|(emotion, confidence)| Selection {
            emotion,
            confidence,
            reranked: true,
        })
        .unwrap_or(Selection {
            emotion: top,
            confidence,
            reranked: false,
        })
}

/// Stateful scorer owning its classifier and label history.
pub struct EmotionScorer<C> {
    classifier: C,
    weights: Weights,
    thresholds: Thresholds,
    history: LabelHistory,
}

impl<C: EmotionClassifier> EmotionScorer<C> {
    pub fn new(classifier: C) -> Self {
        Self {
            classifier,
            weights: Weights::default(),
            thresholds: Thresholds::default(),
            history: LabelHistory::new(),
        }
    }

    pub fn with_weights(mut self, weights: Weights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Score a face crop. Always returns a usable label.
    pub fn score(&mut self, face: &RgbImage) -> Assessment {
        self.evaluate(face).assessment()
    }

    /// Score a face crop, keeping the reason for any fallback.
    pub fn evaluate(&mut self, face: &RgbImage) -> ScoreOutcome {
        if face.width() == 0 || face.height() == 0 {
            return ScoreOutcome::Fallback(Fallback::EmptyInput);
        }

        let classifier = &mut self.classifier;
        let attempt = panic::catch_unwind(AssertUnwindSafe(|| {
            let prepared = enhance::prepare_face(face);
            classifier.classify(&prepared)
        }));

        let raw = match attempt {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                tracing::debug!(error = %e, "emotion classification failed");
                return ScoreOutcome::Fallback(Fallback::ClassifierFailed);
            }
            Err(_) => {
                tracing::error!("emotion analysis panicked");
                return ScoreOutcome::Fallback(Fallback::Internal);
            }
        };

        if !raw.is_well_formed() {
            tracing::error!(scores = ?raw.0, "classifier returned malformed scores");
            return ScoreOutcome::Fallback(Fallback::Internal);
        }

        let selection = select(&raw, &self.weights, &self.thresholds);
        self.history.push(selection.emotion, selection.confidence);

        // Agreement between the last two labels re-confirms the current
        // selection; it never changes the reported value.
        if let Some(agreed) = self.history.recent_agreement() {
            tracing::trace!(emotion = %agreed, "recent labels agree");
        }

        ScoreOutcome::Classified {
            assessment: Assessment::new(selection.emotion, selection.confidence),
            raw,
            reranked: selection.reranked,
        }
    }

    pub fn history(&self) -> &LabelHistory {
        &self.history
    }

    /// Forget recent labels (camera switch, detection restart).
    pub fn reset(&mut self) {
        self.history.clear();
    }

    pub fn weights(&self) -> &Weights {
        &self.weights
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::ClassifierError;
    use crate::history::HISTORY_CAPACITY;
    use image::Rgb;
    use std::collections::VecDeque;

    /// Replays queued results; an empty queue yields uniform scores.
    enum Scripted {
        Scores(RawScores),
        Error,
        Panic,
    }

    #[derive(Default)]
    struct FakeClassifier {
        script: VecDeque<Scripted>,
        calls: usize,
    }

    impl FakeClassifier {
        fn with(script: Vec<Scripted>) -> Self {
            Self { script: script.into(), calls: 0 }
        }
    }

    impl EmotionClassifier for FakeClassifier {
        fn classify(&mut self, _face: &RgbImage) -> Result<RawScores, ClassifierError> {
            self.calls += 1;
            match self.script.pop_front() {
                Some(Scripted::Scores(s)) => Ok(s),
                Some(Scripted::Error) => Err(ClassifierError::InferenceFailed("boom".into())),
                Some(Scripted::Panic) => panic!("model exploded"),
                None => Ok(RawScores([100.0 / 7.0; Emotion::COUNT])),
            }
        }
    }

    fn face() -> RgbImage {
        RgbImage::from_pixel(64, 64, Rgb([120, 110, 100]))
    }

    fn scores(pairs: &[(Emotion, f32)]) -> RawScores {
        RawScores::from_pairs(pairs)
    }

    fn scorer_with(script: Vec<Scripted>) -> EmotionScorer<FakeClassifier> {
        EmotionScorer::new(FakeClassifier::with(script))
    }

    #[test]
    fn test_neutral_wins_outright() {
        let raw = scores(&[
            (Emotion::Happy, 18.0),
            (Emotion::Neutral, 70.0),
            (Emotion::Sad, 5.0),
            (Emotion::Angry, 3.0),
            (Emotion::Surprise, 2.0),
            (Emotion::Fear, 1.0),
            (Emotion::Disgust, 1.0),
        ]);
        let mut scorer = scorer_with(vec![Scripted::Scores(raw)]);
        let a = scorer.score(&face());
        assert_eq!(a.emotion, Emotion::Neutral);
        assert!((a.confidence - 0.70).abs() < 1e-6);
    }

    #[test]
    fn test_neutral_wins_without_fallback_even_if_happy_passes() {
        let raw = scores(&[(Emotion::Happy, 25.0), (Emotion::Neutral, 60.0), (Emotion::Sad, 15.0)]);
        let sel = select(&raw, &Weights::default(), &Thresholds::default());
        assert_eq!(sel.emotion, Emotion::Neutral);
        assert!((sel.confidence - 0.60).abs() < 1e-6);
        assert!(!sel.reranked);
    }

    #[test]
    fn test_weighting_changes_winner() {
        // Raw neutral leads, but 40 × 1.2 = 48 beats 45 × 0.8 = 36.
        let raw = scores(&[(Emotion::Happy, 40.0), (Emotion::Neutral, 45.0), (Emotion::Sad, 15.0)]);
        let sel = select(&raw, &Weights::default(), &Thresholds::default());
        assert_eq!(sel.emotion, Emotion::Happy);
        assert!((sel.confidence - 0.40).abs() < 1e-6);
    }

    #[test]
    fn test_keeps_argmax_when_nothing_passes() {
        // Weighted: angry 24, neutral 22.4, sad 20, fear 18, disgust 10.
        // Every class misses its own threshold.
        let raw = scores(&[
            (Emotion::Angry, 24.0),
            (Emotion::Neutral, 28.0),
            (Emotion::Sad, 20.0),
            (Emotion::Fear, 18.0),
            (Emotion::Disgust, 10.0),
        ]);
        let sel = select(&raw, &Weights::default(), &Thresholds::default());
        assert_eq!(sel.emotion, Emotion::Angry);
        assert!(!sel.reranked);
        assert!((sel.confidence - 0.24).abs() < 1e-6);
    }

    #[test]
    fn test_rerank_accepts_first_passing_class() {
        // Weighted: sad 24, surprise 22.8, fear 22, neutral 16, angry 15.
        // Sad misses 0.25, surprise misses 0.20, fear clears a lowered 0.21.
        let raw = scores(&[
            (Emotion::Sad, 24.0),
            (Emotion::Surprise, 19.0),
            (Emotion::Fear, 22.0),
            (Emotion::Neutral, 20.0),
            (Emotion::Angry, 15.0),
        ]);
        let thresholds = Thresholds::default().with(Emotion::Fear, 0.21);
        let sel = select(&raw, &Weights::default(), &thresholds);
        assert_eq!(sel.emotion, Emotion::Fear);
        assert!(sel.reranked);
        assert!((sel.confidence - 0.22).abs() < 1e-6);
    }

    #[test]
    fn test_rerank_with_default_tables() {
        // Weighted: angry 24.9, happy 24.6, sad 24, neutral 23.2.
        // Angry misses 0.25; happy at 0.205 clears 0.20.
        let raw = scores(&[
            (Emotion::Angry, 24.9),
            (Emotion::Happy, 20.5),
            (Emotion::Sad, 24.0),
            (Emotion::Neutral, 29.0),
            (Emotion::Fear, 1.6),
        ]);
        let sel = select(&raw, &Weights::default(), &Thresholds::default());
        assert_eq!(sel.emotion, Emotion::Happy);
        assert!(sel.reranked);
        assert!((sel.confidence - 0.205).abs() < 1e-6);
    }

    #[test]
    fn test_tie_resolves_to_canonical_order() {
        let raw = RawScores([10.0; Emotion::COUNT]);
        let sel = select(&raw, &Weights([1.0; Emotion::COUNT]), &Thresholds::uniform(0.0));
        assert_eq!(sel.emotion, Emotion::Angry);
    }

    #[test]
    fn test_default_threshold_applies_to_unlisted_classes() {
        let t = Thresholds::default();
        for e in [Emotion::Angry, Emotion::Disgust, Emotion::Fear, Emotion::Sad] {
            assert_eq!(t.get(e), 0.25);
        }
        assert_eq!(t.get(Emotion::Happy), 0.20);
        assert_eq!(t.get(Emotion::Surprise), 0.20);
        assert_eq!(t.get(Emotion::Neutral), 0.30);
        assert_eq!(t.default_threshold(), 0.25);
    }

    #[test]
    fn test_default_weights() {
        let w = Weights::default();
        assert_eq!(w.get(Emotion::Happy), 1.2);
        assert_eq!(w.get(Emotion::Surprise), 1.2);
        assert_eq!(w.get(Emotion::Neutral), 0.8);
        assert_eq!(w.get(Emotion::Angry), 1.0);
    }

    #[test]
    fn test_empty_input_is_neutral_zero() {
        let mut scorer = scorer_with(vec![]);
        let outcome = scorer.evaluate(&RgbImage::new(0, 0));
        assert_eq!(outcome, ScoreOutcome::Fallback(Fallback::EmptyInput));
        assert_eq!(outcome.assessment(), Assessment::new(Emotion::Neutral, 0.0));
        assert!(scorer.history().is_empty());
        assert_eq!(scorer.classifier.calls, 0);

        let degenerate = RgbImage::new(10, 0);
        assert_eq!(scorer.score(&degenerate), Assessment::new(Emotion::Neutral, 0.0));
    }

    #[test]
    fn test_classifier_error_is_neutral_zero() {
        let mut scorer = scorer_with(vec![Scripted::Error]);
        let outcome = scorer.evaluate(&face());
        assert_eq!(outcome, ScoreOutcome::Fallback(Fallback::ClassifierFailed));
        assert_eq!(outcome.assessment().confidence, 0.0);
        assert!(scorer.history().is_empty());
    }

    #[test]
    fn test_classifier_panic_is_neutral_low() {
        let mut scorer = scorer_with(vec![Scripted::Panic]);
        let a = scorer.score(&face());
        assert_eq!(a.emotion, Emotion::Neutral);
        assert!((a.confidence - 0.1).abs() < 1e-6);
        // The scorer stays usable afterwards.
        let next = scorer.evaluate(&face());
        assert!(matches!(next, ScoreOutcome::Classified { .. }));
    }

    #[test]
    fn test_malformed_scores_are_internal() {
        let mut bad = RawScores([0.0; Emotion::COUNT]);
        bad.0[3] = f32::NAN;
        let mut scorer = scorer_with(vec![Scripted::Scores(bad)]);
        assert_eq!(
            scorer.evaluate(&face()),
            ScoreOutcome::Fallback(Fallback::Internal)
        );
    }

    #[test]
    fn test_history_bounded_over_many_calls() {
        let mut scorer = scorer_with(vec![]);
        for _ in 0..50 {
            scorer.score(&face());
            assert!(scorer.history().len() <= HISTORY_CAPACITY);
        }
        assert_eq!(scorer.history().len(), HISTORY_CAPACITY);
        scorer.reset();
        assert!(scorer.history().is_empty());
    }

    #[test]
    fn test_agreement_does_not_alter_output() {
        let raw = scores(&[(Emotion::Happy, 55.0), (Emotion::Neutral, 45.0)]);
        let mut scorer = scorer_with(vec![Scripted::Scores(raw), Scripted::Scores(raw)]);
        let first = scorer.score(&face());
        let second = scorer.score(&face());
        assert_eq!(first, second);
        assert_eq!(scorer.history().recent_agreement(), Some(Emotion::Happy));
    }

    #[test]
    fn test_outputs_always_in_range() {
        let script = vec![
            Scripted::Scores(RawScores([100.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0])),
            Scripted::Error,
            Scripted::Scores(RawScores([0.0; Emotion::COUNT])),
            Scripted::Panic,
            Scripted::Scores(RawScores([0.0, 0.0, 0.0, 100.0, 0.0, 0.0, 0.0])),
        ];
        let mut scorer = scorer_with(script);
        for _ in 0..6 {
            let a = scorer.score(&face());
            assert!((0.0..=1.0).contains(&a.confidence));
            assert!(Emotion::ALL.contains(&a.emotion));
        }
    }

    #[test]
    fn test_builder_overrides_change_outcome() {
        let raw = scores(&[(Emotion::Happy, 40.0), (Emotion::Neutral, 45.0), (Emotion::Sad, 15.0)]);

        let mut stock = scorer_with(vec![Scripted::Scores(raw)]);
        assert_eq!(stock.score(&face()).emotion, Emotion::Happy);

        let mut flat = Weights::default();
        flat.set(Emotion::Happy, 1.0);
        flat.set(Emotion::Neutral, 1.0);
        let mut unweighted = scorer_with(vec![Scripted::Scores(raw)]).with_weights(flat);
        assert_eq!(unweighted.weights().get(Emotion::Happy), 1.0);
        let a = unweighted.score(&face());
        assert_eq!(a.emotion, Emotion::Neutral);
        assert!((a.confidence - 0.45).abs() < 1e-6);

        // Happy still wins the weighted argmax but misses a stricter bar.
        let strict = Thresholds::default().with(Emotion::Happy, 0.5);
        let mut picky = scorer_with(vec![Scripted::Scores(raw)]).with_thresholds(strict);
        assert_eq!(picky.thresholds().get(Emotion::Happy), 0.5);
        match picky.evaluate(&face()) {
            ScoreOutcome::Classified { assessment, reranked, .. } => {
                assert_eq!(assessment.emotion, Emotion::Neutral);
                assert!(reranked);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_classified_outcome_carries_raw_scores() {
        let raw = scores(&[(Emotion::Surprise, 80.0), (Emotion::Fear, 20.0)]);
        let mut scorer = scorer_with(vec![Scripted::Scores(raw)]);
        match scorer.evaluate(&face()) {
            ScoreOutcome::Classified { assessment, raw: got, reranked } => {
                assert_eq!(assessment.emotion, Emotion::Surprise);
                assert_eq!(got, raw);
                assert!(!reranked);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
