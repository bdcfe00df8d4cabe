//! Per-tick detection pipeline.
//!
//! Owns the frame source, face locator and emotion scorer. Each call to
//! [`Session::tick`] captures one frame, mirrors it, scores every face large
//! enough to matter, updates the running statistics and draws colored boxes
//! into the frame.

use crate::journal::Journal;
use crate::overlay::{self, BOX_THICKNESS};
use crate::settings::Settings;
use crate::stats::EmotionStats;
use moodcam_core::{
    Assessment, DetectorError, Emotion, EmotionClassifier, EmotionScorer, FaceBox, FaceLocator,
};
use moodcam_hw::{CameraError, Frame, FrameSource};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("camera error: {0}")]
    Camera(#[from] CameraError),
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("no camera open")]
    NoCamera,
}

impl SessionError {
    /// Short text for the status bar.
    pub fn status_message(&self) -> String {
        match self {
            SessionError::Camera(_) | SessionError::NoCamera => {
                "Error: Cannot read from camera".to_string()
            }
            other => format!("Error: {other}"),
        }
    }
}

/// Opens a frame source for a camera index.
pub type CameraOpener = Box<dyn FnMut(u32) -> Result<Box<dyn FrameSource>, CameraError>>;

/// One scored face.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceResult {
    pub face: FaceBox,
    pub assessment: Assessment,
}

/// Result of one tick.
pub struct TickOutput {
    /// Mirrored frame with face boxes drawn in.
    pub frame: Frame,
    pub faces: Vec<FaceResult>,
    /// Nominal device frame rate.
    pub fps: Option<f32>,
}

/// Face location plus scoring, without a camera.
pub struct Analyzer {
    locator: Box<dyn FaceLocator>,
    scorer: EmotionScorer<Box<dyn EmotionClassifier>>,
    min_face_size: u32,
}

impl Analyzer {
    pub fn new(
        locator: Box<dyn FaceLocator>,
        classifier: Box<dyn EmotionClassifier>,
        min_face_size: u32,
    ) -> Self {
        Self {
            locator,
            scorer: EmotionScorer::new(classifier),
            min_face_size,
        }
    }

    /// Locate faces in `frame` and score each one at least `min_face_size` wide and tall.
    pub fn analyze(&mut self, frame: &Frame) -> Result<Vec<FaceResult>, SessionError> {
        let boxes = self.locator.locate(&frame.to_image())?;
        let found = boxes.len();

        let results: Vec<FaceResult> = boxes
            .into_iter()
            .filter(|b| b.min_side() >= self.min_face_size)
            .map(|face| {
                let crop = frame.crop(face.x, face.y, face.width, face.height);
                FaceResult {
                    face,
                    assessment: self.scorer.score(&crop),
                }
            })
            .collect();

        tracing::trace!(found, scored = results.len(), "frame analyzed");
        Ok(results)
    }

    #[cfg(test)]
    pub fn scorer(&self) -> &EmotionScorer<Box<dyn EmotionClassifier>> {
        &self.scorer
    }
}

pub struct Session {
    open_camera: CameraOpener,
    source: Option<Box<dyn FrameSource>>,
    camera_index: Option<u32>,
    analyzer: Analyzer,
    stats: EmotionStats,
    journal: Option<Journal>,
    current: Assessment,
    applied_revision: Option<u64>,
}

impl Session {
    pub fn new(open_camera: CameraOpener, analyzer: Analyzer) -> Self {
        Self {
            open_camera,
            source: None,
            camera_index: None,
            analyzer,
            stats: EmotionStats::default(),
            journal: None,
            current: Assessment::new(Emotion::Neutral, 0.0),
            applied_revision: None,
        }
    }

    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Apply settings if `revision` has not been seen yet.
    ///
    /// Switching cameras releases the old device before opening the new one
    /// and clears the scorer history.
    pub fn apply_settings(&mut self, settings: &Settings, revision: u64) -> Result<(), SessionError> {
        if self.applied_revision == Some(revision) {
            return Ok(());
        }
        self.applied_revision = Some(revision);

        self.analyzer.locator.set_quality(settings.detection_quality);
        self.analyzer.min_face_size = settings.min_face_size;

        if self.camera_index != Some(settings.camera_index) || self.source.is_none() {
            self.source = None;
            self.camera_index = Some(settings.camera_index);
            self.analyzer.scorer.reset();
            let source = (self.open_camera)(settings.camera_index)?;
            tracing::info!(index = settings.camera_index, "camera acquired");
            self.source = Some(source);
        }

        tracing::debug!(
            revision,
            quality = settings.detection_quality.as_str(),
            min_face_size = settings.min_face_size,
            "settings applied"
        );
        Ok(())
    }

    /// Run one capture-locate-score cycle.
    pub fn tick(&mut self) -> Result<TickOutput, SessionError> {
        let source = self.source.as_mut().ok_or(SessionError::NoCamera)?;
        let mut frame = source.next_frame().inspect_err(|e| {
            tracing::warn!(error = %e, "frame capture failed");
        })?;
        let fps = source.fps();
        frame.mirror();

        let faces = self.analyzer.analyze(&frame)?;
        for result in &faces {
            self.stats.record(result.assessment.emotion);
            self.current = result.assessment;
            if let Some(journal) = self.journal.as_mut() {
                if let Err(e) = journal.append(&result.assessment) {
                    tracing::warn!(error = %e, "journal write failed; disabling journal");
                    self.journal = None;
                }
            }
            overlay::draw_box(
                &mut frame,
                &result.face,
                result.assessment.emotion.color(),
                BOX_THICKNESS,
            );
        }

        Ok(TickOutput { frame, faces, fps })
    }

    /// Forget recent labels, e.g. when detection restarts.
    ///
    /// Settings are re-applied on the next `apply_settings`, which retries a
    /// camera that failed to open.
    pub fn restart(&mut self) {
        self.analyzer.scorer.reset();
        self.applied_revision = None;
    }

    pub fn stats(&self) -> &EmotionStats {
        &self.stats
    }

    /// The most recently scored face's assessment.
    pub fn current(&self) -> Assessment {
        self.current
    }

    #[cfg(test)]
    pub fn analyzer(&self) -> &Analyzer {
        &self.analyzer
    }
}
