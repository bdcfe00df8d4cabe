//! Facial emotion classifier via ONNX Runtime.
//!
//! Runs a FER-2013 style model (48×48 grayscale input, seven outputs in
//! [`Emotion::ALL`] order) and reports per-class percentages.

use crate::types::{Emotion, RawScores};
use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

const FER_INPUT_SIZE: usize = 48;
/// Outputs summing to 1 within this tolerance are taken as probabilities already.
const PROBABILITY_SUM_TOLERANCE: f32 = 1e-3;

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("model file not found: {0} — place a 7-class FER model in the model directory")]
    ModelNotFound(String),
    #[error("empty face image")]
    EmptyInput,
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Produces raw per-class scores for a face crop.
pub trait EmotionClassifier {
    fn classify(&mut self, face: &RgbImage) -> Result<RawScores, ClassifierError>;
}

impl<C: EmotionClassifier + ?Sized> EmotionClassifier for Box<C> {
    fn classify(&mut self, face: &RgbImage) -> Result<RawScores, ClassifierError> {
        (**self).classify(face)
    }
}

/// Memory layout of the model's input tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TensorLayout {
    /// `[1, 48, 48, 1]`, as in Keras exports.
    #[default]
    Nhwc,
    /// `[1, 1, 48, 48]`, as in PyTorch exports.
    Nchw,
}

impl FromStr for TensorLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "nhwc" => Ok(Self::Nhwc),
            "nchw" => Ok(Self::Nchw),
            other => Err(format!("unknown tensor layout: {other} (expected nhwc or nchw)")),
        }
    }
}

/// ONNX-backed emotion classifier.
pub struct OnnxEmotionClassifier {
    session: Session,
    layout: TensorLayout,
}

impl OnnxEmotionClassifier {
    /// Load the emotion model from the given path.
    pub fn load(model_path: &str, layout: TensorLayout) -> Result<Self, ClassifierError> {
        if !Path::new(model_path).exists() {
            return Err(ClassifierError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(1)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = model_path,
            ?layout,
            inputs = ?session.inputs().iter().map(|i| i.name()).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded emotion model"
        );

        Ok(Self { session, layout })
    }

    /// Grayscale, resize to 48×48 and scale to [0, 1] in the configured layout.
    fn preprocess(face: &RgbImage, layout: TensorLayout) -> Array4<f32> {
        let gray = imageops::grayscale(face);
        let side = FER_INPUT_SIZE as u32;
        let resized = imageops::resize(&gray, side, side, FilterType::Triangle);

        let shape = match layout {
            TensorLayout::Nhwc => (1, FER_INPUT_SIZE, FER_INPUT_SIZE, 1),
            TensorLayout::Nchw => (1, 1, FER_INPUT_SIZE, FER_INPUT_SIZE),
        };
        let mut tensor = Array4::<f32>::zeros(shape);
        for (x, y, p) in resized.enumerate_pixels() {
            let v = p.0[0] as f32 / 255.0;
            let (x, y) = (x as usize, y as usize);
            match layout {
                TensorLayout::Nhwc => tensor[[0, y, x, 0]] = v,
                TensorLayout::Nchw => tensor[[0, 0, y, x]] = v,
            }
        }
        tensor
    }
}

impl EmotionClassifier for OnnxEmotionClassifier {
    fn classify(&mut self, face: &RgbImage) -> Result<RawScores, ClassifierError> {
        if face.width() == 0 || face.height() == 0 {
            return Err(ClassifierError::EmptyInput);
        }

        let input = Self::preprocess(face, self.layout);
        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| ClassifierError::InferenceFailed(format!("emotion output: {e}")))?;

        to_percentages(raw)
    }
}

/// Turn raw model output into percentages.
///
/// Softmax outputs are passed through; anything else is treated as logits.
pub fn to_percentages(raw: &[f32]) -> Result<RawScores, ClassifierError> {
    if raw.len() != Emotion::COUNT {
        return Err(ClassifierError::InferenceFailed(format!(
            "expected {} emotion outputs, got {}",
            Emotion::COUNT,
            raw.len()
        )));
    }

    let is_distribution = raw.iter().all(|v| (0.0..=1.0).contains(v))
        && (raw.iter().sum::<f32>() - 1.0).abs() < PROBABILITY_SUM_TOLERANCE;

    let mut values = [0.0f32; Emotion::COUNT];
    if is_distribution {
        for (dst, &p) in values.iter_mut().zip(raw) {
            *dst = p * 100.0;
        }
    } else {
        let max = raw.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let exp_sum: f32 = raw.iter().map(|&v| (v - max).exp()).sum();
        for (dst, &v) in values.iter_mut().zip(raw) {
            *dst = (v - max).exp() / exp_sum * 100.0;
        }
    }
    Ok(RawScores(values))
}
