//! SCRFD face locator via ONNX Runtime.
//!
//! Anchor-free decoding over three strides with NMS post-processing. The
//! network input is a square letterbox whose side depends on the selected
//! [`DetectionQuality`].

use crate::types::FaceBox;
use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

const SCRFD_MEAN: f32 = 127.5;
const SCRFD_STD: f32 = 128.0;
const SCRFD_CONFIDENCE_THRESHOLD: f32 = 0.5;
const SCRFD_NMS_THRESHOLD: f32 = 0.4;
const SCRFD_STRIDES: [usize; 3] = [8, 16, 32];
const SCRFD_ANCHORS_PER_CELL: usize = 2;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("model file not found: {0} — download det_10g.onnx from insightface")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Finds faces in a frame.
pub trait FaceLocator {
    /// Bounding boxes of all faces found, in no particular order.
    fn locate(&mut self, frame: &RgbImage) -> Result<Vec<FaceBox>, DetectorError>;

    /// Trade speed for recall. Locators without tunables ignore this.
    fn set_quality(&mut self, _quality: DetectionQuality) {}
}

/// Speed/accuracy trade-off exposed in the settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionQuality {
    Performance,
    #[default]
    Balanced,
    Quality,
}

impl DetectionQuality {
    pub const ALL: [DetectionQuality; 3] = [
        DetectionQuality::Balanced,
        DetectionQuality::Performance,
        DetectionQuality::Quality,
    ];

    /// Side of the square network input, a multiple of the largest stride.
    pub fn input_size(self) -> usize {
        match self {
            DetectionQuality::Performance => 320,
            DetectionQuality::Balanced => 480,
            DetectionQuality::Quality => 640,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DetectionQuality::Performance => "performance",
            DetectionQuality::Balanced => "balanced",
            DetectionQuality::Quality => "quality",
        }
    }
}

impl FromStr for DetectionQuality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DetectionQuality::ALL
            .into_iter()
            .find(|q| q.as_str() == s)
            .ok_or_else(|| format!("unknown detection quality: {s}"))
    }
}

/// Metadata for mapping network coordinates back to the frame.
#[derive(Debug, Clone, Copy)]
struct Letterbox {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
}

impl Letterbox {
    fn unmap(&self, x: f32, y: f32) -> (f32, f32) {
        ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
    }
}

/// A decoded detection in frame coordinates, before NMS.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Candidate {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    score: f32,
}

impl Candidate {
    fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }

    /// Round to integer pixels, clamped to the frame.
    fn to_face_box(self, frame_w: u32, frame_h: u32) -> Option<FaceBox> {
        let x1 = self.x1.round().clamp(0.0, frame_w as f32) as i32;
        let y1 = self.y1.round().clamp(0.0, frame_h as f32) as i32;
        let x2 = self.x2.round().clamp(0.0, frame_w as f32) as i32;
        let y2 = self.y2.round().clamp(0.0, frame_h as f32) as i32;
        (x2 > x1 && y2 > y1).then(|| FaceBox {
            x: x1,
            y: y1,
            width: (x2 - x1) as u32,
            height: (y2 - y1) as u32,
            confidence: self.score,
        })
    }
}

/// SCRFD-based face detector.
pub struct FaceDetector {
    session: Session,
    quality: DetectionQuality,
    /// Per-stride `(score, bbox)` output indices for strides [8, 16, 32].
    stride_outputs: [(usize, usize); 3],
}

impl FaceDetector {
    /// Load the SCRFD ONNX model from the given path.
    pub fn load(model_path: &str, quality: DetectionQuality) -> Result<Self, DetectorError> {
        if !Path::new(model_path).exists() {
            return Err(DetectorError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        let output_names: Vec<String> = session
            .outputs()
            .iter()
            .map(|o| o.name().to_string())
            .collect();

        tracing::info!(
            path = model_path,
            outputs = ?output_names,
            quality = quality.as_str(),
            "loaded SCRFD model"
        );

        if output_names.len() < 6 {
            return Err(DetectorError::InferenceFailed(format!(
                "SCRFD model needs at least 6 outputs (3 strides × score/bbox), got {}",
                output_names.len()
            )));
        }

        let stride_outputs = map_stride_outputs(&output_names);
        tracing::debug!(?stride_outputs, "SCRFD output tensor mapping");

        Ok(Self {
            session,
            quality,
            stride_outputs,
        })
    }

    /// Letterbox an RGB frame into a normalized NCHW tensor.
    fn preprocess(frame: &RgbImage, size: usize) -> (Array4<f32>, Letterbox) {
        let (w, h) = frame.dimensions();
        let scale = (size as f32 / w as f32).min(size as f32 / h as f32);
        let new_w = ((w as f32 * scale).round() as u32).clamp(1, size as u32);
        let new_h = ((h as f32 * scale).round() as u32).clamp(1, size as u32);
        let pad_x = (size as u32 - new_w) / 2;
        let pad_y = (size as u32 - new_h) / 2;

        let resized = imageops::resize(frame, new_w, new_h, FilterType::Triangle);

        // Zero is the normalized mean, so untouched cells act as padding.
        let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
        for (x, y, p) in resized.enumerate_pixels() {
            let (tx, ty) = ((x + pad_x) as usize, (y + pad_y) as usize);
            for c in 0..3 {
                tensor[[0, c, ty, tx]] = (p.0[c] as f32 - SCRFD_MEAN) / SCRFD_STD;
            }
        }

        let letterbox = Letterbox {
            scale,
            pad_x: pad_x as f32,
            pad_y: pad_y as f32,
        };
        (tensor, letterbox)
    }
}

impl FaceLocator for FaceDetector {
    fn locate(&mut self, frame: &RgbImage) -> Result<Vec<FaceBox>, DetectorError> {
        let (w, h) = frame.dimensions();
        if w == 0 || h == 0 {
            return Ok(Vec::new());
        }

        let size = self.quality.input_size();
        let (input, letterbox) = Self::preprocess(frame, size);
        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let mut candidates = Vec::new();
        for (&stride, &(score_idx, bbox_idx)) in SCRFD_STRIDES.iter().zip(&self.stride_outputs) {
            let (_, scores) = outputs[score_idx].try_extract_tensor::<f32>().map_err(|e| {
                DetectorError::InferenceFailed(format!("scores stride {stride}: {e}"))
            })?;
            let (_, bboxes) = outputs[bbox_idx].try_extract_tensor::<f32>().map_err(|e| {
                DetectorError::InferenceFailed(format!("bboxes stride {stride}: {e}"))
            })?;
            candidates.extend(decode_stride(
                scores,
                bboxes,
                stride,
                size,
                &letterbox,
                SCRFD_CONFIDENCE_THRESHOLD,
            ));
        }

        Ok(nms(candidates, SCRFD_NMS_THRESHOLD)
            .into_iter()
            .filter_map(|c| c.to_face_box(w, h))
            .collect())
    }

    fn set_quality(&mut self, quality: DetectionQuality) {
        if quality != self.quality {
            tracing::info!(quality = quality.as_str(), "detection quality changed");
            self.quality = quality;
        }
    }
}

/// Map stride slots to output tensors.
///
/// Exports either name their tensors `score_8`, `bbox_16`, … or use generic
/// numeric names in the standard order `[scores 8/16/32, bboxes 8/16/32, …]`.
fn map_stride_outputs(names: &[String]) -> [(usize, usize); 3] {
    let find = |prefix: &str, stride: usize| {
        let target = format!("{prefix}_{stride}");
        names.iter().position(|n| *n == target)
    };

    let named: Option<Vec<(usize, usize)>> = SCRFD_STRIDES
        .iter()
        .map(|&s| Some((find("score", s)?, find("bbox", s)?)))
        .collect();

    match named {
        Some(v) => [v[0], v[1], v[2]],
        None => [(0, 3), (1, 4), (2, 5)],
    }
}

/// Decode the detections of one stride level into frame coordinates.
fn decode_stride(
    scores: &[f32],
    bboxes: &[f32],
    stride: usize,
    input_size: usize,
    letterbox: &Letterbox,
    threshold: f32,
) -> Vec<Candidate> {
    let grid = input_size / stride;
    let anchors = grid * grid * SCRFD_ANCHORS_PER_CELL;
    let s = stride as f32;

    (0..anchors)
        .filter_map(|idx| {
            let score = *scores.get(idx)?;
            if score <= threshold {
                return None;
            }
            let offsets = bboxes.get(idx * 4..idx * 4 + 4)?;

            let cell = idx / SCRFD_ANCHORS_PER_CELL;
            let cx = (cell % grid) as f32 * s;
            let cy = (cell / grid) as f32 * s;

            let (x1, y1) = letterbox.unmap(cx - offsets[0] * s, cy - offsets[1] * s);
            let (x2, y2) = letterbox.unmap(cx + offsets[2] * s, cy + offsets[3] * s);
            Some(Candidate { x1, y1, x2, y2, score })
        })
        .collect()
}

/// Greedy non-maximum suppression, highest score first.
fn nms(mut candidates: Vec<Candidate>, iou_threshold: f32) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut keep: Vec<Candidate> = Vec::with_capacity(candidates.len());
    for c in candidates {
        if keep.iter().all(|k| iou(k, &c) <= iou_threshold) {
            keep.push(c);
        }
    }
    keep
}

fn iou(a: &Candidate, b: &Candidate) -> f32 {
    let inter = Candidate {
        x1: a.x1.max(b.x1),
        y1: a.y1.max(b.y1),
        x2: a.x2.min(b.x2),
        y2: a.y2.min(b.y2),
        score: 0.0,
    }
    .area();
    let union = a.area() + b.area() - inter;
    if union > 0.0 {
        inter / union
    } else {
        0.0
    }
}
