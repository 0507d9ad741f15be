//! YOLOv8 issue detector on top of an ONNX inference backend.

use image::DynamicImage;
use ndarray::ArrayD;
use tracing::debug;

use civiclens_inference::{InferenceBackend, InputTensor, OutputTensor};

use super::preprocessing::{Letterbox, LetterboxPreprocessor};
use super::{CandidateDetection, Detector};
use crate::error::ClassificationError;

/// A detected box in original image coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedBox {
    /// Class index in model output order.
    pub class_id: usize,
    /// Class name.
    pub label: String,
    /// Confidence score (0.0 - 1.0).
    pub confidence: f32,
    /// Bounding box (x1, y1, x2, y2).
    pub bbox: [f32; 4],
}

impl DetectedBox {
    pub fn area(&self) -> f32 {
        (self.bbox[2] - self.bbox[0]).max(0.0) * (self.bbox[3] - self.bbox[1]).max(0.0)
    }

    /// Intersection over union with another box.
    pub fn iou(&self, other: &DetectedBox) -> f32 {
        let x1 = self.bbox[0].max(other.bbox[0]);
        let y1 = self.bbox[1].max(other.bbox[1]);
        let x2 = self.bbox[2].min(other.bbox[2]);
        let y2 = self.bbox[3].min(other.bbox[3]);

        if x2 <= x1 || y2 <= y1 {
            return 0.0;
        }

        let intersection = (x2 - x1) * (y2 - y1);
        let union = self.area() + other.area() - intersection;

        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }
}

/// Issue detector running a YOLOv8 export.
///
/// Expects a single output of shape `[1, 4 + classes, anchors]` (the default
/// Ultralytics export) or its transpose `[1, anchors, 4 + classes]`.
pub struct YoloDetector<B: InferenceBackend> {
    backend: B,
    labels: Vec<String>,
    preprocessor: LetterboxPreprocessor,
    iou_threshold: f32,
}

impl<B: InferenceBackend> YoloDetector<B> {
    /// Create a detector for a model trained on `labels`.
    pub fn new(backend: B, labels: Vec<String>) -> Self {
        Self {
            backend,
            labels,
            preprocessor: LetterboxPreprocessor::default(),
            iou_threshold: 0.7,
        }
    }

    /// Set the square model input size.
    pub fn with_input_size(mut self, size: u32) -> Self {
        self.preprocessor = LetterboxPreprocessor::new(size);
        self
    }

    /// Set the NMS IoU threshold.
    pub fn with_iou_threshold(mut self, threshold: f32) -> Self {
        self.iou_threshold = threshold;
        self
    }

    /// Detect boxes in a decoded image, highest confidence first.
    pub fn detect(
        &self,
        image: &DynamicImage,
        confidence_threshold: f32,
    ) -> Result<Vec<DetectedBox>, ClassificationError> {
        let letterbox = self.preprocessor.letterbox(image);

        let input_name = self
            .backend
            .input_names()
            .first()
            .map(String::as_str)
            .unwrap_or("images");
        let input = InputTensor::Float32(letterbox.tensor.clone().into_dyn());

        let outputs = self
            .backend
            .run(&[(input_name, input)])
            .map_err(|e| ClassificationError::Inference(e.to_string()))?;

        let output = outputs
            .into_iter()
            .next()
            .ok_or_else(|| ClassificationError::Inference("No output from model".to_string()))?
            .1;

        let output_arr = match output {
            OutputTensor::Float32(arr) => arr,
            other => {
                return Err(ClassificationError::Inference(format!(
                    "Unexpected integer output with shape {:?}",
                    other.shape()
                )))
            }
        };

        debug!("Detection output shape: {:?}", output_arr.shape());

        let boxes = self.decode(&output_arr, &letterbox, confidence_threshold)?;
        let boxes = self.nms(boxes);

        debug!("Kept {} boxes after NMS", boxes.len());

        Ok(boxes)
    }

    fn decode(
        &self,
        output: &ArrayD<f32>,
        letterbox: &Letterbox,
        confidence_threshold: f32,
    ) -> Result<Vec<DetectedBox>, ClassificationError> {
        let shape = output.shape();
        let num_classes = self.labels.len();
        let rows = 4 + num_classes;

        if shape.len() != 3 || shape[0] != 1 {
            return Err(ClassificationError::Inference(format!(
                "Invalid output shape: {:?}",
                shape
            )));
        }

        // [1, 4 + classes, anchors] unless the export was transposed.
        let channels_first = shape[1] == rows;
        if !channels_first && shape[2] != rows {
            return Err(ClassificationError::Inference(format!(
                "Output shape {:?} does not match {} labels",
                shape, num_classes
            )));
        }
        let anchors = if channels_first { shape[2] } else { shape[1] };
        let value = |row: usize, anchor: usize| {
            if channels_first {
                output[[0, row, anchor]]
            } else {
                output[[0, anchor, row]]
            }
        };

        let mut boxes = Vec::new();

        for anchor in 0..anchors {
            let mut class_id = 0;
            let mut score = f32::NEG_INFINITY;
            for class in 0..num_classes {
                let s = value(4 + class, anchor);
                if s > score {
                    score = s;
                    class_id = class;
                }
            }

            if score <= confidence_threshold {
                continue;
            }

            let bbox = letterbox.to_image_box(
                value(0, anchor),
                value(1, anchor),
                value(2, anchor),
                value(3, anchor),
            );

            boxes.push(DetectedBox {
                class_id,
                label: self.labels[class_id].clone(),
                confidence: score,
                bbox,
            });
        }

        Ok(boxes)
    }

    fn nms(&self, mut boxes: Vec<DetectedBox>) -> Vec<DetectedBox> {
        boxes.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut keep: Vec<DetectedBox> = Vec::new();

        for candidate in boxes {
            let suppressed = keep.iter().any(|kept| {
                kept.class_id == candidate.class_id && candidate.iou(kept) > self.iou_threshold
            });
            if !suppressed {
                keep.push(candidate);
            }
        }

        keep
    }
}

impl<B: InferenceBackend> Detector for YoloDetector<B> {
    fn predict(
        &self,
        image: &[u8],
        confidence_threshold: f32,
    ) -> Result<Vec<CandidateDetection>, ClassificationError> {
        let decoded = image::load_from_memory(image)
            .map_err(|e| ClassificationError::UnreadableImage(e.to_string()))?;

        Ok(self
            .detect(&decoded, confidence_threshold)?
            .into_iter()
            .map(|b| CandidateDetection::new(b.label, b.confidence))
            .collect())
    }
}

/// Load the configured YOLO model, recording why it is unavailable on failure.
#[cfg(feature = "native")]
pub fn load_detector(
    config: &crate::models::config::DetectionConfig,
) -> super::DetectorState<YoloDetector<civiclens_inference::OrtBackend>> {
    use civiclens_inference::OrtBackend;
    use tracing::{info, warn};

    match OrtBackend::from_file(&config.model_path, config.num_threads) {
        Ok(backend) => {
            info!("Loaded detection model from {}", config.model_path.display());
            super::DetectorState::Ready(
                YoloDetector::new(backend, config.labels.clone())
                    .with_input_size(config.input_size)
                    .with_iou_threshold(config.iou_threshold),
            )
        }
        Err(e) => {
            warn!(
                "Detection model unavailable at {}: {}",
                config.model_path.display(),
                e
            );
            super::DetectorState::unavailable(format!(
                "{}: {}",
                config.model_path.display(),
                e
            ))
        }
    }
}
