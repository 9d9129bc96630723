//! The face-embedding provider seam and its ONNX implementation.

use crate::detector::{DetectorError, FaceDetector};
use crate::recognizer::{FaceRecognizer, RecognizerError};
use crate::types::{BoundingBox, ComparisonError, CosineMatcher, Embedding};
use image::DynamicImage;
use std::path::Path;
use thiserror::Error;

/// SCRFD detection model file name inside the model directory.
pub const DETECTOR_MODEL_FILE: &str = "det_10g.onnx";
/// ArcFace recognition model file name inside the model directory.
pub const RECOGNIZER_MODEL_FILE: &str = "w600k_r50.onnx";

#[derive(Error, Debug)]
pub enum EmbedderError {
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer error: {0}")]
    Recognizer(#[from] RecognizerError),
}

/// Face detection, encoding and comparison capability.
///
/// Callers decide which representation each step sees; the workflows locate
/// on a luma image and encode on the original colour frame.
pub trait FaceEmbedder {
    /// Locate faces in `image`, most confident first. May be empty.
    fn locate_faces(&mut self, image: &DynamicImage) -> Result<Vec<BoundingBox>, EmbedderError>;

    /// Encode one embedding per location, in the same order.
    fn encode_faces(
        &mut self,
        image: &DynamicImage,
        faces: &[BoundingBox],
    ) -> Result<Vec<Embedding>, EmbedderError>;

    /// Compare `probe` against each `known` embedding under the provider's
    /// default threshold; one verdict per known embedding.
    fn compare_faces(&self, known: &[Embedding], probe: &Embedding) -> Result<Vec<bool>, ComparisonError>;
}

/// SCRFD + ArcFace provider.
pub struct OnnxEmbedder {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
    matcher: CosineMatcher,
}

impl OnnxEmbedder {
    /// Load both models from `model_dir`, failing fast if either is missing.
    pub fn load(model_dir: &Path, threshold: f32) -> Result<Self, EmbedderError> {
        let detector = FaceDetector::load(&model_dir.join(DETECTOR_MODEL_FILE))?;
        let recognizer = FaceRecognizer::load(&model_dir.join(RECOGNIZER_MODEL_FILE))?;
        tracing::info!(model_dir = %model_dir.display(), threshold, "face embedder ready");

        Ok(Self {
            detector,
            recognizer,
            matcher: CosineMatcher::new(threshold),
        })
    }
}

impl FaceEmbedder for OnnxEmbedder {
    fn locate_faces(&mut self, image: &DynamicImage) -> Result<Vec<BoundingBox>, EmbedderError> {
        let faces = self.detector.detect(&image.to_luma8())?;
        tracing::debug!(count = faces.len(), "located faces");
        Ok(faces)
    }

    fn encode_faces(
        &mut self,
        image: &DynamicImage,
        faces: &[BoundingBox],
    ) -> Result<Vec<Embedding>, EmbedderError> {
        let rgb = image.to_rgb8();
        faces
            .iter()
            .map(|face| Ok(self.recognizer.extract(&rgb, face)?))
            .collect()
    }

    fn compare_faces(&self, known: &[Embedding], probe: &Embedding) -> Result<Vec<bool>, ComparisonError> {
        self.matcher.compare(known, probe)
    }
}
