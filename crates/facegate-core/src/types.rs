use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Bounding box for a detected face, with optional facial landmarks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
}

impl BoundingBox {
    /// Integer pixel rectangle `(x, y, width, height)` clipped to a
    /// `frame_width` × `frame_height` image.
    ///
    /// Returns `None` when nothing of the box lies inside the image.
    pub fn pixel_rect(&self, frame_width: u32, frame_height: u32) -> Option<(u32, u32, u32, u32)> {
        let left = self.x.floor().max(0.0);
        let top = self.y.floor().max(0.0);
        let right = (self.x + self.width).ceil().min(frame_width as f32);
        let bottom = (self.y + self.height).ceil().min(frame_height as f32);

        if right <= left || bottom <= top {
            return None;
        }

        Some((
            left as u32,
            top as u32,
            (right - left) as u32,
            (bottom - top) as u32,
        ))
    }
}

/// Face embedding vector (512-dimensional for ArcFace).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
    /// Model version that produced this embedding (e.g., "w600k_r50").
    #[serde(default)]
    pub model_version: Option<String>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self {
            values,
            model_version: None,
        }
    }

    pub fn dim(&self) -> usize {
        self.values.len()
    }

    /// Compute cosine similarity between two embeddings.
    ///
    /// Returns a value in [-1, 1]. Higher = more similar.
    pub fn similarity(&self, other: &Embedding) -> f32 {
        let mut dot = 0.0f32;
        let mut norm_a = 0.0f32;
        let mut norm_b = 0.0f32;

        for (a, b) in self.values.iter().zip(other.values.iter()) {
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }

        let denom = norm_a.sqrt() * norm_b.sqrt();
        if denom > 0.0 { dot / denom } else { 0.0 }
    }
}

/// A persisted embedding together with the display name that owns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub name: String,
    pub embedding: Embedding,
    /// RFC 3339 timestamp of the enrollment that wrote this record.
    pub created_at: String,
}

impl EmbeddingRecord {
    pub fn new(name: impl Into<String>, embedding: Embedding) -> Self {
        Self {
            name: name.into(),
            embedding,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ComparisonError {
    #[error("embedding dimension mismatch: known {known}, probe {probe}")]
    DimensionMismatch { known: usize, probe: usize },
    #[error("embedding is empty")]
    Empty,
    #[error("embedding contains non-finite values")]
    NonFinite,
}

/// Cosine-similarity matcher with a fixed acceptance threshold.
#[derive(Debug, Clone, Copy)]
pub struct CosineMatcher {
    pub threshold: f32,
}

impl CosineMatcher {
    /// Cosine similarity threshold tuned for L2-normalised ArcFace embeddings.
    pub const DEFAULT_THRESHOLD: f32 = 0.40;

    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    /// Compare `probe` against every `known` embedding, returning one
    /// verdict per known embedding in the same order.
    ///
    /// Fails as a whole if any pair is not comparable.
    pub fn compare(&self, known: &[Embedding], probe: &Embedding) -> Result<Vec<bool>, ComparisonError> {
        check_comparable(probe, probe)?;
        known
            .iter()
            .map(|candidate| {
                check_comparable(candidate, probe)?;
                Ok(candidate.similarity(probe) >= self.threshold)
            })
            .collect()
    }
}

impl Default for CosineMatcher {
    fn default() -> Self {
        Self::new(Self::DEFAULT_THRESHOLD)
    }
}

fn check_comparable(known: &Embedding, probe: &Embedding) -> Result<(), ComparisonError> {
    if known.values.is_empty() || probe.values.is_empty() {
        return Err(ComparisonError::Empty);
    }
    if known.dim() != probe.dim() {
        return Err(ComparisonError::DimensionMismatch {
            known: known.dim(),
            probe: probe.dim(),
        });
    }
    if !known.values.iter().all(|v| v.is_finite()) {
        return Err(ComparisonError::NonFinite);
    }
    Ok(())
}
