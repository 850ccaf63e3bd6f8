//! Similarity between two face crops.
//!
//! The pipeline only talks to [`SimilarityScorer`]. [`EmbeddingScorer`]
//! implements it on top of any [`FaceEmbedder`] using cosine distance, where
//! `0.0` means identical embeddings and `2.0` means opposite ones.

use image::imageops::FilterType;
use tracing::{debug, warn};

use crate::crop::FaceImage;
use crate::error::VerifyError;

/// Distance capability consumed by the verifier.
pub trait SimilarityScorer: Send + Sync {
    /// Non-negative distance between two faces. Must be deterministic.
    fn score(&self, a: &FaceImage, b: &FaceImage) -> Result<f32, VerifyError>;
}

/// Produces an identity embedding for one face crop.
pub trait FaceEmbedder: Send + Sync {
    /// Embedding vector for `face`.
    fn embed(&self, face: &FaceImage) -> Result<Vec<f32>, VerifyError>;

    /// Short backend name for logs.
    fn name(&self) -> &'static str;
}

/// Scores faces by the cosine distance of their embeddings.
pub struct EmbeddingScorer<E> {
    embedder: E,
}

impl<E: FaceEmbedder> EmbeddingScorer<E> {
    /// Wrap an embedder.
    pub fn new(embedder: E) -> Self {
        Self { embedder }
    }

    /// The wrapped embedder.
    pub fn embedder(&self) -> &E {
        &self.embedder
    }
}

impl<E: FaceEmbedder> SimilarityScorer for EmbeddingScorer<E> {
    fn score(&self, a: &FaceImage, b: &FaceImage) -> Result<f32, VerifyError> {
        let lhs = self.embedder.embed(a)?;
        let rhs = self.embedder.embed(b)?;
        let distance = cosine_distance(&lhs, &rhs)?;
        debug!(
            backend = self.embedder.name(),
            dim = lhs.len(),
            distance,
            "Scored face pair"
        );
        Ok(distance)
    }
}

/// `1 - cos(lhs, rhs)`, clamped to `[0, 2]`.
pub fn cosine_distance(lhs: &[f32], rhs: &[f32]) -> Result<f32, VerifyError> {
    if lhs.is_empty() || rhs.is_empty() {
        return Err(VerifyError::Scoring("empty embedding".to_string()));
    }
    if lhs.len() != rhs.len() {
        return Err(VerifyError::Scoring(format!(
            "embedding length mismatch: {} vs {}",
            lhs.len(),
            rhs.len()
        )));
    }

    let mut dot = 0.0f64;
    let mut norm_lhs = 0.0f64;
    let mut norm_rhs = 0.0f64;
    for (l, r) in lhs.iter().zip(rhs.iter()) {
        let (l, r) = (*l as f64, *r as f64);
        dot += l * r;
        norm_lhs += l * l;
        norm_rhs += r * r;
    }

    if norm_lhs == 0.0 || norm_rhs == 0.0 {
        return Err(VerifyError::Scoring("zero-norm embedding".to_string()));
    }

    let distance = 1.0 - dot / (norm_lhs.sqrt() * norm_rhs.sqrt());
    if !distance.is_finite() {
        return Err(VerifyError::Scoring(format!(
            "non-finite distance {distance}"
        )));
    }
    Ok(distance.clamp(0.0, 2.0) as f32)
}

/// Side length of the grid sampled by [`PixelEmbedder`].
const PIXEL_GRID: u32 = 32;

/// Model-free embedder: a mean-centred, unit-length grayscale thumbnail.
///
/// Deterministic and dependency-free, but only tells apart near-identical
/// crops. Use it when no embedding model is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct PixelEmbedder;

impl PixelEmbedder {
    /// Create the embedder, logging that no model is in use.
    pub fn new() -> Self {
        warn!("Using pixel-signature embedder; configure an embedding model for real matching");
        Self
    }
}

impl FaceEmbedder for PixelEmbedder {
    fn embed(&self, face: &FaceImage) -> Result<Vec<f32>, VerifyError> {
        if face.is_empty() {
            return Err(VerifyError::Scoring("empty face crop".to_string()));
        }

        let gray = image::imageops::grayscale(face.pixels());
        let thumb = image::imageops::resize(&gray, PIXEL_GRID, PIXEL_GRID, FilterType::Triangle);
        let values: Vec<f32> = thumb.as_raw().iter().map(|v| *v as f32 / 255.0).collect();
        let mean = values.iter().sum::<f32>() / values.len() as f32;

        let mut centred: Vec<f32> = values.iter().map(|v| v - mean).collect();
        let norm = centred.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut centred {
                *v /= norm;
            }
        }
        Ok(centred)
    }

    fn name(&self) -> &'static str {
        "pixel"
    }
}
