use std::path::Path;

use image::imageops::FilterType;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use parking_lot::Mutex;
use tracing::info;

use crate::crop::FaceImage;
use crate::error::VerifyError;
use crate::scoring::FaceEmbedder;

/// Memory layout of the model's image input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TensorLayout {
    /// `[1, 3, H, W]`, as exported by ArcFace/InsightFace.
    #[default]
    Nchw,
    /// `[1, H, W, 3]`, as exported by Keras FaceNet.
    Nhwc,
}

/// Face embedder running an ONNX model (FaceNet, ArcFace, ...) through ONNX Runtime.
///
/// The session is guarded by a mutex; embeddings are L2-normalised.
pub struct OnnxEmbedder {
    session: Mutex<Session>,
    input_size: u32,
    layout: TensorLayout,
}

impl OnnxEmbedder {
    /// Load the model at `path`.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, VerifyError> {
        let path = path.as_ref();
        let model_load = |message: String| VerifyError::ModelLoad {
            path: path.display().to_string(),
            message,
        };

        let builder = Session::builder().map_err(|e| model_load(e.to_string()))?;
        let builder = builder
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| model_load(e.to_string()))?;
        let session = builder
            .commit_from_file(path)
            .map_err(|e| model_load(e.to_string()))?;
        info!(path = %path.display(), "Loaded ONNX face embedding model");

        Ok(Self {
            session: Mutex::new(session),
            input_size: 160,
            layout: TensorLayout::default(),
        })
    }

    /// Square input side expected by the model (default: 160, FaceNet).
    pub fn input_size(mut self, size: u32) -> Self {
        self.input_size = size;
        self
    }

    /// Input tensor layout (default: NCHW).
    pub fn layout(mut self, layout: TensorLayout) -> Self {
        self.layout = layout;
        self
    }

    fn preprocess(&self, face: &FaceImage) -> Vec<f32> {
        let size = self.input_size;
        let resized = image::imageops::resize(face.pixels(), size, size, FilterType::Triangle);
        let normalize = |v: u8| (v as f32 - 127.5) / 128.0;

        let mut data = Vec::with_capacity((3 * size * size) as usize);
        match self.layout {
            TensorLayout::Nchw => {
                for c in 0..3 {
                    for pixel in resized.pixels() {
                        data.push(normalize(pixel[c]));
                    }
                }
            }
            TensorLayout::Nhwc => {
                for pixel in resized.pixels() {
                    data.extend(pixel.0.iter().map(|v| normalize(*v)));
                }
            }
        }
        data
    }
}

impl FaceEmbedder for OnnxEmbedder {
    fn embed(&self, face: &FaceImage) -> Result<Vec<f32>, VerifyError> {
        if face.is_empty() {
            return Err(VerifyError::Scoring("empty face crop".to_string()));
        }

        let size = self.input_size as usize;
        let shape = match self.layout {
            TensorLayout::Nchw => [1usize, 3, size, size],
            TensorLayout::Nhwc => [1usize, size, size, 3],
        };
        let input = Tensor::from_array((shape, self.preprocess(face)))
            .map_err(|e| VerifyError::Scoring(format!("failed to build input tensor: {e}")))?;

        let mut session = self.session.lock();
        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| VerifyError::Scoring(format!("embedding inference failed: {e}")))?;
        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| VerifyError::Scoring(format!("unexpected embedding output: {e}")))?;

        let mut embedding = raw.to_vec();
        let norm = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm == 0.0 || !norm.is_finite() {
            return Err(VerifyError::Scoring(
                "model produced a degenerate embedding".to_string(),
            ));
        }
        for x in &mut embedding {
            *x /= norm;
        }
        Ok(embedding)
    }

    fn name(&self) -> &'static str {
        "onnx"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_model_is_a_model_load_error() {
        let err = OnnxEmbedder::from_path("/nonexistent/facenet.onnx")
            .err()
            .unwrap();
        assert!(matches!(err, VerifyError::ModelLoad { .. }));
    }
}
