use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use tracing::{debug, info};

use crate::error::VerifyError;
use crate::face_detector::{FaceBounds, FaceDetector};
use crate::locate::DEFAULT_MIN_FACE_SIZE;

/// Face detector backed by the `rustface` crate (SeetaFace funnel cascade).
///
/// The model is parsed once; each call builds a fresh detector from a clone of
/// it, so one instance can serve concurrent requests.
pub struct RustfaceDetector {
    model: rustface::Model,
    min_face_size: u32,
    score_thresh: f64,
}

impl RustfaceDetector {
    /// Load a SeetaFace frontal model (`seeta_fd_frontal_v1.0.bin`) from disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, VerifyError> {
        let path = path.as_ref();
        let model_load = |message: String| VerifyError::ModelLoad {
            path: path.display().to_string(),
            message,
        };

        let file = File::open(path).map_err(|e| model_load(e.to_string()))?;
        let model =
            rustface::read_model(BufReader::new(file)).map_err(|e| model_load(e.to_string()))?;
        info!(path = %path.display(), "Loaded SeetaFace detector model");

        Ok(Self {
            model,
            min_face_size: DEFAULT_MIN_FACE_SIZE,
            score_thresh: 2.0,
        })
    }

    /// Smallest face side, in pixels, the cascade will search for (default: 50).
    pub fn min_face_size(mut self, size: u32) -> Self {
        self.min_face_size = size.max(20);
        self
    }

    /// Minimum cascade score for a window to count as a face (default: 2.0).
    ///
    /// Raise it to trade recall for precision.
    pub fn score_thresh(mut self, thresh: f64) -> Self {
        self.score_thresh = thresh;
        self
    }
}

impl FaceDetector for RustfaceDetector {
    fn detect(&self, gray: &[u8], width: u32, height: u32) -> Vec<FaceBounds> {
        let mut detector = rustface::create_detector_with_model(self.model.clone());
        detector.set_min_face_size(self.min_face_size);
        detector.set_score_thresh(self.score_thresh);
        detector.set_pyramid_scale_factor(0.8);
        detector.set_slide_window_step(4, 4);

        let faces = detector.detect(&rustface::ImageData::new(gray, width, height));
        debug!(count = faces.len(), width, height, "SeetaFace detection finished");

        faces
            .iter()
            .map(|face| {
                let bbox = face.bbox();
                FaceBounds {
                    x: bbox.x() as f64,
                    y: bbox.y() as f64,
                    width: bbox.width() as f64,
                    height: bbox.height() as f64,
                    confidence: face.score(),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn missing_model_is_a_model_load_error() {
        let err = RustfaceDetector::from_path("/nonexistent/seeta_fd_frontal_v1.0.bin")
            .err()
            .unwrap();
        assert!(matches!(err, VerifyError::ModelLoad { .. }));
        assert_eq!(err.code(), ErrorCode::InternalError);
    }
}
