use std::borrow::Cow;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use image::RgbImage;
use tracing::{debug, error, info, warn};

use crate::crop::{crop_face, persist_crop, FaceImage};
use crate::decision::{decide, Decision, MatchPolarity, DEFAULT_THRESHOLD};
use crate::decode::{decode_base64_image, decode_via_scratch, DEFAULT_MAX_IMAGE_BYTES};
use crate::error::{ErrorCode, ImageRole, VerifyError};
use crate::face_detector::FaceDetector;
use crate::locate::{locate_primary_face, BoundingBox, DEFAULT_MIN_FACE_SIZE};
use crate::request::{VerificationPayload, VerificationRequest, VerificationResult};
use crate::scoring::SimilarityScorer;
use crate::scratch::{request_namespace, ScratchStore};

/// Pipeline stage, reported in logs when a request stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Turning uploads into pixels.
    Decode,
    /// Finding the face in each photo.
    Locate,
    /// Cutting the faces out.
    Crop,
    /// Comparing the two faces.
    Score,
    /// Applying the threshold.
    Decide,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Decode => "decode",
            Stage::Locate => "locate",
            Stage::Crop => "crop",
            Stage::Score => "score",
            Stage::Decide => "decide",
        };
        f.write_str(name)
    }
}

/// Document-versus-selfie face verification.
///
/// Holds the detector, scorer and scratch store shared by every request.
/// Each call to [`Verifier::verify`] runs
/// decode → locate → crop → score → decide for both photos and stops at the
/// first failure.
///
/// ```no_run
/// use std::sync::Arc;
/// use facematch::{
///     DirectoryScratch, EmbeddingScorer, PixelEmbedder, RustfaceDetector, Verifier,
///     VerificationRequest,
/// };
///
/// let detector = RustfaceDetector::from_path("model/seeta_fd_frontal_v1.0.bin").unwrap();
/// let verifier = Verifier::new(
///     Arc::new(detector),
///     Arc::new(EmbeddingScorer::new(PixelEmbedder::new())),
///     Arc::new(DirectoryScratch::new("uploads").unwrap()),
/// )
/// .threshold(0.4);
///
/// let result = verifier.verify(&VerificationRequest {
///     subject_id: "u1".into(),
///     document_image: std::fs::read("license.jpg").unwrap(),
///     selfie_image: std::fs::read("selfie.jpg").unwrap(),
/// });
/// println!("verified: {}", result.is_verified());
/// ```
pub struct Verifier {
    detector: Arc<dyn FaceDetector>,
    scorer: Arc<dyn SimilarityScorer>,
    scratch: Arc<dyn ScratchStore>,
    threshold: f32,
    polarity: MatchPolarity,
    min_face_size: u32,
    max_image_bytes: usize,
    persist_crops: bool,
}

impl Verifier {
    /// Create a verifier with the reference settings: threshold 0.55,
    /// [`MatchPolarity::DistanceAtMost`], 50 px minimum face, 16 MiB per image,
    /// crops persisted.
    pub fn new(
        detector: Arc<dyn FaceDetector>,
        scorer: Arc<dyn SimilarityScorer>,
        scratch: Arc<dyn ScratchStore>,
    ) -> Self {
        Self {
            detector,
            scorer,
            scratch,
            threshold: DEFAULT_THRESHOLD,
            polarity: MatchPolarity::default(),
            min_face_size: DEFAULT_MIN_FACE_SIZE,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            persist_crops: true,
        }
    }

    /// Set the decision threshold (default: 0.55).
    pub fn threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Set which side of the threshold is a match.
    pub fn polarity(mut self, polarity: MatchPolarity) -> Self {
        self.polarity = polarity;
        self
    }

    /// Smallest accepted face side in pixels (default: 50).
    pub fn min_face_size(mut self, size: u32) -> Self {
        self.min_face_size = size.max(1);
        self
    }

    /// Upper bound on each encoded image (default: 16 MiB).
    pub fn max_image_bytes(mut self, bytes: usize) -> Self {
        self.max_image_bytes = bytes;
        self
    }

    /// Whether face crops are written to scratch storage (default: true).
    pub fn persist_crops(mut self, enable: bool) -> Self {
        self.persist_crops = enable;
        self
    }

    /// Current decision threshold.
    pub fn current_threshold(&self) -> f32 {
        self.threshold
    }

    /// Current match polarity.
    pub fn current_polarity(&self) -> MatchPolarity {
        self.polarity
    }

    /// Validate a JSON payload, then verify it.
    ///
    /// Each image string is base64-decoded inside its own decode stage, so a
    /// broken document is reported before the selfie string is looked at.
    pub fn verify_payload(&self, payload: VerificationPayload) -> VerificationResult {
        if let Err(err) = payload.validate() {
            warn!(error = %err, "Rejected verification payload");
            return VerificationResult::from(&err);
        }
        let (Some(subject_id), Some(document), Some(selfie)) = (
            payload.subject_id.as_deref(),
            payload.document_image.as_deref(),
            payload.selfie_image.as_deref(),
        ) else {
            return VerificationResult::failed(ErrorCode::InvalidPayload);
        };

        self.execute(subject_id, Upload::Encoded(document), Upload::Encoded(selfie))
    }

    /// Verify one document/selfie pair.
    ///
    /// Never panics: a panic inside a detector or scorer is reported as
    /// [`ErrorCode::InternalError`].
    pub fn verify(&self, request: &VerificationRequest) -> VerificationResult {
        self.execute(
            &request.subject_id,
            Upload::Raw(&request.document_image),
            Upload::Raw(&request.selfie_image),
        )
    }

    fn execute(
        &self,
        subject_id: &str,
        document: Upload<'_>,
        selfie: Upload<'_>,
    ) -> VerificationResult {
        let namespace = request_namespace(subject_id);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.run(subject_id, document, selfie, &namespace)
        }));
        match outcome {
            Ok(Ok(result)) => result,
            Ok(Err((stage, err))) => {
                let code = err.code();
                if code == ErrorCode::InternalError {
                    error!(
                        subject_id,
                        %namespace,
                        %stage,
                        error = %err,
                        "Verification failed"
                    );
                } else {
                    info!(
                        subject_id,
                        %namespace,
                        %stage,
                        %code,
                        error = %err,
                        "Verification stopped"
                    );
                }
                VerificationResult::from(&err)
            }
            Err(_) => {
                error!(subject_id, %namespace, "Verification panicked");
                VerificationResult::failed(ErrorCode::InternalError)
            }
        }
    }

    fn run(
        &self,
        subject_id: &str,
        document: Upload<'_>,
        selfie: Upload<'_>,
        namespace: &str,
    ) -> Result<VerificationResult, (Stage, VerifyError)> {
        if subject_id.trim().is_empty() {
            return Err((
                Stage::Decode,
                VerifyError::InvalidPayload("subject id is empty".to_string()),
            ));
        }

        let at = |stage: Stage| move |err: VerifyError| (stage, err);

        let (document, document_key) = self
            .decode(document, ImageRole::Document, namespace)
            .map_err(at(Stage::Decode))?;
        let (selfie, selfie_key) = self
            .decode(selfie, ImageRole::Selfie, namespace)
            .map_err(at(Stage::Decode))?;

        let document_box = self
            .locate(&document, ImageRole::Document)
            .map_err(at(Stage::Locate))?;
        let selfie_box = self
            .locate(&selfie, ImageRole::Selfie)
            .map_err(at(Stage::Locate))?;

        let document_face = crop_face(&document, document_box);
        let selfie_face = crop_face(&selfie, selfie_box);
        if self.persist_crops {
            persist_crop(self.scratch.as_ref(), &document_key, &document_face)
                .map_err(at(Stage::Crop))?;
            persist_crop(self.scratch.as_ref(), &selfie_key, &selfie_face)
                .map_err(at(Stage::Crop))?;
        }

        let distance = self
            .score(&document_face, &selfie_face)
            .map_err(at(Stage::Score))?;

        let decision = decide(distance, self.threshold, self.polarity);
        info!(
            subject_id,
            %namespace,
            distance,
            threshold = self.threshold,
            polarity = %self.polarity,
            verified = decision == Decision::Verified,
            "Verification decided"
        );

        Ok(match decision {
            Decision::Verified => VerificationResult::verified(distance),
            Decision::NotVerified => VerificationResult::below_threshold(distance),
        })
    }

    /// Turn one upload into pixels, returning the scratch key it was stored under.
    fn decode(
        &self,
        upload: Upload<'_>,
        role: ImageRole,
        namespace: &str,
    ) -> Result<(RgbImage, String), VerifyError> {
        let bytes = match upload {
            Upload::Raw(bytes) => Cow::Borrowed(bytes),
            Upload::Encoded(text) => Cow::Owned(decode_base64_image(text, role)?),
        };
        let key = upload_key(namespace, role, &bytes);
        let image = decode_via_scratch(
            &bytes,
            role,
            &key,
            self.max_image_bytes,
            self.scratch.as_ref(),
        )?;
        debug!(%role, key, width = image.width(), height = image.height(), "Decoded image");
        Ok((image, key))
    }

    fn locate(
        &self,
        image: &RgbImage,
        role: ImageRole,
    ) -> Result<BoundingBox, VerifyError> {
        let bbox = locate_primary_face(self.detector.as_ref(), image, self.min_face_size)
            .ok_or(VerifyError::FaceNotFound { role })?;
        debug!(
            %role,
            x = bbox.x,
            y = bbox.y,
            width = bbox.width,
            height = bbox.height,
            "Located face"
        );
        Ok(bbox)
    }

    fn score(&self, document: &FaceImage, selfie: &FaceImage) -> Result<f32, VerifyError> {
        if document.is_empty() || selfie.is_empty() {
            return Err(VerifyError::Internal("empty face crop".to_string()));
        }
        let distance = self.scorer.score(document, selfie)?;
        if !distance.is_finite() || distance < 0.0 {
            return Err(VerifyError::Scoring(format!(
                "scorer returned invalid distance {distance}"
            )));
        }
        Ok(distance)
    }
}

/// An image as handed to the verifier: raw bytes or a base64 string.
#[derive(Clone, Copy)]
enum Upload<'a> {
    Raw(&'a [u8]),
    Encoded(&'a str),
}

/// Scratch key for an upload: `{namespace}_{role}.{ext}`.
fn upload_key(namespace: &str, role: ImageRole, bytes: &[u8]) -> String {
    let ext = image::guess_format(bytes)
        .ok()
        .and_then(|format| format.extensions_str().first().copied())
        .unwrap_or("bin");
    format!("{namespace}_{role}.{ext}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::face_detector::FaceBounds;
    use crate::scratch::DirectoryScratch;
    use image::ImageEncoder;
    use tempfile::TempDir;

    struct CentreDetector;

    impl FaceDetector for CentreDetector {
        fn detect(&self, _gray: &[u8], width: u32, height: u32) -> Vec<FaceBounds> {
            vec![FaceBounds {
                x: width as f64 / 4.0,
                y: height as f64 / 4.0,
                width: width as f64 / 2.0,
                height: height as f64 / 2.0,
                confidence: 5.0,
            }]
        }
    }

    struct ConstScorer(f32);

    impl SimilarityScorer for ConstScorer {
        fn score(&self, _a: &FaceImage, _b: &FaceImage) -> Result<f32, VerifyError> {
            Ok(self.0)
        }
    }

    struct PanickingScorer;

    impl SimilarityScorer for PanickingScorer {
        fn score(&self, _a: &FaceImage, _b: &FaceImage) -> Result<f32, VerifyError> {
            panic!("model exploded");
        }
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 90])
        });
        let mut buffer = Vec::new();
        image::codecs::png::PngEncoder::new(&mut buffer)
            .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
            .unwrap();
        buffer
    }

    fn verifier(tmp: &TempDir, scorer: Arc<dyn SimilarityScorer>) -> Verifier {
        Verifier::new(
            Arc::new(CentreDetector),
            scorer,
            Arc::new(DirectoryScratch::new(tmp.path()).unwrap()),
        )
    }

    fn request(document: Vec<u8>, selfie: Vec<u8>) -> VerificationRequest {
        VerificationRequest {
            subject_id: "u1".into(),
            document_image: document,
            selfie_image: selfie,
        }
    }

    fn pair() -> VerificationRequest {
        request(png(200, 200), png(200, 200))
    }

    #[test]
    fn small_distance_verifies_by_default() {
        let tmp = TempDir::new().unwrap();
        let result = verifier(&tmp, Arc::new(ConstScorer(0.2))).verify(&pair());
        assert_eq!(result, VerificationResult::verified(0.2));
    }

    #[test]
    fn large_distance_is_below_threshold() {
        let tmp = TempDir::new().unwrap();
        let result = verifier(&tmp, Arc::new(ConstScorer(0.9))).verify(&pair());
        assert_eq!(result, VerificationResult::below_threshold(0.9));
    }

    #[test]
    fn reference_polarity_flips_the_decision() {
        let tmp = TempDir::new().unwrap();
        let result = verifier(&tmp, Arc::new(ConstScorer(0.9)))
            .polarity(MatchPolarity::DistanceAtLeast)
            .verify(&pair());
        assert!(result.is_verified());
    }

    #[test]
    fn negative_distance_is_a_scoring_error() {
        let tmp = TempDir::new().unwrap();
        let result = verifier(&tmp, Arc::new(ConstScorer(-0.1))).verify(&pair());
        assert_eq!(result.error_code(), Some(ErrorCode::ScoringError));
        assert_eq!(result.similarity_score(), None);
    }

    #[test]
    fn scorer_panic_becomes_internal_error() {
        let tmp = TempDir::new().unwrap();
        let result = verifier(&tmp, Arc::new(PanickingScorer)).verify(&pair());
        assert_eq!(result, VerificationResult::failed(ErrorCode::InternalError));
    }

    #[test]
    fn oversize_selfie_is_a_selfie_decode_error() {
        let tmp = TempDir::new().unwrap();
        let document = png(200, 200);
        let limit = document.len();
        let mut selfie = png(200, 200);
        selfie.resize(limit + 1, 0);
        let result = verifier(&tmp, Arc::new(ConstScorer(0.1)))
            .max_image_bytes(limit)
            .verify(&request(document, selfie));
        assert_eq!(result.error_code(), Some(ErrorCode::SelfieDecodeError));
    }

    #[test]
    fn crops_are_persisted_next_to_uploads() {
        let tmp = TempDir::new().unwrap();
        verifier(&tmp, Arc::new(ConstScorer(0.1))).verify(&pair());

        let names = scratch_names(&tmp);
        assert_eq!(names.len(), 4);
        assert!(names.iter().any(|n| n.ends_with("_document.png")));
        assert!(names.iter().any(|n| n.ends_with("_document_cropped.png")));
        assert!(names.iter().any(|n| n.ends_with("_selfie.png")));
        assert!(names.iter().any(|n| n.ends_with("_selfie_cropped.png")));
    }

    #[test]
    fn crop_persistence_can_be_disabled() {
        let tmp = TempDir::new().unwrap();
        verifier(&tmp, Arc::new(ConstScorer(0.1)))
            .persist_crops(false)
            .verify(&pair());
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 2);
    }

    fn scratch_names(tmp: &TempDir) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(tmp.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn payload_document_is_fully_decoded_before_selfie_string() {
        use base64::{engine::general_purpose, Engine as _};

        let tmp = TempDir::new().unwrap();
        let payload = VerificationPayload {
            subject_id: Some("u1".into()),
            document_image: Some(general_purpose::STANDARD.encode("this is not an image")),
            selfie_image: Some("%%% not base64 %%%".into()),
        };
        let result = verifier(&tmp, Arc::new(ConstScorer(0.1))).verify_payload(payload);

        assert_eq!(result.error_code(), Some(ErrorCode::DocumentDecodeError));
        let names = scratch_names(&tmp);
        assert_eq!(names.len(), 1);
        assert!(names[0].ends_with("_document.bin"));
    }

    #[test]
    fn bad_selfie_base64_is_a_selfie_decode_error() {
        use base64::{engine::general_purpose, Engine as _};

        let tmp = TempDir::new().unwrap();
        let payload = VerificationPayload {
            subject_id: Some("u1".into()),
            document_image: Some(general_purpose::STANDARD.encode(png(200, 200))),
            selfie_image: Some("%%% not base64 %%%".into()),
        };
        let result = verifier(&tmp, Arc::new(ConstScorer(0.1))).verify_payload(payload);
        assert_eq!(result.error_code(), Some(ErrorCode::SelfieDecodeError));
    }

    #[test]
    fn jpeg_upload_gets_png_crop() {
        let tmp = TempDir::new().unwrap();
        let img = RgbImage::from_fn(200, 200, |x, y| image::Rgb([x as u8, y as u8, 40]));
        let mut jpeg = Vec::new();
        image::codecs::jpeg::JpegEncoder::new(&mut jpeg)
            .write_image(img.as_raw(), 200, 200, image::ExtendedColorType::Rgb8)
            .unwrap();

        let result =
            verifier(&tmp, Arc::new(ConstScorer(0.1))).verify(&request(jpeg, png(200, 200)));
        assert!(result.is_verified());

        let names = scratch_names(&tmp);
        let crop = names
            .iter()
            .find(|n| n.ends_with("_document_cropped.png"))
            .expect("document crop stored as png");
        assert!(names.iter().any(|n| n.ends_with("_document.jpg")));
        let stored = std::fs::read(tmp.path().join(crop)).unwrap();
        assert_eq!(image::guess_format(&stored).unwrap(), image::ImageFormat::Png);
    }

    #[test]
    fn upload_key_uses_detected_extension() {
        assert_eq!(
            upload_key("u1_x", ImageRole::Document, &png(4, 4)),
            "u1_x_document.png"
        );
        assert_eq!(
            upload_key("u1_x", ImageRole::Selfie, b"garbage"),
            "u1_x_selfie.bin"
        );
    }
}
