//! Identity verification: decide whether an identity-document photo and a
//! selfie show the same person.
//!
//! The pipeline decodes both photos, finds the most prominent face in each,
//! crops it, asks a [`SimilarityScorer`] for the distance between the two
//! faces and compares that distance to a threshold. Every failure ends the
//! request with a single stable [`ErrorCode`].
//!
//! Face detection and face embedding are pluggable: implement
//! [`FaceDetector`] or [`FaceEmbedder`] / [`SimilarityScorer`] to bring your
//! own models.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use facematch::{
//!     DirectoryScratch, EmbeddingScorer, PixelEmbedder, RustfaceDetector, VerificationPayload,
//!     Verifier,
//! };
//!
//! let verifier = Verifier::new(
//!     Arc::new(RustfaceDetector::from_path("seeta_fd_frontal_v1.0.bin").unwrap()),
//!     Arc::new(EmbeddingScorer::new(PixelEmbedder::new())),
//!     Arc::new(DirectoryScratch::new("uploads").unwrap()),
//! );
//!
//! let body = std::fs::read_to_string("request.json").unwrap();
//! let payload: VerificationPayload = serde_json::from_str(&body).unwrap();
//! let result = verifier.verify_payload(payload);
//! println!("{:?} {:?}", result.is_verified(), result.similarity_score());
//! ```
#![warn(missing_docs)]

mod crop;
mod decision;
mod decode;
mod error;
/// Face detection traits and data types.
pub mod face_detector;
mod locate;
#[cfg(feature = "onnx")]
/// ONNX Runtime face-embedding backend.
pub mod onnx_backend;
mod request;
#[cfg(feature = "rustface")]
/// Built-in SeetaFace-based face detector backend.
pub mod rustface_backend;
pub mod scoring;
mod scratch;
mod verifier;

/// Face crop type and scratch-key helper.
pub use crop::{crop_face, cropped_key, FaceImage};
/// Threshold decision.
pub use decision::{decide, Decision, MatchPolarity, DEFAULT_THRESHOLD};
/// Upload decoding.
pub use decode::{decode_base64_image, decode_image, DEFAULT_MAX_IMAGE_BYTES};
/// Error types and caller-facing codes.
pub use error::{ErrorCode, ImageRole, VerifyError};
/// Face detection trait and face bounding-box type.
pub use face_detector::{FaceBounds, FaceDetector};
/// Canonical face selection.
pub use locate::{locate_primary_face, BoundingBox, DEFAULT_MIN_FACE_SIZE};
#[cfg(feature = "onnx")]
/// Embedder backed by an ONNX face-recognition model.
pub use onnx_backend::{OnnxEmbedder, TensorLayout};
/// Request and result types.
pub use request::{VerificationPayload, VerificationRequest, VerificationResult};
#[cfg(feature = "rustface")]
/// Built-in detector that loads a SeetaFace model file.
pub use rustface_backend::RustfaceDetector;
/// Similarity scoring.
pub use scoring::{cosine_distance, EmbeddingScorer, FaceEmbedder, PixelEmbedder, SimilarityScorer};
/// Request-scoped artifact storage.
pub use scratch::{request_namespace, DirectoryScratch, ScratchStore};
/// The verification orchestrator.
pub use verifier::{Stage, Verifier};
