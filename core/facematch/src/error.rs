use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Which of the two submitted photos a failure refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageRole {
    /// The identity-document photo.
    Document,
    /// The live selfie.
    Selfie,
}

impl ImageRole {
    /// Lowercase name used in scratch keys and log fields.
    pub fn as_str(self) -> &'static str {
        match self {
            ImageRole::Document => "document",
            ImageRole::Selfie => "selfie",
        }
    }
}

impl fmt::Display for ImageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable, machine-readable outcome codes reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorCode {
    /// A required field was missing or blank, or the body was not JSON.
    InvalidPayload,
    /// The document photo could not be decoded.
    DocumentDecodeError,
    /// The selfie could not be decoded.
    SelfieDecodeError,
    /// No face passed detection in the document photo.
    DocumentFaceNotFound,
    /// No face passed detection in the selfie.
    SelfieFaceNotFound,
    /// The similarity capability failed.
    ScoringError,
    /// Anything unanticipated.
    InternalError,
    /// Both faces were scored but the distance fell on the wrong side of the threshold.
    BelowThreshold,
}

impl ErrorCode {
    /// Wire name of the code.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidPayload => "InvalidPayload",
            ErrorCode::DocumentDecodeError => "DocumentDecodeError",
            ErrorCode::SelfieDecodeError => "SelfieDecodeError",
            ErrorCode::DocumentFaceNotFound => "DocumentFaceNotFound",
            ErrorCode::SelfieFaceNotFound => "SelfieFaceNotFound",
            ErrorCode::ScoringError => "ScoringError",
            ErrorCode::InternalError => "InternalError",
            ErrorCode::BelowThreshold => "BelowThreshold",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while running the verification pipeline.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("failed to decode {role} image: {message}")]
    Decode { role: ImageRole, message: String },

    #[error("{role} image is {size} bytes, limit is {limit}")]
    TooLarge {
        role: ImageRole,
        size: usize,
        limit: usize,
    },

    #[error("no face detected in {role} image")]
    FaceNotFound { role: ImageRole },

    #[error("similarity scoring failed: {0}")]
    Scoring(String),

    #[error("failed to load model {path}: {message}")]
    ModelLoad { path: String, message: String },

    #[error("scratch storage error for {key}: {source}")]
    Scratch {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("internal error: {0}")]
    Internal(String),
}

impl VerifyError {
    /// Map the error onto the code reported to the caller.
    pub fn code(&self) -> ErrorCode {
        match self {
            VerifyError::InvalidPayload(_) => ErrorCode::InvalidPayload,
            VerifyError::Decode { role, .. } | VerifyError::TooLarge { role, .. } => match role {
                ImageRole::Document => ErrorCode::DocumentDecodeError,
                ImageRole::Selfie => ErrorCode::SelfieDecodeError,
            },
            VerifyError::FaceNotFound { role } => match role {
                ImageRole::Document => ErrorCode::DocumentFaceNotFound,
                ImageRole::Selfie => ErrorCode::SelfieFaceNotFound,
            },
            VerifyError::Scoring(_) => ErrorCode::ScoringError,
            VerifyError::ModelLoad { .. }
            | VerifyError::Scratch { .. }
            | VerifyError::Internal(_) => ErrorCode::InternalError,
        }
    }
}
