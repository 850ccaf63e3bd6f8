use serde::{Deserialize, Serialize};

use crate::decode::decode_base64_image;
use crate::error::{ErrorCode, ImageRole, VerifyError};

/// JSON body as received from the caller.
///
/// Every field is optional here so that a missing one is reported as
/// `InvalidPayload` rather than as a deserialisation failure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VerificationPayload {
    /// Caller's identifier for the person being verified.
    #[serde(alias = "userId")]
    pub subject_id: Option<String>,
    /// Base64 (optionally data-URI) document photo.
    #[serde(alias = "license_base64")]
    pub document_image: Option<String>,
    /// Base64 (optionally data-URI) selfie.
    #[serde(alias = "selfie_base64")]
    pub selfie_image: Option<String>,
}

impl VerificationPayload {
    /// Check that every field is present and non-blank.
    ///
    /// Runs before any decoding, so a rejected payload never touches scratch
    /// storage.
    pub fn validate(&self) -> Result<(), VerifyError> {
        let missing: Vec<&str> = [
            ("subjectId", &self.subject_id),
            ("documentImage", &self.document_image),
            ("selfieImage", &self.selfie_image),
        ]
        .into_iter()
        .filter(|(_, value)| value.as_deref().map_or(true, |v| v.trim().is_empty()))
        .map(|(name, _)| name)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(VerifyError::InvalidPayload(format!(
                "missing required fields: {}",
                missing.join(", ")
            )))
        }
    }

    /// Validate, then decode the document and selfie strings, in that order.
    pub fn into_request(self) -> Result<VerificationRequest, VerifyError> {
        self.validate()?;
        let (Some(subject_id), Some(document), Some(selfie)) =
            (self.subject_id, self.document_image, self.selfie_image)
        else {
            return Err(VerifyError::InvalidPayload(
                "missing required fields".to_string(),
            ));
        };

        let document_image = decode_base64_image(&document, ImageRole::Document)?;
        let selfie_image = decode_base64_image(&selfie, ImageRole::Selfie)?;

        Ok(VerificationRequest {
            subject_id,
            document_image,
            selfie_image,
        })
    }
}

/// One verification call with raw encoded image bytes.
#[derive(Debug, Clone)]
pub struct VerificationRequest {
    /// Caller's identifier for the person being verified.
    pub subject_id: String,
    /// Encoded document photo.
    pub document_image: Vec<u8>,
    /// Encoded selfie.
    pub selfie_image: Vec<u8>,
}

/// Final answer for one request.
///
/// Only three shapes exist: verified with a score, rejected with a score and
/// `BelowThreshold`, or failed with an error code and no score.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    similarity_score: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_code: Option<ErrorCode>,
}

impl VerificationResult {
    /// Faces matched.
    pub fn verified(score: f32) -> Self {
        Self {
            verified: true,
            similarity_score: Some(score),
            error_code: None,
        }
    }

    /// Faces were scored but did not match.
    pub fn below_threshold(score: f32) -> Self {
        Self {
            verified: false,
            similarity_score: Some(score),
            error_code: Some(ErrorCode::BelowThreshold),
        }
    }

    /// The pipeline stopped before producing a score.
    pub fn failed(code: ErrorCode) -> Self {
        Self {
            verified: false,
            similarity_score: None,
            error_code: Some(code),
        }
    }

    /// Whether the two photos show the same person.
    pub fn is_verified(&self) -> bool {
        self.verified
    }

    /// Distance between the faces, when both were scored.
    pub fn similarity_score(&self) -> Option<f32> {
        self.similarity_score
    }

    /// Reason for a negative result.
    pub fn error_code(&self) -> Option<ErrorCode> {
        self.error_code
    }
}

impl From<&VerifyError> for VerificationResult {
    fn from(err: &VerifyError) -> Self {
        Self::failed(err.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_fields_are_invalid_payload() {
        let payload: VerificationPayload =
            serde_json::from_value(json!({ "subjectId": "u1", "documentImage": "abc" })).unwrap();
        let err = payload.into_request().unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidPayload);
        assert!(err.to_string().contains("selfieImage"));
    }

    #[test]
    fn blank_fields_are_invalid_payload() {
        let payload: VerificationPayload = serde_json::from_value(
            json!({ "subjectId": "  ", "documentImage": "abc", "selfieImage": "abc" }),
        )
        .unwrap();
        assert_eq!(
            payload.validate().unwrap_err().code(),
            ErrorCode::InvalidPayload
        );
    }

    #[test]
    fn legacy_field_names_are_accepted() {
        let payload: VerificationPayload = serde_json::from_value(json!({
            "userId": "u1",
            "license_base64": "aGVsbG8=",
            "selfie_base64": "d29ybGQ=",
        }))
        .unwrap();
        let request = payload.into_request().unwrap();
        assert_eq!(request.subject_id, "u1");
        assert_eq!(request.document_image, b"hello");
        assert_eq!(request.selfie_image, b"world");
    }

    #[test]
    fn bad_document_base64_is_reported_before_selfie() {
        let payload: VerificationPayload = serde_json::from_value(json!({
            "subjectId": "u1",
            "documentImage": "%%%",
            "selfieImage": "%%%",
        }))
        .unwrap();
        assert_eq!(
            payload.into_request().unwrap_err().code(),
            ErrorCode::DocumentDecodeError
        );
    }

    #[test]
    fn result_shapes_serialize() {
        assert_eq!(
            serde_json::to_value(VerificationResult::verified(0.25)).unwrap(),
            json!({ "verified": true, "similarityScore": 0.25 })
        );
        assert_eq!(
            serde_json::to_value(VerificationResult::below_threshold(0.75)).unwrap(),
            json!({ "verified": false, "similarityScore": 0.75, "errorCode": "BelowThreshold" })
        );
        assert_eq!(
            serde_json::to_value(VerificationResult::failed(ErrorCode::SelfieFaceNotFound))
                .unwrap(),
            json!({ "verified": false, "errorCode": "SelfieFaceNotFound" })
        );
    }

    #[test]
    fn failed_results_never_carry_a_score() {
        let result = VerificationResult::from(&VerifyError::Scoring("boom".into()));
        assert!(!result.is_verified());
        assert_eq!(result.similarity_score(), None);
        assert_eq!(result.error_code(), Some(ErrorCode::ScoringError));
    }
}
