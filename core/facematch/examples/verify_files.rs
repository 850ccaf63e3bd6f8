//! Compare a document photo and a selfie from disk and print the result envelope.
//!
//! Usage:
//!   cargo run --example verify_files -- <seeta_model.bin> <document> <selfie>

use std::sync::Arc;

use facematch::{
    DirectoryScratch, EmbeddingScorer, PixelEmbedder, RustfaceDetector, VerificationRequest,
    Verifier,
};

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let [model, document, selfie] = args.as_slice() else {
        eprintln!("usage: verify_files <seeta_model.bin> <document> <selfie>");
        std::process::exit(2);
    };

    let scratch_dir = std::env::temp_dir().join("facematch-verify-files");
    let verifier = Verifier::new(
        Arc::new(RustfaceDetector::from_path(model).expect("failed to load model")),
        Arc::new(EmbeddingScorer::new(PixelEmbedder::new())),
        Arc::new(DirectoryScratch::new(&scratch_dir).unwrap()),
    );

    let request = VerificationRequest {
        subject_id: "cli".to_string(),
        document_image: std::fs::read(document).unwrap(),
        selfie_image: std::fs::read(selfie).unwrap(),
    };
    let result = verifier.verify(&request);

    println!("{}", serde_json::to_string_pretty(&result).unwrap());
    println!("artifacts in {}", scratch_dir.display());
}
