//! Show which face the locator picks in each image.
//!
//! Usage:
//!   cargo run --example detect_faces -- <seeta_model.bin> <image>...

use facematch::{
    decode_image, locate_primary_face, FaceDetector, ImageRole, RustfaceDetector,
    DEFAULT_MIN_FACE_SIZE,
};

fn main() {
    let mut args = std::env::args().skip(1);
    let model_path = args
        .next()
        .expect("usage: detect_faces <seeta_model.bin> <image>...");
    let detector = RustfaceDetector::from_path(&model_path).expect("failed to load model");

    for path in args {
        let bytes = std::fs::read(&path).unwrap();
        let image = match decode_image(&bytes, ImageRole::Document) {
            Ok(image) => image,
            Err(e) => {
                println!("=== {path}: {e}");
                continue;
            }
        };
        let (width, height) = image.dimensions();
        println!("=== {path} ({width}x{height}) ===");

        let gray = image::imageops::grayscale(&image);
        let faces = detector.detect(gray.as_raw(), width, height);
        if faces.is_empty() {
            println!("  no candidates");
        }
        for (i, face) in faces.iter().enumerate() {
            println!(
                "  candidate {i}: confidence={:.2}, bbox=({:.0}, {:.0}, {:.0}x{:.0})",
                face.confidence, face.x, face.y, face.width, face.height,
            );
        }

        match locate_primary_face(&detector, &image, DEFAULT_MIN_FACE_SIZE) {
            Some(face) => println!(
                "  selected: ({}, {}, {}x{})",
                face.x, face.y, face.width, face.height
            ),
            None => println!("  selected: none (no face of at least {DEFAULT_MIN_FACE_SIZE}px)"),
        }
    }
}
