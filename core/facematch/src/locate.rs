use std::cmp::Ordering;

use image::RgbImage;
use serde::Serialize;
use tracing::debug;

use crate::face_detector::{FaceBounds, FaceDetector};

/// Smallest accepted face footprint, in pixels per side.
pub const DEFAULT_MIN_FACE_SIZE: u32 = 50;

/// Face region within the source image.
///
/// Always non-empty and fully inside the image it was located in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BoundingBox {
    /// Left edge (pixels).
    pub x: u32,
    /// Top edge (pixels).
    pub y: u32,
    /// Width (pixels), `> 0`.
    pub width: u32,
    /// Height (pixels), `> 0`.
    pub height: u32,
}

impl BoundingBox {
    /// Area in pixels.
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Clamp a raw detection to a `image_width` × `image_height` image.
    ///
    /// Returns `None` when nothing of the box remains inside the image.
    pub fn clamp_from(bounds: &FaceBounds, image_width: u32, image_height: u32) -> Option<Self> {
        if ![bounds.x, bounds.y, bounds.width, bounds.height]
            .iter()
            .all(|v| v.is_finite())
        {
            return None;
        }

        let left = bounds.x.round().max(0.0);
        let top = bounds.y.round().max(0.0);
        let right = (bounds.x + bounds.width).round().min(image_width as f64);
        let bottom = (bounds.y + bounds.height).round().min(image_height as f64);

        if right <= left || bottom <= top {
            return None;
        }

        Some(Self {
            x: left as u32,
            y: top as u32,
            width: (right - left) as u32,
            height: (bottom - top) as u32,
        })
    }
}

/// Find the canonical face in `image`.
///
/// Detections are clamped to the image, anything smaller than
/// `min_face_size` on either side is dropped, and the survivor with the
/// largest area wins. Equal areas fall back to detector confidence, then to
/// the top-most and left-most box, so the choice never depends on the
/// detector's output order.
pub fn locate_primary_face(
    detector: &dyn FaceDetector,
    image: &RgbImage,
    min_face_size: u32,
) -> Option<BoundingBox> {
    let gray = image::imageops::grayscale(image);
    let (width, height) = (gray.width(), gray.height());
    let detections = detector.detect(gray.as_raw(), width, height);

    let candidates: Vec<(BoundingBox, f64)> = detections
        .iter()
        .filter_map(|bounds| {
            BoundingBox::clamp_from(bounds, width, height).map(|bbox| (bbox, bounds.confidence))
        })
        .filter(|(bbox, _)| bbox.width >= min_face_size && bbox.height >= min_face_size)
        .collect();

    debug!(
        detected = detections.len(),
        accepted = candidates.len(),
        min_face_size,
        "Filtered face detections"
    );

    candidates
        .into_iter()
        .max_by(|(a, a_conf), (b, b_conf)| compare_candidates(a, *a_conf, b, *b_conf))
        .map(|(bbox, _)| bbox)
}

/// Ordering where the "greater" candidate is the preferred face.
fn compare_candidates(a: &BoundingBox, a_conf: f64, b: &BoundingBox, b_conf: f64) -> Ordering {
    a.area()
        .cmp(&b.area())
        .then_with(|| a_conf.partial_cmp(&b_conf).unwrap_or(Ordering::Equal))
        .then_with(|| b.y.cmp(&a.y))
        .then_with(|| b.x.cmp(&a.x))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedDetector(Vec<FaceBounds>);

    impl FaceDetector for FixedDetector {
        fn detect(&self, _gray: &[u8], _width: u32, _height: u32) -> Vec<FaceBounds> {
            self.0.clone()
        }
    }

    fn bounds(x: f64, y: f64, width: f64, height: f64, confidence: f64) -> FaceBounds {
        FaceBounds {
            x,
            y,
            width,
            height,
            confidence,
        }
    }

    fn blank(width: u32, height: u32) -> RgbImage {
        RgbImage::from_pixel(width, height, image::Rgb([200, 200, 200]))
    }

    #[test]
    fn no_detections_is_none() {
        let detector = FixedDetector(vec![]);
        assert_eq!(
            locate_primary_face(&detector, &blank(200, 200), DEFAULT_MIN_FACE_SIZE),
            None
        );
    }

    #[test]
    fn minimum_size_face_is_accepted() {
        let detector = FixedDetector(vec![bounds(10.0, 10.0, 50.0, 50.0, 3.0)]);
        let bbox = locate_primary_face(&detector, &blank(200, 200), DEFAULT_MIN_FACE_SIZE).unwrap();
        assert_eq!(
            bbox,
            BoundingBox {
                x: 10,
                y: 10,
                width: 50,
                height: 50
            }
        );
    }

    #[test]
    fn face_below_minimum_is_rejected() {
        let detector = FixedDetector(vec![
            bounds(10.0, 10.0, 49.0, 60.0, 9.0),
            bounds(100.0, 100.0, 60.0, 49.0, 9.0),
        ]);
        assert_eq!(
            locate_primary_face(&detector, &blank(200, 200), DEFAULT_MIN_FACE_SIZE),
            None
        );
    }

    #[test]
    fn largest_face_wins_regardless_of_order() {
        let small = bounds(0.0, 0.0, 60.0, 60.0, 10.0);
        let large = bounds(100.0, 50.0, 90.0, 90.0, 2.5);
        let expected = BoundingBox {
            x: 100,
            y: 50,
            width: 90,
            height: 90,
        };

        for faces in [
            vec![small.clone(), large.clone()],
            vec![large.clone(), small.clone()],
        ] {
            let detector = FixedDetector(faces);
            let bbox =
                locate_primary_face(&detector, &blank(300, 300), DEFAULT_MIN_FACE_SIZE).unwrap();
            assert_eq!(bbox, expected);
        }
    }

    #[test]
    fn equal_areas_break_ties_on_confidence_then_position() {
        let detector = FixedDetector(vec![
            bounds(120.0, 0.0, 60.0, 60.0, 4.0),
            bounds(0.0, 100.0, 60.0, 60.0, 5.0),
        ]);
        let bbox = locate_primary_face(&detector, &blank(300, 300), DEFAULT_MIN_FACE_SIZE).unwrap();
        assert_eq!((bbox.x, bbox.y), (0, 100));

        let detector = FixedDetector(vec![
            bounds(120.0, 40.0, 60.0, 60.0, 4.0),
            bounds(0.0, 40.0, 60.0, 60.0, 4.0),
            bounds(60.0, 10.0, 60.0, 60.0, 4.0),
        ]);
        let bbox = locate_primary_face(&detector, &blank(300, 300), DEFAULT_MIN_FACE_SIZE).unwrap();
        assert_eq!((bbox.x, bbox.y), (60, 10));
    }

    #[test]
    fn boxes_are_clamped_to_the_image() {
        let detector = FixedDetector(vec![bounds(-20.0, 150.0, 100.0, 100.0, 3.0)]);
        let bbox = locate_primary_face(&detector, &blank(200, 220), DEFAULT_MIN_FACE_SIZE).unwrap();
        assert_eq!(
            bbox,
            BoundingBox {
                x: 0,
                y: 150,
                width: 80,
                height: 70
            }
        );
    }

    #[test]
    fn clamping_can_shrink_a_face_below_minimum() {
        let detector = FixedDetector(vec![bounds(170.0, 0.0, 80.0, 80.0, 3.0)]);
        assert_eq!(
            locate_primary_face(&detector, &blank(200, 200), DEFAULT_MIN_FACE_SIZE),
            None
        );
    }

    #[test]
    fn degenerate_detections_are_ignored() {
        let detector = FixedDetector(vec![
            bounds(f64::NAN, 0.0, 60.0, 60.0, 3.0),
            bounds(10.0, 10.0, 0.0, 60.0, 3.0),
            bounds(500.0, 500.0, 60.0, 60.0, 3.0),
        ]);
        assert_eq!(
            locate_primary_face(&detector, &blank(200, 200), DEFAULT_MIN_FACE_SIZE),
            None
        );
    }
}
