use std::io::Cursor;

use image::{ImageFormat, RgbImage};

use crate::error::VerifyError;
use crate::locate::BoundingBox;
use crate::scratch::ScratchStore;

/// Pixels of exactly one cropped face.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceImage {
    pixels: RgbImage,
    source: BoundingBox,
}

impl FaceImage {
    /// Wrap an already-cropped face; the region is taken to be the whole image.
    pub fn from_pixels(pixels: RgbImage) -> Self {
        let source = BoundingBox {
            x: 0,
            y: 0,
            width: pixels.width(),
            height: pixels.height(),
        };
        Self { pixels, source }
    }

    /// The cropped pixels.
    pub fn pixels(&self) -> &RgbImage {
        &self.pixels
    }

    /// Where the crop came from in the source image.
    pub fn source(&self) -> BoundingBox {
        self.source
    }

    /// Width of the crop in pixels.
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    /// Height of the crop in pixels.
    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// `true` when the crop holds no pixels.
    pub fn is_empty(&self) -> bool {
        self.pixels.width() == 0 || self.pixels.height() == 0
    }

    /// Encode the crop as PNG.
    pub fn to_png(&self) -> Result<Vec<u8>, VerifyError> {
        let mut buffer = Cursor::new(Vec::new());
        self.pixels
            .write_to(&mut buffer, ImageFormat::Png)
            .map_err(|e| VerifyError::Internal(format!("failed to encode face crop: {e}")))?;
        Ok(buffer.into_inner())
    }
}

/// Cut `bbox` out of `image`.
///
/// `bbox` comes from the locator and is therefore inside the image; a box
/// that overhangs is still cut at the image edge rather than panicking.
pub fn crop_face(image: &RgbImage, bbox: BoundingBox) -> FaceImage {
    let pixels =
        image::imageops::crop_imm(image, bbox.x, bbox.y, bbox.width, bbox.height).to_image();
    FaceImage {
        pixels,
        source: bbox,
    }
}

/// Scratch key for the crop of the upload stored at `source_key`.
///
/// Crops are always PNG, so `u1_abc_document.jpg` becomes
/// `u1_abc_document_cropped.png`.
pub fn cropped_key(source_key: &str) -> String {
    let stem = source_key
        .rsplit_once('.')
        .map_or(source_key, |(stem, _)| stem);
    format!("{stem}_cropped.png")
}

/// Write the crop next to its source upload for later inspection.
pub(crate) fn persist_crop(
    scratch: &dyn ScratchStore,
    source_key: &str,
    face: &FaceImage,
) -> Result<(), VerifyError> {
    let key = cropped_key(source_key);
    let png = face.to_png()?;
    scratch
        .put(&key, &png)
        .map_err(|source| VerifyError::Scratch { key, source })
}
