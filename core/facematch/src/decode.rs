use base64::{engine::general_purpose, Engine as _};
use image::{DynamicImage, RgbImage, RgbaImage};

use crate::error::{ImageRole, VerifyError};
use crate::scratch::ScratchStore;

/// Default upper bound on a single encoded image (16 MiB).
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 16 * 1024 * 1024;

/// Decode a transport string into raw image bytes.
///
/// Accepts plain base64 or a `data:image/...;base64,` URI.
pub fn decode_base64_image(encoded: &str, role: ImageRole) -> Result<Vec<u8>, VerifyError> {
    let payload = strip_data_uri(encoded.trim());
    general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| VerifyError::Decode {
            role,
            message: format!("base64 decode failed: {e}"),
        })
}

fn strip_data_uri(encoded: &str) -> &str {
    if encoded.starts_with("data:") {
        match encoded.split_once(',') {
            Some((_, data)) => data,
            None => encoded,
        }
    } else {
        encoded
    }
}

/// Store the raw upload under `key`, read it back and decode it into RGB pixels.
pub(crate) fn decode_via_scratch(
    bytes: &[u8],
    role: ImageRole,
    key: &str,
    max_bytes: usize,
    scratch: &dyn ScratchStore,
) -> Result<RgbImage, VerifyError> {
    if bytes.len() > max_bytes {
        return Err(VerifyError::TooLarge {
            role,
            size: bytes.len(),
            limit: max_bytes,
        });
    }

    scratch.put(key, bytes).map_err(|source| VerifyError::Scratch {
        key: key.to_string(),
        source,
    })?;
    let stored = scratch.get(key).map_err(|e| VerifyError::Decode {
        role,
        message: format!("could not read back {key}: {e}"),
    })?;

    decode_image(&stored, role)
}

/// Decode bytes into an opaque RGB pixel grid.
pub fn decode_image(input: &[u8], role: ImageRole) -> Result<RgbImage, VerifyError> {
    image::guess_format(input).map_err(|e| VerifyError::Decode {
        role,
        message: e.to_string(),
    })?;
    let decoded = image::load_from_memory(input).map_err(|e| VerifyError::Decode {
        role,
        message: e.to_string(),
    })?;

    if decoded.width() == 0 || decoded.height() == 0 {
        return Err(VerifyError::Decode {
            role,
            message: "image dimensions are zero".to_string(),
        });
    }

    Ok(flatten_alpha(&decoded))
}

/// Flatten alpha channel by compositing onto a white background.
pub(crate) fn flatten_alpha(image: &DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }

    let rgba: RgbaImage = image.to_rgba8();
    let mut rgb = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = a as f32 / 255.0;
        let inv_alpha = 1.0 - alpha;
        let blend = |c: u8| (c as f32 * alpha + 255.0 * inv_alpha).round() as u8;
        rgb.put_pixel(x, y, image::Rgb([blend(r), blend(g), blend(b)]));
    }
    rgb
}
