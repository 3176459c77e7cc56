//! Media-type sniffing for image uploads.

use image::ImageFormat;

/// Detect a supported image media type from raw upload bytes.
///
/// Returns `(content_type, file_extension)` for the formats the video
/// generation providers accept as first-frame images. Anything else —
/// including valid images in unsupported formats — yields `None` and the
/// upload must be rejected before any storage call.
pub fn detect_image_media_type(bytes: &[u8]) -> Option<(&'static str, &'static str)> {
    match image::guess_format(bytes).ok()? {
        ImageFormat::Jpeg => Some(("image/jpeg", "jpg")),
        ImageFormat::Png => Some(("image/png", "png")),
        ImageFormat::WebP => Some(("image/webp", "webp")),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_jpeg() {
        let bytes = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];
        assert_eq!(
            detect_image_media_type(&bytes),
            Some(("image/jpeg", "jpg"))
        );
    }

    #[test]
    fn test_detects_png() {
        let bytes = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        assert_eq!(detect_image_media_type(&bytes), Some(("image/png", "png")));
    }

    #[test]
    fn test_rejects_non_image_payloads() {
        assert_eq!(detect_image_media_type(b"%PDF-1.7 not an image"), None);
        assert_eq!(detect_image_media_type(b""), None);
        assert_eq!(detect_image_media_type(b"{\"json\": true}"), None);
    }
}
