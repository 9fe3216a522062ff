//! Still images handed to the caller.

use super::{ImageFormat, Size};
use chrono::{DateTime, Utc};

/// An encoded still image acquired from an image sink.
#[derive(Clone)]
pub struct StillImage {
    /// Encoded bytes in `format`.
    data: Vec<u8>,
    size: Size,
    format: ImageFormat,
    captured_at: DateTime<Utc>,
}

impl StillImage {
    /// Wraps encoded bytes, stamped with the current time.
    pub fn new(data: Vec<u8>, size: Size, format: ImageFormat) -> Self {
        Self {
            data,
            size,
            format,
            captured_at: Utc::now(),
        }
    }

    /// Encoded bytes.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Pixel dimensions.
    #[inline]
    pub fn size(&self) -> Size {
        self.size
    }

    /// Encoding.
    #[inline]
    pub fn format(&self) -> ImageFormat {
        self.format
    }

    /// When the image left the sink.
    #[inline]
    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// BLAKE3 digest of the encoded bytes, hex encoded.
    ///
    /// Lets hosts tell deliveries apart without keeping the payload.
    pub fn fingerprint(&self) -> String {
        blake3::hash(&self.data).to_hex().to_string()
    }

    /// Consumes the image, returning its bytes.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

impl std::fmt::Debug for StillImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StillImage")
            .field("size", &self.size)
            .field("format", &self.format)
            .field("captured_at", &self.captured_at)
            .field("bytes", &self.data.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_depends_on_content() {
        let a = StillImage::new(vec![1, 2, 3], Size::new(1, 3), ImageFormat::Jpeg);
        let b = StillImage::new(vec![1, 2, 4], Size::new(1, 3), ImageFormat::Jpeg);

        assert_eq!(a.fingerprint().len(), 64);
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint(), a.clone().fingerprint());
    }
}
