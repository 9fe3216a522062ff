//! Plain data exchanged with the device layer.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a physical camera as reported by the device enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(String);

impl DeviceId {
    /// Wraps a backend-reported id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as reported.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Handle to an opened device, issued by the backend on open completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceHandle(pub u64);

/// Handle to a configured capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionHandle(pub u64);

/// Handle to a still-image sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SinkHandle(pub u64);

/// A stream endpoint that capture requests can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(pub u64);

/// Direction the lens faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    /// Same side as the display.
    Front,
    /// Opposite side from the display.
    #[default]
    Back,
    /// Attached, e.g. over USB.
    External,
}

/// Output pixel formats the core cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// Compressed still.
    #[default]
    Jpeg,
    /// Planar YUV 4:2:0.
    Yuv420,
    /// Format consumed by a preview surface.
    Private,
}

/// Width and height in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    /// Horizontal pixels.
    pub width: u32,
    /// Vertical pixels.
    pub height: u32,
}

impl Size {
    /// Creates a size.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width divided by height. Zero height yields infinity.
    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    /// Swaps the axes, as needed when a landscape sensor feeds a portrait display.
    pub fn transposed(&self) -> Self {
        Self::new(self.height, self.width)
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Output sizes a device supports, per format, in enumeration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamConfigurationMap {
    outputs: Vec<(ImageFormat, Vec<Size>)>,
}

impl StreamConfigurationMap {
    /// A map with no formats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the sizes supported for `format`, keeping insertion order.
    pub fn with_outputs(mut self, format: ImageFormat, sizes: impl IntoIterator<Item = Size>) -> Self {
        let sizes: Vec<Size> = sizes.into_iter().collect();
        match self.outputs.iter_mut().find(|(f, _)| *f == format) {
            Some((_, existing)) => existing.extend(sizes),
            None => self.outputs.push((format, sizes)),
        }
        self
    }

    /// Returns the supported sizes for `format`, empty if unsupported.
    pub fn output_sizes(&self, format: ImageFormat) -> &[Size] {
        self.outputs
            .iter()
            .find(|(f, _)| *f == format)
            .map(|(_, sizes)| sizes.as_slice())
            .unwrap_or(&[])
    }
}

/// Static characteristics of one camera.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceMetadata {
    /// Lens direction.
    pub facing: Facing,
    /// Supported output sizes.
    pub stream_map: StreamConfigurationMap,
}
