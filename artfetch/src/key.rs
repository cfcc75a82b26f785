//! Request identity and per-request display configuration.

use crate::artifact::Artifact;
use crate::loader::LoadCallback;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Pixel layout requested for the produced variant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 32 bits per pixel with alpha.
    #[default]
    Argb8888,
    /// 16 bits per pixel, no alpha.
    Rgb565,
    /// 16 bits per pixel with 4-bit alpha.
    Argb4444,
    /// Alpha channel only.
    Alpha8,
}

impl PixelFormat {
    fn tag(self) -> &'static str {
        match self {
            Self::Argb8888 => "argb8888",
            Self::Rgb565 => "rgb565",
            Self::Argb4444 => "argb4444",
            Self::Alpha8 => "alpha8",
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for PixelFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "argb8888" => Ok(Self::Argb8888),
            "rgb565" => Ok(Self::Rgb565),
            "argb4444" => Ok(Self::Argb4444),
            "alpha8" => Ok(Self::Alpha8),
            other => Err(format!(
                "unknown pixel format '{}': expected argb8888, rgb565, argb4444 or alpha8",
                other
            )),
        }
    }
}

/// How a consumer wants an artifact presented.
///
/// Only the variant-shaping fields (dimensions, pixel format, show-original)
/// contribute to the [`RequestKey`] fingerprint. Placeholders and the
/// callback override travel with the request but never change its identity.
#[derive(Clone, Default)]
pub struct DisplayConfig {
    /// Maximum width of the produced variant, 0 for unbounded.
    pub max_width: u32,
    /// Maximum height of the produced variant, 0 for unbounded.
    pub max_height: u32,
    /// Pixel layout of the produced variant.
    pub pixel_format: PixelFormat,
    /// Deliver the source untouched, ignoring dimensions and format.
    pub show_original: bool,
    /// Placeholder the rendering side shows while the request is pending.
    pub loading_artifact: Option<Artifact>,
    /// Fallback handed to `on_failed`.
    pub failed_artifact: Option<Artifact>,
    /// Overrides the loader's default callback for this request.
    pub callback: Option<Arc<dyn LoadCallback>>,
}

impl DisplayConfig {
    /// Create a display config with default presentation settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound the produced variant's dimensions.
    pub fn with_max_size(mut self, width: u32, height: u32) -> Self {
        self.max_width = width;
        self.max_height = height;
        self
    }

    /// Set the pixel layout.
    pub fn with_pixel_format(mut self, format: PixelFormat) -> Self {
        self.pixel_format = format;
        self
    }

    /// Request the untouched source.
    pub fn with_show_original(mut self, show_original: bool) -> Self {
        self.show_original = show_original;
        self
    }

    /// Set the loading placeholder.
    pub fn with_loading_artifact(mut self, artifact: Artifact) -> Self {
        self.loading_artifact = Some(artifact);
        self
    }

    /// Set the failure fallback.
    pub fn with_failed_artifact(mut self, artifact: Artifact) -> Self {
        self.failed_artifact = Some(artifact);
        self
    }

    /// Route this request's events to `callback` instead of the loader default.
    pub fn with_callback(mut self, callback: Arc<dyn LoadCallback>) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Fingerprint of the variant-shaping fields.
    pub fn fingerprint(&self) -> String {
        if self.show_original {
            "original".to_string()
        } else {
            format!(
                "{}x{}_{}",
                self.max_width, self.max_height, self.pixel_format
            )
        }
    }
}

impl fmt::Debug for DisplayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisplayConfig")
            .field("max_width", &self.max_width)
            .field("max_height", &self.max_height)
            .field("pixel_format", &self.pixel_format)
            .field("show_original", &self.show_original)
            .field("loading_artifact", &self.loading_artifact)
            .field("failed_artifact", &self.failed_artifact)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

/// Identity of a cacheable artifact: source plus variant fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
    source: String,
    variant: String,
}

impl RequestKey {
    /// Build the key for `source` rendered with `config`.
    pub fn new(source: impl Into<String>, config: &DisplayConfig) -> Self {
        Self {
            source: source.into(),
            variant: config.fingerprint(),
        }
    }

    /// Build a key from an explicit variant fingerprint.
    pub fn with_variant(source: impl Into<String>, variant: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            variant: variant.into(),
        }
    }

    /// The source identifier (usually a URL).
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The variant fingerprint.
    pub fn variant(&self) -> &str {
        &self.variant
    }

    /// Returns true if the source identifier is blank.
    pub fn is_empty(&self) -> bool {
        self.source.trim().is_empty()
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.source, self.variant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_equality_requires_both_components() {
        let small = DisplayConfig::new().with_max_size(64, 64);
        let large = DisplayConfig::new().with_max_size(512, 512);

        let a = RequestKey::new("https://example.com/a.png", &small);
        let b = RequestKey::new("https://example.com/a.png", &small);
        let c = RequestKey::new("https://example.com/a.png", &large);
        let d = RequestKey::new("https://example.com/b.png", &small);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn test_placeholders_do_not_change_identity() {
        let plain = DisplayConfig::new();
        let decorated = DisplayConfig::new()
            .with_loading_artifact(Artifact::from(vec![1]))
            .with_failed_artifact(Artifact::from(vec![2]));

        assert_eq!(
            RequestKey::new("src", &plain),
            RequestKey::new("src", &decorated)
        );
    }

    #[test]
    fn test_show_original_collapses_variants() {
        let a = DisplayConfig::new()
            .with_show_original(true)
            .with_max_size(10, 10);
        let b = DisplayConfig::new()
            .with_show_original(true)
            .with_pixel_format(PixelFormat::Rgb565);

        assert_eq!(a.fingerprint(), "original");
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_fingerprint_format() {
        let config = DisplayConfig::new()
            .with_max_size(320, 240)
            .with_pixel_format(PixelFormat::Rgb565);
        assert_eq!(config.fingerprint(), "320x240_rgb565");
    }

    #[test]
    fn test_blank_source_is_empty() {
        let config = DisplayConfig::new();
        assert!(RequestKey::new("", &config).is_empty());
        assert!(RequestKey::new("   ", &config).is_empty());
        assert!(!RequestKey::new("a", &config).is_empty());
    }

    #[test]
    fn test_key_display() {
        let key = RequestKey::with_variant("https://x/y.jpg", "0x0_argb8888");
        assert_eq!(key.to_string(), "https://x/y.jpg#0x0_argb8888");
    }

    #[test]
    fn test_pixel_format_parse() {
        assert_eq!("RGB565".parse::<PixelFormat>(), Ok(PixelFormat::Rgb565));
        assert_eq!(" alpha8 ".parse::<PixelFormat>(), Ok(PixelFormat::Alpha8));
        assert!("bc1".parse::<PixelFormat>().is_err());
    }
}
