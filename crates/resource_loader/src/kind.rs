//! Resource kinds inferred from the trailing file extension of a URL.

use core::fmt::{Display, Formatter, Result as FmtResult};
use serde::{Deserialize, Serialize};

/// Closed set of resource categories. Selects the load strategy.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    /// `.js`, injected as a `<script>` element.
    Script,
    /// `.css`, injected as a `<link rel="stylesheet">` element.
    Stylesheet,
    /// `.json`, fetched and parsed.
    JsonDocument,
    /// Raster and vector images, injected as `<img>`.
    Image,
    /// Web fonts, loaded as a font face and registered with the document.
    Font,
    /// Archives and media, fetched as raw bytes.
    BinaryBlob,
    /// Anything else. Fails fast without touching the network.
    Unsupported,
}

impl ResourceKind {
    /// Kinds that receive the cache-busting query when it is enabled and no
    /// explicit list is configured.
    pub const DEFAULT_CACHE_BUSTING: [Self; 2] = [Self::Script, Self::Stylesheet];

    /// Classify a URL by the extension of its last path segment.
    #[inline]
    #[must_use]
    pub fn from_url(url: &str) -> Self {
        Self::from_extension(&extension_of(url))
    }

    /// Classify a bare extension (case-insensitive, without the dot).
    #[must_use]
    pub fn from_extension(extension: &str) -> Self {
        match extension.to_ascii_lowercase().as_str() {
            "js" => Self::Script,
            "css" => Self::Stylesheet,
            "json" => Self::JsonDocument,
            "jpg" | "jpeg" | "png" | "gif" | "svg" | "webp" => Self::Image,
            "woff" | "woff2" => Self::Font,
            "pdf" | "zip" | "bin" | "mp3" | "mp4" | "avi" | "webm" | "ogg" | "wav" => {
                Self::BinaryBlob
            }
            _ => Self::Unsupported,
        }
    }

    /// Tag of the element injected for this kind, if the kind is DOM-backed.
    #[inline]
    #[must_use]
    pub const fn tag_name(self) -> Option<&'static str> {
        match self {
            Self::Script => Some("script"),
            Self::Stylesheet => Some("link"),
            Self::Image => Some("img"),
            Self::JsonDocument | Self::Font | Self::BinaryBlob | Self::Unsupported => None,
        }
    }

    /// Attribute carrying the resource URL on the injected element.
    #[inline]
    #[must_use]
    pub const fn url_attribute(self) -> Option<&'static str> {
        match self {
            Self::Script | Self::Image => Some("src"),
            Self::Stylesheet => Some("href"),
            Self::JsonDocument | Self::Font | Self::BinaryBlob | Self::Unsupported => None,
        }
    }

    /// Scripts and stylesheets get the cross-origin and integrity checks.
    #[inline]
    #[must_use]
    pub const fn requires_security_attributes(self) -> bool {
        matches!(self, Self::Script | Self::Stylesheet)
    }

    /// Stable lowercase name.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Script => "script",
            Self::Stylesheet => "stylesheet",
            Self::JsonDocument => "json-document",
            Self::Image => "image",
            Self::Font => "font",
            Self::BinaryBlob => "binary-blob",
            Self::Unsupported => "unsupported",
        }
    }
}

impl Display for ResourceKind {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FmtResult {
        formatter.write_str(self.as_str())
    }
}

/// Lowercased extension of the last path segment, ignoring query and fragment.
/// Empty when the segment has no dot.
#[must_use]
pub fn extension_of(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let segment = path.rsplit('/').next().unwrap_or(path);
    segment
        .rsplit_once('.')
        .map(|(_, extension)| extension.to_ascii_lowercase())
        .unwrap_or_default()
}
