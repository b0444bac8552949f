//! Error types for the terrain crate.

use std::fmt;

/// Result type for terrain operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in terrain operations.
///
/// Layer resolution errors (`MissingFormat` through `InvalidUrl`) are fatal
/// to a provider. Transport and payload errors only affect the tile that
/// produced them.
#[derive(Debug)]
pub enum Error {
    /// A layer descriptor has no `format` field.
    MissingFormat {
        /// The descriptor URL.
        url: String,
    },
    /// A layer descriptor names a format or major version we cannot decode.
    UnsupportedFormat {
        /// The descriptor URL.
        url: String,
        /// The declared format.
        format: String,
    },
    /// A layer descriptor has a missing or empty `tiles` array.
    NoTileTemplates {
        /// The descriptor URL.
        url: String,
    },
    /// Following `parentUrl` references exceeded the depth limit.
    ChainTooDeep {
        /// The descriptor URL that would have exceeded the limit.
        url: String,
        /// The configured limit.
        max_depth: usize,
    },
    /// A layer descriptor is not a valid JSON document.
    InvalidDescriptor {
        /// The descriptor URL.
        url: String,
        /// The parser message.
        message: String,
    },
    /// A URL could not be parsed or resolved.
    InvalidUrl {
        /// The offending URL text.
        url: String,
        /// The parser message.
        message: String,
    },
    /// HTTP request failed.
    Http {
        /// The URL that failed.
        url: String,
        /// The error message.
        message: String,
    },
    /// HTTP response had a non-success status code.
    HttpStatus {
        /// The URL that returned the error.
        url: String,
        /// The HTTP status code.
        status: u16,
    },
    /// A tile payload could not be decoded.
    CorruptPayload(terrain_decode::DecodeError),
    /// The provider has not finished resolving its layers.
    NotReady,
    /// The provider failed to resolve its layers.
    Failed {
        /// The message of the resolution error.
        message: String,
    },
}

impl Error {
    /// Whether the error comes from the transport rather than from the data.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Http { .. } | Error::HttpStatus { .. })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::MissingFormat { url } => {
                write!(f, "the tile format is not specified in {url}")
            }
            Error::UnsupportedFormat { url, format } => {
                write!(
                    f,
                    "the tile format \"{format}\" in {url} is invalid or not supported"
                )
            }
            Error::NoTileTemplates { url } => {
                write!(f, "{url} does not specify any tile URL templates")
            }
            Error::ChainTooDeep { url, max_depth } => {
                write!(
                    f,
                    "layer chain exceeds {max_depth} layers at {url}; parent references may form a cycle"
                )
            }
            Error::InvalidDescriptor { url, message } => {
                write!(f, "invalid layer descriptor {url}: {message}")
            }
            Error::InvalidUrl { url, message } => {
                write!(f, "invalid url {url}: {message}")
            }
            Error::Http { url, message } => {
                write!(f, "http request to {url} failed: {message}")
            }
            Error::HttpStatus { url, status } => {
                write!(f, "http request to {url} returned status {status}")
            }
            Error::CorruptPayload(e) => write!(f, "corrupt tile payload: {e}"),
            Error::NotReady => write!(f, "terrain provider is not ready"),
            Error::Failed { message } => {
                write!(f, "terrain provider failed to initialize: {message}")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::CorruptPayload(e) => Some(e),
            _ => None,
        }
    }
}

impl From<terrain_decode::DecodeError> for Error {
    fn from(e: terrain_decode::DecodeError) -> Self {
        Error::CorruptPayload(e)
    }
}
