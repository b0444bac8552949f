//! Parsed layer descriptors (`layer.json`).

use std::fmt;

use reqwest::Url;
use serde::Deserialize;
use terrain_decode::{ExtensionRequest, TileRange};

use crate::availability::{Availability, AvailabilityTree};
use crate::error::{Error, Result};

/// Name of the descriptor document inside a tileset directory.
pub const DESCRIPTOR_FILE: &str = "layer.json";

/// Raw descriptor document. Fields not listed here (`tilejson`, `name`,
/// `scheme`, `bounds`, `projection`, ...) are ignored.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Descriptor {
    format: Option<serde_json::Value>,
    version: Option<String>,
    tiles: Option<serde_json::Value>,
    parent_url: Option<String>,
    attribution: Option<String>,
    #[serde(default)]
    available: Vec<Vec<TileRange>>,
    #[serde(default)]
    extensions: Vec<String>,
    minzoom: Option<u32>,
    maxzoom: Option<u32>,
}

/// Binary format of a layer's tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TileFormat {
    /// `heightmap-1.0`: 65×65 samples.
    Heightmap,
    /// `quantized-mesh-1.x`.
    QuantizedMesh,
}

impl TileFormat {
    /// Parse a format identifier into the format and its `(major, minor)`
    /// version. Only `heightmap-1.0` and `quantized-mesh-1.<minor>` are
    /// supported.
    #[must_use]
    pub fn parse(identifier: &str) -> Option<(Self, (u32, u32))> {
        if identifier == "heightmap-1.0" {
            return Some((Self::Heightmap, (1, 0)));
        }
        let minor = identifier.strip_prefix("quantized-mesh-1.")?;
        if minor.is_empty() || !minor.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some((Self::QuantizedMesh, (1, minor.parse().ok()?)))
    }
}

impl fmt::Display for TileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Heightmap => write!(f, "heightmap"),
            Self::QuantizedMesh => write!(f, "quantized-mesh"),
        }
    }
}

/// One layer of a layered tileset. Immutable once parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerMetadata {
    /// URL the descriptor was fetched from. Tile templates and the parent
    /// reference resolve against it, and its query is carried onto both.
    pub url: Url,
    pub format: TileFormat,
    pub format_version: (u32, u32),
    /// Value substituted for `{version}` in templates.
    pub version: Option<String>,
    pub url_templates: Vec<String>,
    pub attribution: Option<String>,
    pub availability: AvailabilityTree,
    pub has_vertex_normals: bool,
    pub has_water_mask: bool,
    pub has_metadata: bool,
    /// False when the layer only offers the legacy `vertexnormals`
    /// extension, whose extension lengths are big-endian.
    pub little_endian_extension_size: bool,
    pub min_level: Option<u32>,
    pub max_level: Option<u32>,
    pub parent_url: Option<String>,
}

impl LayerMetadata {
    /// Parse the descriptor fetched from `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not JSON, has no or an
    /// unsupported `format`, or has no tile templates.
    pub fn parse(url: &Url, bytes: &[u8]) -> Result<Self> {
        let descriptor: Descriptor =
            serde_json::from_slice(bytes).map_err(|e| Error::InvalidDescriptor {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let Some(serde_json::Value::String(identifier)) = descriptor.format else {
            return Err(Error::MissingFormat {
                url: url.to_string(),
            });
        };
        let (format, format_version) =
            TileFormat::parse(&identifier).ok_or_else(|| Error::UnsupportedFormat {
                url: url.to_string(),
                format: identifier.clone(),
            })?;

        let url_templates =
            tile_templates(descriptor.tiles).ok_or_else(|| Error::NoTileTemplates {
                url: url.to_string(),
            })?;

        let extensions = &descriptor.extensions;
        let has_extension = |name: &str| extensions.iter().any(|e| e == name);
        let octvertexnormals = has_extension("octvertexnormals");
        let legacy_normals = !octvertexnormals && has_extension("vertexnormals");

        Ok(Self {
            url: url.clone(),
            format,
            format_version,
            version: descriptor.version,
            url_templates,
            attribution: descriptor.attribution.filter(|a| !a.is_empty()),
            availability: AvailabilityTree::from_levels(descriptor.available),
            has_vertex_normals: octvertexnormals || legacy_normals,
            // Heightmap payloads always carry a water mask.
            has_water_mask: format == TileFormat::Heightmap || has_extension("watermask"),
            has_metadata: has_extension("metadata"),
            little_endian_extension_size: !legacy_normals,
            min_level: descriptor.minzoom,
            max_level: descriptor.maxzoom,
            parent_url: descriptor.parent_url.filter(|p| !p.is_empty()),
        })
    }

    /// Availability of a tile in TMS rows.
    ///
    /// Falls back to the declared zoom range when the layer enumerates no
    /// ranges at all: levels inside it are available, others are not.
    #[must_use]
    pub fn availability(&self, level: u32, x: u32, y: u32) -> Availability {
        match self.availability.query(level, x, y) {
            Availability::Unknown if self.availability.is_empty() => match self.max_level {
                Some(max_level) if level > max_level => Availability::Unavailable,
                Some(_) if self.min_level.is_some_and(|min| level < min) => {
                    Availability::Unavailable
                }
                Some(_) => Availability::Available,
                None => Availability::Unknown,
            },
            availability => availability,
        }
    }

    /// Names of the extensions that are both in `request` and served by
    /// this layer, as they appear in an `Accept` header.
    #[must_use]
    pub fn extension_names(&self, request: &ExtensionRequest) -> Vec<&'static str> {
        let mut names = Vec::new();
        if request.vertex_normals && self.has_vertex_normals {
            names.push(if self.little_endian_extension_size {
                "octvertexnormals"
            } else {
                "vertexnormals"
            });
        }
        if request.water_mask && self.has_water_mask && self.format == TileFormat::QuantizedMesh {
            names.push("watermask");
        }
        if request.metadata && self.has_metadata {
            names.push("metadata");
        }
        names
    }

    /// Resolve the parent reference against this layer's URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] if the reference cannot be resolved.
    pub fn resolve_parent(&self) -> Result<Option<Url>> {
        let Some(parent) = &self.parent_url else {
            return Ok(None);
        };
        let base = self.url.join(parent).map_err(|e| Error::InvalidUrl {
            url: parent.clone(),
            message: e.to_string(),
        })?;
        let mut descriptor = directory_url(&base).join(DESCRIPTOR_FILE).map_err(|e| {
            Error::InvalidUrl {
                url: parent.clone(),
                message: e.to_string(),
            }
        })?;
        merge_query(&mut descriptor, &base);
        merge_query(&mut descriptor, &self.url);
        Ok(Some(descriptor))
    }
}

/// URL of the descriptor of the tileset rooted at `base`.
///
/// `base` names a directory; a trailing slash is added if missing. The
/// query of `base` is kept.
///
/// # Errors
///
/// Returns [`Error::InvalidUrl`] if `base` cannot be parsed.
pub fn descriptor_url(base: &str) -> Result<Url> {
    let parsed = Url::parse(base).map_err(|e| Error::InvalidUrl {
        url: base.to_string(),
        message: e.to_string(),
    })?;
    let mut descriptor = directory_url(&parsed)
        .join(DESCRIPTOR_FILE)
        .map_err(|e| Error::InvalidUrl {
            url: base.to_string(),
            message: e.to_string(),
        })?;
    merge_query(&mut descriptor, &parsed);
    Ok(descriptor)
}

fn directory_url(url: &Url) -> Url {
    let mut directory = url.clone();
    directory.set_query(None);
    directory.set_fragment(None);
    if !directory.path().ends_with('/') {
        let path = format!("{}/", directory.path());
        directory.set_path(&path);
    }
    directory
}

/// Append the query pairs of `source` whose keys `target` does not have.
/// The `tiles` array, if it is a non-empty list of strings.
fn tile_templates(tiles: Option<serde_json::Value>) -> Option<Vec<String>> {
    let serde_json::Value::Array(tiles) = tiles? else {
        return None;
    };
    let templates = tiles
        .into_iter()
        .map(|template| template.as_str().map(str::to_owned))
        .collect::<Option<Vec<_>>>()?;
    (!templates.is_empty()).then_some(templates)
}

pub(crate) fn merge_query(target: &mut Url, source: &Url) {
    let existing: Vec<String> = target.query_pairs().map(|(k, _)| k.into_owned()).collect();
    let extra: Vec<(String, String)> = source
        .query_pairs()
        .filter(|(k, _)| !existing.iter().any(|e| e == k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if !extra.is_empty() {
        target.query_pairs_mut().extend_pairs(extra);
    }
}
