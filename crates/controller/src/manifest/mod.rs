//! Manifest media type registry.
//!
//! Every supported manifest media type maps to a parser, registered once
//! on first use. Parsers only extract what the registry control plane needs:
//! referenced descriptors, the OCI `subject` and annotations.

mod image;
mod index;

use std::collections::HashMap;

use derive_more::{Display, Error, From};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

pub const DOCKER_MANIFEST: &str = "application/vnd.docker.distribution.manifest.v2+json";
pub const DOCKER_MANIFEST_LIST: &str = "application/vnd.docker.distribution.manifest.list.v2+json";
pub const OCI_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";
pub const OCI_INDEX: &str = "application/vnd.oci.image.index.v1+json";

pub const ARTIFACT_TYPE_IMAGE: &str = "IMAGE";
pub const ARTIFACT_TYPE_UNKNOWN: &str = "UNKNOWN";

const IMAGE_CONFIG_TYPES: [&str; 2] = [
    "application/vnd.docker.container.image.v1+json",
    "application/vnd.oci.image.config.v1+json",
];

#[derive(Debug, Display, Error, From)]
pub enum ManifestError {
    #[display(fmt = "unsupported manifest media type: {}", _0)]
    #[from(ignore)]
    UnsupportedMediaType(#[error(not(source))] String),

    #[display(fmt = "malformed manifest: {}", _0)]
    Malformed(serde_json::Error),
}

/// Content descriptor, as defined by the OCI image specification.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    pub media_type: String,
    pub digest: String,
    pub size: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_type: Option<String>,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub annotations: HashMap<String, String>,
}

/// Fields extracted by a media type specific parser.
#[derive(Default)]
struct Parts {
    config: Option<Descriptor>,
    layers: Vec<Descriptor>,
    manifests: Vec<Descriptor>,
    subject: Option<Descriptor>,
    annotations: HashMap<String, String>,
}

type Parser = fn(&[u8]) -> Result<Parts, serde_json::Error>;

static PARSERS: Lazy<HashMap<&'static str, Parser>> = Lazy::new(|| {
    HashMap::from([
        (DOCKER_MANIFEST, image::parse as Parser),
        (OCI_MANIFEST, image::parse as Parser),
        (DOCKER_MANIFEST_LIST, index::parse as Parser),
        (OCI_INDEX, index::parse as Parser),
    ])
});

/// Parsed manifest.
pub struct Manifest {
    descriptor: Descriptor,
    parts: Parts,
}

impl Manifest {
    /// Parse manifest bytes.
    ///
    /// If `content_type` is missing, the media type is detected from
    /// the manifest body itself.
    pub fn parse(content_type: Option<&str>, bytes: &[u8]) -> Result<Self, ManifestError> {
        let media_type = match content_type
            .map(|value| value.split(';').next().unwrap_or_default().trim())
            .filter(|value| !value.is_empty())
        {
            Some(media_type) => media_type.to_string(),
            None => detect_media_type(bytes)?,
        };

        let parser = PARSERS
            .get(media_type.as_str())
            .ok_or_else(|| ManifestError::UnsupportedMediaType(media_type.clone()))?;

        let parts = parser(bytes)?;

        Ok(Self {
            descriptor: Descriptor {
                media_type,
                digest: common::digest::sha256(bytes),
                size: bytes.len() as i64,
                artifact_type: None,
                annotations: HashMap::new(),
            },
            parts,
        })
    }

    /// Descriptor of the manifest itself.
    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    pub fn media_type(&self) -> &str {
        &self.descriptor.media_type
    }

    pub fn digest(&self) -> &str {
        &self.descriptor.digest
    }

    /// Descriptors of the content referenced by this manifest.
    ///
    /// For image manifests these are the config blob and the layers,
    /// for indexes these are the child manifests.
    pub fn references(&self) -> Vec<Descriptor> {
        self.parts
            .config
            .iter()
            .chain(self.parts.layers.iter())
            .chain(self.parts.manifests.iter())
            .cloned()
            .collect()
    }

    pub fn config(&self) -> Option<&Descriptor> {
        self.parts.config.as_ref()
    }

    pub fn layers(&self) -> &[Descriptor] {
        &self.parts.layers
    }

    pub fn subject(&self) -> Option<&Descriptor> {
        self.parts.subject.as_ref()
    }

    pub fn annotations(&self) -> &HashMap<String, String> {
        &self.parts.annotations
    }

    pub fn is_index(&self) -> bool {
        matches!(self.media_type(), DOCKER_MANIFEST_LIST | OCI_INDEX)
    }

    /// Media type stored for the artifact: config media type for
    /// image manifests, manifest media type for indexes.
    pub fn artifact_media_type(&self) -> &str {
        match self.config() {
            Some(config) => &config.media_type,
            None => self.media_type(),
        }
    }

    /// Artifact type stored for the artifact.
    pub fn artifact_type(&self) -> &'static str {
        if self.is_index() || IMAGE_CONFIG_TYPES.contains(&self.artifact_media_type()) {
            ARTIFACT_TYPE_IMAGE
        } else {
            ARTIFACT_TYPE_UNKNOWN
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Versioned {
    #[serde(default)]
    media_type: Option<String>,
    #[serde(default)]
    manifests: Option<serde_json::Value>,
}

fn detect_media_type(bytes: &[u8]) -> Result<String, ManifestError> {
    let versioned: Versioned = serde_json::from_slice(bytes)?;

    Ok(match versioned.media_type {
        Some(media_type) => media_type,
        None if versioned.manifests.is_some() => OCI_INDEX.to_string(),
        None => OCI_MANIFEST.to_string(),
    })
}
