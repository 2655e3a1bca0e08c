use std::collections::HashMap;

use serde::Deserialize;

use super::{Descriptor, Parts};

/// Docker schema 2 or OCI image manifest.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageManifest {
    config: Descriptor,
    #[serde(default)]
    layers: Vec<Descriptor>,
    #[serde(default)]
    subject: Option<Descriptor>,
    #[serde(default)]
    annotations: HashMap<String, String>,
}

pub(super) fn parse(bytes: &[u8]) -> Result<Parts, serde_json::Error> {
    let manifest: ImageManifest = serde_json::from_slice(bytes)?;

    Ok(Parts {
        config: Some(manifest.config),
        layers: manifest.layers,
        manifests: Vec::new(),
        subject: manifest.subject,
        annotations: manifest.annotations,
    })
}
