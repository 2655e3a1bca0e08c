use std::collections::HashMap;

use serde::Deserialize;

use super::{Descriptor, Parts};

/// Docker manifest list or OCI image index.
#[derive(Deserialize)]
struct ImageIndex {
    manifests: Vec<Descriptor>,
    #[serde(default)]
    subject: Option<Descriptor>,
    #[serde(default)]
    annotations: HashMap<String, String>,
}

pub(super) fn parse(bytes: &[u8]) -> Result<Parts, serde_json::Error> {
    let index: ImageIndex = serde_json::from_slice(bytes)?;

    Ok(Parts {
        manifests: index.manifests,
        subject: index.subject,
        annotations: index.annotations,
        ..Default::default()
    })
}
