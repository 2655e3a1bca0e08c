//! Notary signatures consumed by the content trust policy.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::Error;

#[async_trait]
pub trait SignatureChecker: Send + Sync {
    /// Get the digests of the signed tags of the repository.
    ///
    /// The map is keyed by tag.
    async fn signed(&self, repository_name: &str) -> Result<HashMap<String, String>, Error>;

    /// Check whether the tag, or any tag of the digest when the tag is absent, is signed.
    async fn is_signed(
        &self,
        repository_name: &str,
        tag: Option<&str>,
        digest: &str,
    ) -> Result<bool, Error> {
        let signed = self.signed(repository_name).await?;

        Ok(match tag {
            Some(tag) => signed.get(tag).map_or(false, |signed| signed == digest),
            None => signed.values().any(|signed| signed == digest),
        })
    }
}

/// Signatures kept in memory, keyed by repository.
#[derive(Default)]
pub struct SignatureStore {
    signatures: RwLock<HashMap<String, HashMap<String, String>>>,
}

impl SignatureStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sign(&self, repository_name: &str, tag: &str, digest: &str) {
        self.signatures
            .write()
            .await
            .entry(repository_name.to_string())
            .or_default()
            .insert(tag.to_string(), digest.to_string());
    }
}

#[async_trait]
impl SignatureChecker for SignatureStore {
    async fn signed(&self, repository_name: &str) -> Result<HashMap<String, String>, Error> {
        Ok(self
            .signatures
            .read()
            .await
            .get(repository_name)
            .cloned()
            .unwrap_or_default())
    }
}
