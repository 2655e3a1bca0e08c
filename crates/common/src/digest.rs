use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

static DIGEST_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new("^sha256:[a-f0-9]{64}$").expect("invalid regex string"));

/// Compute content digest of the provided data, in the `sha256:<hex>` form.
pub fn sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("sha256:{}", hex::encode(hasher.finalize()))
}

/// Check whether the provided string is a valid sha256 content digest.
pub fn is_valid(digest: &str) -> bool {
    DIGEST_REGEX.is_match(digest)
}
