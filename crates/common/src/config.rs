use std::{net::SocketAddr, path::PathBuf, time::Duration};

use byte_unit::n_mib_bytes;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;

#[cfg(feature = "logging")]
use tracing_subscriber::filter::LevelFilter;

/// Database configuration.
#[derive(Deserialize)]
pub struct Database {
    /// Database URL string.
    pub url: String,
}

/// HTTP server configuration.
#[derive(Deserialize)]
pub struct Server {
    /// Address, that HTTP server will listen on.
    pub address: SocketAddr,
}

/// Storage backend (distribution) configuration.
#[derive(Deserialize)]
pub struct Registry {
    /// Base URL of the storage backend all v2 requests are proxied to.
    ///
    /// Can be overridden with the `REGISTRY_URL` environment variable.
    pub url: String,
}

/// Shared key-value cache configuration.
#[derive(Deserialize)]
pub struct Redis {
    /// Redis connection URL, e.g. `redis://localhost:6379/0`.
    pub url: String,
}

/// Implementation of [`serde`]'s deserializer for [`FromStr`] types.
#[cfg(feature = "logging")]
fn deserialize_from_str<'de, T, D>(deserializer: D) -> Result<T, D::Error>
where
    T: std::str::FromStr,
    T::Err: std::error::Error,
    D: serde::de::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    std::str::FromStr::from_str(&s).map_err(serde::de::Error::custom)
}

/// Logging configuration.
#[cfg(feature = "logging")]
#[derive(Deserialize)]
pub struct Logging {
    /// Log level.
    #[serde(deserialize_with = "deserialize_from_str")]
    pub level: LevelFilter,
}

#[cfg(feature = "logging")]
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: LevelFilter::WARN,
        }
    }
}

/// Blob upload and manifest push configuration.
#[derive(Deserialize)]
pub struct Upload {
    /// Lifetime of the accepted upload size counters, in seconds.
    #[serde(default = "default_size_ttl")]
    pub size_ttl: u64,

    /// Max manifest body size accepted on push, in bytes.
    #[serde(default = "default_max_manifest_size")]
    pub max_manifest_size: usize,
}

impl Upload {
    /// Accepted upload size counter lifetime as a [`Duration`].
    pub fn size_ttl(&self) -> Duration {
        Duration::from_secs(self.size_ttl)
    }
}

impl Default for Upload {
    fn default() -> Self {
        Self {
            size_ttl: default_size_ttl(),
            max_manifest_size: default_max_manifest_size(),
        }
    }
}

fn default_size_ttl() -> u64 {
    7 * 24 * 3600
}

fn default_max_manifest_size() -> usize {
    n_mib_bytes!(4) as usize
}

/// Statically configured user account.
#[derive(Clone, Deserialize)]
pub struct User {
    /// User name.
    pub name: String,

    /// Plain text password used for basic authentication.
    pub password: String,

    /// System administrators can push to and pull from every project.
    #[serde(default)]
    pub admin: bool,

    /// Projects this user is a member of.
    #[serde(default)]
    pub projects: Vec<String>,

    /// Scanner accounts bypass pull policies.
    #[serde(default)]
    pub scanner: bool,
}

/// Statically configured bearer token.
#[derive(Clone, Deserialize)]
pub struct Token {
    /// Token value, as passed in the `Authorization: Bearer` header.
    pub token: String,

    /// Name of the principal that owns the token.
    pub name: String,

    /// Projects this token grants access to.
    #[serde(default)]
    pub projects: Vec<String>,

    /// Tokens carrying the `scanner-pull` claim bypass pull policies.
    #[serde(default)]
    pub scanner_pull: bool,
}

/// Authentication configuration.
#[derive(Default, Deserialize)]
pub struct Auth {
    /// Basic authentication accounts.
    #[serde(default)]
    pub users: Vec<User>,

    /// Bearer tokens.
    #[serde(default)]
    pub tokens: Vec<Token>,
}

/// Content trust configuration.
#[derive(Default, Deserialize)]
pub struct ContentTrust {
    /// Enable Notary signature checks for projects that require content trust.
    #[serde(default)]
    pub notary: bool,
}

/// General configuration.
#[derive(Deserialize)]
pub struct Config {
    /// General database configuration.
    pub database: Database,

    /// HTTP server configuration.
    #[serde(default)]
    pub server: Option<Server>,

    /// Storage backend configuration.
    #[serde(default)]
    pub registry: Option<Registry>,

    /// Key-value cache configuration.
    ///
    /// If `None`, an in-process cache is used.
    #[serde(default)]
    pub redis: Option<Redis>,

    /// Logging configuration.
    #[cfg(feature = "logging")]
    #[serde(default)]
    pub logging: Logging,

    /// Upload configuration.
    #[serde(default)]
    pub upload: Upload,

    /// Authentication configuration.
    #[serde(default)]
    pub auth: Auth,

    /// Content trust configuration.
    #[serde(default)]
    pub content_trust: ContentTrust,

    /// System-wide CVE allow-list.
    #[serde(default)]
    pub cve_allowlist: Vec<String>,

    /// Reject every modifying request.
    #[serde(default)]
    pub read_only: bool,
}

impl Config {
    /// Create new config using default configuration file or environment variables.
    ///
    /// See [`Env`] for more details on how to use environment variables configuration.
    ///
    /// [`Env`]: figment::providers::Env
    pub fn new(path: Option<PathBuf>) -> Result<Self, figment::Error> {
        Self::figment(path).extract()
    }

    fn figment(path: Option<PathBuf>) -> Figment {
        Figment::new()
            .merge(Toml::file(path.unwrap_or(PathBuf::from("Config.toml"))))
            .merge(Env::prefixed("CONFIG_").split("_"))
            .merge(
                Env::raw()
                    .only(&["REGISTRY_URL"])
                    .map(|_| "registry.url".into()),
            )
    }

    /// Create new config suitable for running unit tests.
    #[cfg(feature = "test-utils")]
    pub fn for_tests() -> Self {
        Self {
            database: Database {
                url: String::from("sqlite::memory:"),
            },
            server: Some(Server {
                address: "127.0.0.1:3000".parse().unwrap(),
            }),
            registry: Some(Registry {
                url: String::from("http://127.0.0.1:5000"),
            }),
            redis: None,
            #[cfg(feature = "logging")]
            logging: Logging::default(),
            upload: Upload::default(),
            auth: Auth::default(),
            content_trust: ContentTrust::default(),
            cve_allowlist: Vec::new(),
            read_only: false,
        }
    }
}
