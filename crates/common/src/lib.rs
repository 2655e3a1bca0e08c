pub mod config;
pub mod digest;

#[cfg(feature = "logging")]
pub mod logging;
