pub mod accessory;
pub mod artifact;
pub mod blob;
pub mod cache;
pub mod error;
pub mod manifest;
pub mod project;
pub mod signature;
pub mod vuln;

#[cfg(test)]
mod testing;

pub use error::{Error, Kind};
