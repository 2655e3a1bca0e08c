//! Accessories: artifacts whose meaning is relative to a subject artifact.
//!
//! Each accessory type has a fixed [`Kind`]. Hard accessories are deleted
//! together with their subject, soft ones survive it, and plain ones are
//! ordinary artifacts with a recorded link.

pub mod manager;

use std::collections::HashMap;

use db::{accessory, PrimitiveDateTime};
use once_cell::sync::Lazy;

pub use manager::Query;

pub const TYPE_NONE: &str = "base";
pub const TYPE_COSIGN_SIGNATURE: &str = "cosign.signature";
pub const TYPE_SUBJECT: &str = "subject";
pub const TYPE_NYDUS_ACCELERATOR: &str = "nydus.accelerator";
pub const TYPE_HARBOR_SBOM: &str = "harbor.sbom";

/// Reference strength between an accessory and its subject.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Kind {
    None,
    Soft,
    Hard,
}

/// Stored accessory record.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AccessoryData {
    pub id: i64,
    pub artifact_id: i64,
    pub subject_artifact_id: Option<i64>,
    pub subject_artifact_digest: String,
    pub subject_artifact_repo: String,
    pub accessory_type: String,
    pub size: i64,
    pub digest: String,
    pub creation_time: Option<PrimitiveDateTime>,
}

impl From<accessory::Model> for AccessoryData {
    fn from(model: accessory::Model) -> Self {
        Self {
            id: model.id,
            artifact_id: model.artifact_id,
            subject_artifact_id: model.subject_artifact_id,
            subject_artifact_digest: model.subject_artifact_digest,
            subject_artifact_repo: model.subject_artifact_repo,
            accessory_type: model.accessory_type,
            size: model.size,
            digest: model.digest,
            creation_time: Some(model.creation_time),
        }
    }
}

pub trait Accessory: Send + Sync {
    fn data(&self) -> &AccessoryData;

    fn kind(&self) -> Kind;

    /// Whether the accessory is shown next to its subject.
    fn display(&self) -> bool;

    fn is_hard(&self) -> bool {
        self.kind() == Kind::Hard
    }

    fn is_soft(&self) -> bool {
        self.kind() == Kind::Soft
    }
}

macro_rules! accessory_type {
    ($name:ident, $kind:expr, $display:expr) => {
        struct $name(AccessoryData);

        impl Accessory for $name {
            fn data(&self) -> &AccessoryData {
                &self.0
            }

            fn kind(&self) -> Kind {
                $kind
            }

            fn display(&self) -> bool {
                $display
            }
        }
    };
}

accessory_type!(Base, Kind::None, false);
accessory_type!(CosignSignature, Kind::Hard, true);
accessory_type!(Subject, Kind::Hard, true);
accessory_type!(NydusAccelerator, Kind::Hard, true);
accessory_type!(HarborSbom, Kind::Hard, false);

type Constructor = fn(AccessoryData) -> Box<dyn Accessory>;

static REGISTRY: Lazy<HashMap<&'static str, Constructor>> = Lazy::new(|| {
    HashMap::from([
        (TYPE_NONE, (|data| Box::new(Base(data))) as Constructor),
        (TYPE_COSIGN_SIGNATURE, |data| Box::new(CosignSignature(data))),
        (TYPE_SUBJECT, |data| Box::new(Subject(data))),
        (TYPE_NYDUS_ACCELERATOR, |data| Box::new(NydusAccelerator(data))),
        (TYPE_HARBOR_SBOM, |data| Box::new(HarborSbom(data))),
    ])
});

/// Wrap the accessory data into the implementation of its type.
///
/// Unknown types fall back to the plain [`TYPE_NONE`] accessory.
pub fn new(data: AccessoryData) -> Box<dyn Accessory> {
    match REGISTRY.get(data.accessory_type.as_str()) {
        Some(constructor) => constructor(data),
        None => Box::new(Base(data)),
    }
}
