pub(crate) mod accessory;
pub(crate) mod authorization;
pub(crate) mod blob;
pub(crate) mod content_trust;
pub(crate) mod readonly;
pub(crate) mod request_id;
pub(crate) mod request_info;
pub(crate) mod security;
pub(crate) mod transaction;
pub(crate) mod vulnerable;
