//! Wire framing and record codec for the courier secure-channel protocol.
//!
//! This crate owns exactly the structural layer: the size-and-buffer length
//! prefix, the deterministic record schemas for endpoints, payload
//! references, and payloads, and base64url encoding for published address
//! book entries. It has no opinion on cryptography or transport — those
//! live in `courier-crypto` and `courier-client`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod base64url;
pub mod errors;
pub mod framing;
pub mod record;

pub use errors::{ProtoError, Result};
pub use framing::{DEFAULT_CEILING, Reader, write_framed, write_u64};
pub use record::{AddressBookEntryRecord, EndpointRecord, PayloadRecord, PayloadReferenceRecord, Record, encode_to_vec};

/// Format-version byte prefixed to a persisted `OwnEndpoint` byte stream
/// (see `courier_core::endpoint::save`/`open`). Bumped whenever the
/// persisted schema changes in a backward-incompatible way.
pub const OWN_ENDPOINT_FORMAT_VERSION: u8 = 1;
