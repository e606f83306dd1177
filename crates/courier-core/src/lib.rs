//! Envelope construction and inbound verification for the courier
//! end-to-end encrypted secure channel.
//!
//! This crate owns the part of the system that must be bit-exact and
//! fail-safe: building and parsing the cryptographic envelopes that travel
//! over an untrusted relay, and the pure crypto/verification steps of the
//! inbound pipeline. It depends only on the capability traits in
//! [`capabilities`] — concrete transports and crypto primitives live in
//! `courier-client` and `courier-crypto`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod capabilities;
pub mod config;
pub mod endpoint;
pub mod errors;
pub mod notification;
pub mod payload;

pub use capabilities::{
    BlobStore, Clock, CryptoProvider, FetchOutcome, InboxCreated, IncomingItem, InboxRelay,
    SymmetricEncryptionResult, SystemClock,
};
pub use config::ChannelConfig;
pub use endpoint::{Endpoint, OwnEndpoint, verify_address_book_entry};
pub use errors::{CourierError, InvalidMessageKind, Result};
pub use notification::{ParsedNotification, build_notification, lifetime_minutes, parse_notification};
pub use payload::{Payload, PayloadReference, fetch_payload, post_payload};
