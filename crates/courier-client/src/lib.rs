//! HTTP relay client and channel orchestration for the courier secure
//! channel: the concrete transport and concurrency layer built on top of
//! `courier-core`'s envelope and verification logic.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod blob_store;
pub mod channel;
pub mod errors;
pub mod relay;

pub use blob_store::HttpBlobStore;
pub use channel::{Channel, ReceiveProgress};
pub use errors::PostError;
pub use relay::RelayClient;
