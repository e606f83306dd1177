//! In-memory fakes and concrete end-to-end scenarios for the courier
//! secure channel, exercised against the real [`courier_crypto::DefaultCryptoProvider`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod fakes;

pub use fakes::{FakeBlobStore, FakeInboxRelay};
