//! Default cryptographic primitives for the courier secure channel:
//! X25519 + HKDF-SHA256 + XChaCha20-Poly1305 for asymmetric key wrap,
//! Ed25519 for signatures, SHA-256 for hashing.
//!
//! This crate provides one concrete [`courier_core::CryptoProvider`]
//! implementation; tests substitute their own via the same trait.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod default_provider;
pub mod errors;

pub use default_provider::DefaultCryptoProvider;
