//! Fuzz target for `parse_notification`: the inbound pipeline's decrypt,
//! signature-verify, and recipient-binding check, fed arbitrary wire bytes.
//!
//! A notification never authored by the sampled keypair should always be
//! rejected cleanly (`Malformed` or `InvalidMessage`), never panic.

#![no_main]

use std::sync::OnceLock;

use courier_core::CryptoProvider;
use courier_crypto::DefaultCryptoProvider;
use libfuzzer_sys::fuzz_target;

struct FixedKeys {
    encryption_priv: Vec<u8>,
    signing_pub: Vec<u8>,
}

fn fixed_keys() -> &'static FixedKeys {
    static KEYS: OnceLock<FixedKeys> = OnceLock::new();
    KEYS.get_or_init(|| {
        let crypto = DefaultCryptoProvider::new();
        let (_signing_priv, signing_pub) = crypto.generate_signing_keypair();
        let (encryption_priv, _encryption_pub) = crypto.generate_encryption_keypair();
        FixedKeys { encryption_priv, signing_pub }
    })
}

fuzz_target!(|data: &[u8]| {
    let crypto = DefaultCryptoProvider::new();
    let keys = fixed_keys();
    let _ = courier_core::parse_notification(
        &crypto,
        &keys.encryption_priv,
        &keys.signing_pub,
        data,
        courier_proto::DEFAULT_CEILING,
    );
});
