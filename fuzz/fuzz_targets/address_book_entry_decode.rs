//! Fuzz target for `verify_address_book_entry`: parses and signature-checks
//! a published address-book entry from arbitrary bytes. Must never panic.

#![no_main]

use courier_core::verify_address_book_entry;
use courier_crypto::DefaultCryptoProvider;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let crypto = DefaultCryptoProvider::new();
    let _ = verify_address_book_entry(data, &crypto);
});
