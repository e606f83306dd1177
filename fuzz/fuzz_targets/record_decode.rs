//! Fuzz target for the typed record codec.
//!
//! Decodes arbitrary bytes as each record schema in turn (endpoint, payload
//! reference, payload, address-book entry). Must never panic — every
//! malformed or truncated input is rejected with a `ProtoError`.

#![no_main]

use courier_proto::{AddressBookEntryRecord, EndpointRecord, PayloadRecord, PayloadReferenceRecord, Reader, Record};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = EndpointRecord::decode(&mut Reader::new(data));
    let _ = PayloadReferenceRecord::decode(&mut Reader::new(data));
    let _ = PayloadRecord::decode(&mut Reader::new(data));
    let _ = AddressBookEntryRecord::decode(&mut Reader::new(data));
});
