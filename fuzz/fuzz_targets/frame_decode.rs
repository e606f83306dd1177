//! Fuzz target for the size-and-buffer primitive.
//!
//! Exercises `Reader::read_framed` against arbitrary bytes to find:
//! - Integer overflow in length-prefix arithmetic
//! - Buffer over-reads past the declared length
//! - Ceiling checks bypassed by a crafted length
//!
//! Must never panic. All invalid inputs return `Err`.

#![no_main]

use courier_proto::Reader;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut reader = Reader::new(data);
    while reader.remaining() > 0 {
        if reader.read_framed().is_err() {
            break;
        }
    }
});
