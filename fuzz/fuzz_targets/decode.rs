// cargo fuzz run decode corpus/decode -- -timeout=30

#![no_main]

use libfuzzer_sys::fuzz_target;

use gifcast::{Decoder, MismatchPolicy};

fuzz_target!(|data: &[u8]| {
    let decoded = Decoder::new(data)
        .max_image_sz(Some(1 << 16))
        .mismatch_policy(MismatchPolicy::Discard)
        .decode();
    if let Ok(decoded) = decoded {
        for step in decoded.document.steps() {
            if step.is_err() {
                return;
            }
        }
    }
});
