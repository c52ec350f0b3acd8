#![no_main]

use libfuzzer_sys::fuzz_target;
use simple_test::channel::InvocationRecord;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(args) = InvocationRecord::decode_args(s) {
            let encoded = InvocationRecord::encode_args(&args).unwrap();
            assert_eq!(InvocationRecord::decode_args(&encoded).unwrap(), args);
        }
    }
});
