#![no_main]

use libfuzzer_sys::fuzz_target;
use planpost_core::{decode_comment_header, encode_comment_header};

fuzz_target!(|data: &[u8]| {
    let line = String::from_utf8_lossy(data);
    let headers = decode_comment_header(&line);
    let _ = encode_comment_header(&headers);
});
