#![no_main]

use libfuzzer_sys::fuzz_target;
use ws_core::buffer::ParserBuffer;
use ws_core::parser::Parser;
use ws_core::reader::FrameReader;

// Feeds arbitrary bytes straight into the incremental frame parser, one
// byte at a time, the way a flaky transport would hand them to `Stream`.
// The parser must never panic on untrusted input (spec §7: "the reader
// never panics on peer input") -- every malformed shape it rejects has to
// come back as an `Error`, not a crash.
fuzz_target!(|data: &[u8]| {
    let mut reader = FrameReader::new(16 << 20);
    let mut buf = ParserBuffer::new();

    for byte in data {
        buf.extend(std::slice::from_ref(byte));
        loop {
            match reader.advance(&mut buf) {
                Ok(Some(_frame)) => continue,
                Ok(None) => break,
                Err(_) => return,
            }
        }
    }
});
