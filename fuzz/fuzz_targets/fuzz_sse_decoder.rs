#![no_main]

use bytes::BytesMut;
use knockgate::refresh::SseDecoder;
use libfuzzer_sys::fuzz_target;
use tokio_util::codec::Decoder;

fuzz_target!(|data: &[u8]| {
    // feed in two chunks so partial lines are exercised
    let split = data.first().map_or(0, |b| usize::from(*b)).min(data.len());
    let mut decoder = SseDecoder::new();
    let mut buf = BytesMut::new();

    for chunk in [&data[..split], &data[split..]] {
        buf.extend_from_slice(chunk);
        loop {
            match decoder.decode(&mut buf) {
                Ok(Some(_)) => {}
                Ok(None) | Err(_) => break,
            }
        }
    }
    let _ = decoder.decode_eof(&mut buf);
});
