#![no_main]

use bytes::Bytes;
use coldstream_offload::OffloadIndexBlock;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Feed arbitrary bytes to the index block decoder.
    // The decoder should handle all malformed inputs gracefully:
    // - Invalid magic bytes
    // - Truncated headers and entry tables
    // - Unsorted or non-covering tables
    // - Nonsense metadata (negative last entry ID, absurd entry counts)
    let _ = OffloadIndexBlock::peek_version(data);

    let bytes = Bytes::copy_from_slice(data);
    if let Ok(index) = OffloadIndexBlock::decode(bytes) {
        // If decoding succeeded, lookups must stay in bounds for any ID
        let last = index.metadata().last_entry_id;
        let _ = index.lookup(0);
        let _ = index.lookup(last);
        let _ = index.lookup(last / 2);
        let _ = index.lookup(-1);
        let _ = index.lookup(i64::MAX);
        let _ = index.metadata();
        let _ = index.data_object_length();
        let _ = index.data_header_length();
    }
});
