//! Fuzz test for NetDB parsing in both the compact and the text form

#![no_main]

use libfuzzer_sys::fuzz_target;
use xdag_net::NetDb;

fuzz_target!(|data: &[u8]| {
    let compact = NetDb::parse_compact(data);
    assert!(compact.len() <= data.len() / 6);
    assert_eq!(NetDb::parse_compact(&compact.to_compact()), compact);

    if let Ok(text) = std::str::from_utf8(data) {
        let lines = NetDb::parse_lines(text);
        assert_eq!(NetDb::parse_lines(&lines.to_lines()), lines);
    }
});
