//! Fuzz test for peer ID and bootnode parsing

#![no_main]

use libfuzzer_sys::fuzz_target;
use xdag_discovery::{Bootnode, PeerId};

fuzz_target!(|data: &[u8]| {
    if let Ok(id) = PeerId::from_slice(data) {
        assert_eq!(id.as_bytes().as_slice(), data);
        assert_eq!(id.log_distance(&id), 0);
        let _ = id.public_key();
    }

    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(bootnode) = s.parse::<Bootnode>() {
            let reparsed: Bootnode = bootnode.to_string().parse().unwrap();
            assert_eq!(reparsed, bootnode);
        }
    }
});
