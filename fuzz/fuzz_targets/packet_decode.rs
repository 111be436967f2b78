//! Fuzz test for discovery packet decoding
//!
//! Arbitrary datagrams must be rejected or decoded, never panic. Anything
//! that decodes once decodes again to the same packet.

#![no_main]

use libfuzzer_sys::fuzz_target;
use xdag_discovery::{Packet, PacketData};

fuzz_target!(|data: &[u8]| {
    let Ok(packet) = Packet::decode(data) else {
        return;
    };
    assert_eq!(packet.as_bytes(), data);
    assert_eq!(Packet::decode(packet.as_bytes()).ok().as_ref(), Some(&packet));

    // Payload decoders are also reachable directly
    let payload = packet.payload();
    match packet.data() {
        PacketData::Ping(_) => assert!(xdag_discovery::Ping::decode(payload).is_ok()),
        PacketData::Pong(_) => assert!(xdag_discovery::Pong::decode(payload).is_ok()),
        PacketData::FindNeighbors(_) => {
            assert!(xdag_discovery::FindNeighbors::decode(payload).is_ok());
        }
        PacketData::Neighbors(_) => assert!(xdag_discovery::Neighbors::decode(payload).is_ok()),
    }
});
