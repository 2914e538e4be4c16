/*! Low-level packet access and construction.

# Packet representations

The `wire` module only deals with the *representation* of packets, never with what a host should
do with them. It offers two levels of access.

 * Lowercase byte wrappers such as [`ipv4_packet`] and [`tcp_packet`] reinterpret a byte slice as
   a header and provide getters and setters for every field. They are unsized, so a `&[u8]`
   handed out by the SLIP framer becomes a `&ipv4_packet` without copying.
 * `Repr` structs such as [`Ipv4Repr`] and [`TcpRepr`] hold the decoded header values. They are
   produced by `Repr::parse`, which validates the packet, and written back with `Repr::emit`.

If `new_checked` (or `check_len`) returned `Ok(())` then no accessor of the byte wrapper will
panic as long as the length fields are not modified afterwards. `Repr::parse` never panics, and
`Repr::emit` never panics when the buffer is at least `Repr::buffer_len()` bytes long.

Headers are always emitted without options. Received options are skipped using the length fields.

# Examples

Emit an IPv4 header into a buffer and parse it back:

```rust
use slipstack::wire::*;
let repr = Ipv4Repr {
    src_addr:    Ipv4Address::new(192, 168, 1, 51),
    dst_addr:    Ipv4Address::new(192, 168, 1, 1),
    protocol:    IpProtocol::Tcp,
    ident:       7,
    payload_len: 10,
    hop_limit:   64,
};
let mut buffer = vec![0; repr.buffer_len() + repr.payload_len];
repr.emit(ipv4_packet::new_unchecked_mut(&mut buffer), Checksum::Manual);

let packet = ipv4_packet::new_checked(&buffer).expect("truncated packet");
let parsed = Ipv4Repr::parse(packet, Checksum::Manual).expect("malformed packet");
assert_eq!(repr, parsed);
```
*/
// Copyright (C) 2016 whitequark@whitequark.org
// Copyright (C) 2019 Andreas Molzer <andreas.molzer@tum.de>
//
// The byte wrapper and `Repr` layout of `ipv4.rs`, `tcp.rs`, `udp.rs` and `icmpv4.rs` follows
// `smoltcp` originally distributed under 0-clause BSD.

mod field {
    pub(crate) type Field = ::core::ops::Range<usize>;
    pub(crate) type Rest  = ::core::ops::RangeFrom<usize>;
}

pub mod checksum;
mod error;
mod icmpv4;
mod ipv4;
mod tcp;
mod udp;

pub use self::error::{Error, Result};

pub use self::ipv4::{
    Address as Ipv4Address,
    Protocol as IpProtocol,
    Repr as Ipv4Repr,
    ipv4 as ipv4_packet,
    HEADER_LEN as IPV4_HEADER_LEN,
};

pub use self::tcp::{
    Flags as TcpFlags,
    Repr as TcpRepr,
    SeqNumber as TcpSeqNumber,
    tcp as tcp_packet,
    HEADER_LEN as TCP_HEADER_LEN,
};

pub use self::udp::{
    Repr as UdpRepr,
    udp as udp_packet,
    HEADER_LEN as UDP_HEADER_LEN,
};

pub use self::icmpv4::{
    Message as Icmpv4Message,
    Repr as Icmpv4Repr,
    icmpv4 as icmpv4_packet,
    HEADER_LEN as ICMPV4_HEADER_LEN,
};

/// Whether checksums are computed and verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Checksum {
    /// Verify received checksums and fill outgoing ones.
    Manual,

    /// Leave checksums alone.
    ///
    /// Only useful for inspecting packets that are known to be damaged, e.g. in tests.
    Ignored,
}

impl Checksum {
    /// Whether checksums are handled in software.
    pub fn manual(self) -> bool {
        self == Checksum::Manual
    }
}
