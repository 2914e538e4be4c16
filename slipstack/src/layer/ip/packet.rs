use crate::layer::{Error, Result};
use crate::wire::{Checksum, IpProtocol, Ipv4Address, Ipv4Repr, ipv4_packet, IPV4_HEADER_LEN};

use super::{Endpoint, Link, HOP_LIMIT};

/// An incoming packet.
///
/// The header was validated and the datagram is addressed to us.
pub struct In<'a> {
    /// Access to the endpoint for answering.
    pub handle: Handle<'a>,
    /// The parsed header.
    pub repr: Ipv4Repr,
    /// The whole datagram.
    pub packet: &'a ipv4_packet,
}

/// An outgoing packet as prepared by the ip layer.
///
/// The header is filled in on `send`, the payload is zeroed until written to.
#[must_use = "You need to call `send` explicitely on an Out, otherwise no packet is sent."]
pub struct Out<'a> {
    link: &'a mut dyn Link,
    repr: Ipv4Repr,
    buffer: &'a mut [u8],
}

/// Initializer for a packet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Init {
    /// The address of the peer.
    pub dst_addr: Ipv4Address,
    /// The protocol of the payload.
    pub protocol: IpProtocol,
    /// Length of the payload that will follow the header.
    pub payload: usize,
}

/// The means of sending datagrams.
///
/// Bundles the endpoint for its address and identifier counter, the shared transmit buffer, and
/// the link below.
pub struct Handle<'a> {
    endpoint: &'a mut Endpoint,
    link: &'a mut dyn Link,
    buffer: &'a mut [u8],
}

impl<'a> Handle<'a> {
    /// Combine the parts needed for sending.
    ///
    /// The buffer is where outgoing datagrams are constructed, it needs to be at least as large as
    /// the MTU of the endpoint.
    pub fn new(endpoint: &'a mut Endpoint, link: &'a mut dyn Link, buffer: &'a mut [u8]) -> Self {
        Handle {
            endpoint,
            link,
            buffer,
        }
    }

    /// Proof to the compiler that we can shorten the lifetime arbitrarily.
    pub fn borrow_mut(&mut self) -> Handle {
        Handle {
            endpoint: &mut *self.endpoint,
            link: &mut *self.link,
            buffer: &mut *self.buffer,
        }
    }

    /// The address of this host.
    pub fn local_addr(&self) -> Ipv4Address {
        self.endpoint.local_addr()
    }

    /// The largest datagram that may be sent.
    pub fn mtu(&self) -> usize {
        self.endpoint.mtu().min(self.buffer.len())
    }

    /// Initialize a datagram in the transmit buffer.
    ///
    /// Fails with `BadSize` if header and payload exceed the MTU.
    pub fn prepare(&mut self, init: Init) -> Result<Out> {
        let total = IPV4_HEADER_LEN + init.payload;
        if total > self.mtu() {
            return Err(Error::BadSize);
        }

        let buffer = &mut self.buffer[..total];
        for byte in buffer.iter_mut() {
            *byte = 0;
        }

        let repr = Ipv4Repr {
            src_addr: self.endpoint.local_addr(),
            dst_addr: init.dst_addr,
            protocol: init.protocol,
            ident: self.endpoint.next_ident(),
            payload_len: init.payload,
            hop_limit: HOP_LIMIT,
        };

        Ok(Out {
            link: &mut *self.link,
            repr,
            buffer,
        })
    }
}

impl<'a> In<'a> {
    /// The payload of the datagram.
    pub fn payload(&self) -> &'a [u8] {
        self.packet.payload_slice()
    }
}

impl<'a> Out<'a> {
    /// The header that will be sent.
    pub fn repr(&self) -> Ipv4Repr {
        self.repr
    }

    /// The payload to be filled by the upper layer.
    pub fn payload_mut_slice(&mut self) -> &mut [u8] {
        &mut self.buffer[IPV4_HEADER_LEN..]
    }

    /// Finalize the header and transmit the datagram.
    pub fn send(self) -> Result<()> {
        let packet = ipv4_packet::new_unchecked_mut(self.buffer);
        self.repr.emit(packet, Checksum::Manual);
        net_trace!("ip: sending {}", self.repr);
        self.link.transmit(packet.as_bytes())
    }
}
