use crate::wire::{Checksum, Error, IpProtocol, Ipv4Address, Ipv4Repr, ipv4_packet};

use super::{Handle, In, Link, Recv};

/// The time-to-live of every datagram we send.
pub const HOP_LIMIT: u8 = 64;

/// The local state of the ip layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint {
    /// Our own address.
    addr: Ipv4Address,

    /// The identifier of the next datagram.
    ident: u16,

    /// Largest datagram accepted or sent.
    mtu: usize,
}

impl Endpoint {
    /// Create an endpoint with an address and the MTU of the link.
    pub fn new(addr: Ipv4Address, mtu: usize) -> Self {
        Endpoint {
            addr,
            ident: 0,
            mtu,
        }
    }

    /// The address of this host.
    pub fn local_addr(&self) -> Ipv4Address {
        self.addr
    }

    /// Change the address of this host.
    pub fn set_local_addr(&mut self, addr: Ipv4Address) {
        self.addr = addr;
    }

    /// The MTU of the link.
    pub fn mtu(&self) -> usize {
        self.mtu
    }

    pub(crate) fn next_ident(&mut self) -> u16 {
        let ident = self.ident;
        self.ident = self.ident.wrapping_add(1);
        ident
    }

    /// Process one received datagram.
    ///
    /// Invalid datagrams and those addressed to someone else are dropped silently. Others are
    /// dispatched by protocol to `upper` which may answer through the packet handle, built from
    /// `link` and the transmit `buffer`.
    pub fn receive<R: Recv + ?Sized>(
        &mut self,
        frame: &[u8],
        link: &mut dyn Link,
        buffer: &mut [u8],
        upper: &mut R,
    ) {
        let (repr, packet) = match self.check(frame) {
            Ok(checked) => checked,
            Err(err) => {
                net_debug!("ip: dropping datagram of {} bytes: {}", frame.len(), err);
                return;
            },
        };

        if repr.dst_addr != self.addr {
            net_trace!("ip: not for us, dropping {}", repr);
            return;
        }

        net_trace!("ip: received {}", repr);
        let packet = In {
            handle: Handle::new(self, link, buffer),
            repr,
            packet,
        };

        match repr.protocol {
            IpProtocol::Icmp => upper.icmp(packet),
            IpProtocol::Tcp => upper.tcp(packet),
            IpProtocol::Udp => upper.udp(packet),
            IpProtocol::Unknown(_) => {
                net_trace!("ip: unknown protocol, dropping {}", repr);
            },
        }
    }

    fn check<'f>(&self, frame: &'f [u8]) -> Result<(Ipv4Repr, &'f ipv4_packet), Error> {
        let packet = ipv4_packet::new_unchecked(frame);
        let repr = Ipv4Repr::parse(packet, Checksum::Manual)?;

        if repr.hop_limit == 0 {
            return Err(Error::Malformed);
        }

        if usize::from(packet.total_len()) > self.mtu {
            return Err(Error::Unsupported);
        }

        Ok((repr, packet))
    }
}
