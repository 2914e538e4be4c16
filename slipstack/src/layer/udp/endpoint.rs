use crate::layer::{ip, Error, Result};
use crate::wire::{Checksum, IpProtocol, Ipv4Address, UdpRepr, udp_packet};

use super::{Packet, Recv};

/// Number of ports that can be bound at once.
pub const MAX_BINDINGS: usize = 4;

/// The udp endpoint state.
///
/// Compared to TCP this is very minimal as it contains no connection states, only the list of
/// bound ports and their receivers.
pub struct Endpoint<'a> {
    bindings: [Option<Binding<'a>>; MAX_BINDINGS],
}

#[derive(Clone, Copy)]
struct Binding<'a> {
    port: u16,
    recv: &'a dyn Recv,
}

impl<'a> Endpoint<'a> {
    /// Create an endpoint without bindings.
    pub fn new() -> Self {
        Endpoint {
            bindings: [None; MAX_BINDINGS],
        }
    }

    /// Deliver datagrams for `port` to `recv`.
    ///
    /// Returns `Err(Error::Illegal)` for port zero or a port that is already bound and
    /// `Err(Error::Exhausted)` if the table is full.
    pub fn bind(&mut self, port: u16, recv: &'a dyn Recv) -> Result<()> {
        if port == 0 || self.is_bound(port) {
            return Err(Error::Illegal);
        }

        let slot = self.bindings.iter_mut()
            .find(|slot| slot.is_none())
            .ok_or(Error::Exhausted)?;
        *slot = Some(Binding { port, recv });
        Ok(())
    }

    /// Remove the binding of a port.
    pub fn unbind(&mut self, port: u16) -> Result<()> {
        let slot = self.bindings.iter_mut()
            .find(|slot| slot.map(|binding| binding.port) == Some(port))
            .ok_or(Error::Illegal)?;
        *slot = None;
        Ok(())
    }

    /// Whether a receiver is bound to the port.
    pub fn is_bound(&self, port: u16) -> bool {
        self.binding(port).is_some()
    }

    /// Process a datagram handed up by the ip layer.
    pub fn receive(&self, packet: ip::In) {
        let ip::In { handle, repr: ip_repr, packet } = packet;

        let datagram = udp_packet::new_unchecked(packet.payload_slice());
        let repr = match UdpRepr::parse(datagram, ip_repr.src_addr, ip_repr.dst_addr, Checksum::Manual) {
            Ok(repr) => repr,
            Err(err) => {
                net_debug!("udp: dropping datagram from {}: {}", ip_repr.src_addr, err);
                return;
            },
        };

        let recv = match self.binding(repr.dst_port) {
            Some(recv) => recv,
            None => {
                net_trace!("udp: port {} not bound, dropping {}", repr.dst_port, repr);
                return;
            },
        };

        net_trace!("udp: received {}", repr);
        recv.receive(Packet {
            handle,
            src_addr: ip_repr.src_addr,
            repr,
            payload: datagram.payload_slice(),
        });
    }

    fn binding(&self, port: u16) -> Option<&'a dyn Recv> {
        self.bindings.iter()
            .filter_map(|slot| *slot)
            .find(|binding| binding.port == port)
            .map(|binding| binding.recv)
    }
}

impl Default for Endpoint<'_> {
    fn default() -> Self {
        Endpoint::new()
    }
}

/// Send a single datagram.
///
/// The source port may be any port, bound or not.
pub fn send_to(
    mut ip: ip::Handle,
    src_port: u16,
    dst_addr: Ipv4Address,
    dst_port: u16,
    data: &[u8],
) -> Result<()> {
    if dst_port == 0 {
        return Err(Error::Illegal);
    }

    let repr = UdpRepr {
        src_port,
        dst_port,
        payload_len: data.len(),
    };
    let mut out = ip.prepare(ip::Init {
        dst_addr,
        protocol: IpProtocol::Udp,
        payload: repr.buffer_len(),
    })?;
    let src_addr = out.repr().src_addr;

    let datagram = udp_packet::new_unchecked_mut(out.payload_mut_slice());
    repr.emit(datagram);
    datagram.payload_mut_slice().copy_from_slice(data);
    datagram.fill_checksum(src_addr, dst_addr);

    net_trace!("udp: sending {}", repr);
    out.send()
}
