//! The udp layer.
//!
//! Datagrams are routed to a small table of port bindings, each served by an implementation of
//! [`Recv`]. A datagram for a port without binding is dropped silently. The receiver gets the
//! parsed header together with a handle to the ip layer and may answer right away with
//! [`Packet::reply`].
//!
//! A closure works as a binding by wrapping it in [`FnHandler`]:
//!
//! ```
//! use slipstack::layer::{udp, FnHandler};
//!
//! let echo = FnHandler(|mut packet: udp::Packet| {
//!     let payload = packet.payload;
//!     let _ = packet.reply(payload);
//! });
//!
//! let mut udp = udp::Endpoint::new();
//! udp.bind(7, &echo).expect("port is free");
//! ```
//!
//! [`Recv`]: trait.Recv.html
//! [`Packet::reply`]: struct.Packet.html#method.reply
//! [`FnHandler`]: ../struct.FnHandler.html
mod endpoint;
#[cfg(test)]
mod tests;

use crate::layer::{ip, FnHandler, Result};
use crate::wire::{Ipv4Address, UdpRepr};

pub use endpoint::{
    send_to,
    Endpoint,
    MAX_BINDINGS,
};

/// A received datagram.
pub struct Packet<'a> {
    /// Handle for answering.
    pub handle: ip::Handle<'a>,
    /// The address of the sender.
    pub src_addr: Ipv4Address,
    /// The parsed header.
    pub repr: UdpRepr,
    /// The data of the datagram.
    pub payload: &'a [u8],
}

/// A UDP receiver bound to a port.
pub trait Recv {
    /// Inspect one datagram addressed to the bound port.
    fn receive(&self, packet: Packet);
}

impl Packet<'_> {
    /// Answer the sender, from the port it addressed.
    ///
    /// Fails with `Illegal` if the sender did not name a source port.
    pub fn reply(&mut self, data: &[u8]) -> Result<()> {
        let dst_addr = self.src_addr;
        let (src_port, dst_port) = (self.repr.dst_port, self.repr.src_port);
        send_to(self.handle.borrow_mut(), src_port, dst_addr, dst_port, data)
    }
}

impl<F> Recv for FnHandler<F>
    where F: Fn(Packet)
{
    fn receive(&self, packet: Packet) {
        self.0(packet)
    }
}
