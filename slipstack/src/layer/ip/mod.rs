//! The ip layer.
//!
//! Only IPv4 without options and without fragmentation is spoken. Received datagrams are checked
//! against the header invariants and the link MTU, then routed by protocol number to an
//! implementation of [`Recv`]. There is no routing table: the serial line is point-to-point and
//! every datagram goes out over the single [`Link`].
//!
//! [`Recv`]: trait.Recv.html
//! [`Link`]: trait.Link.html
mod endpoint;
mod packet;


use crate::layer::Result;

pub use endpoint::{
    Endpoint,
    HOP_LIMIT,
};

pub use packet::{
    Handle,
    In,
    Init,
    Out,
};

/// The lower layer transmitting complete datagrams.
pub trait Link {
    /// Send one datagram, header included.
    fn transmit(&mut self, datagram: &[u8]) -> Result<()>;
}

/// A receiver for validated datagrams, one method per upper protocol.
///
/// Every method defaults to dropping the packet.
pub trait Recv {
    /// Handle an ICMP message.
    fn icmp(&mut self, packet: In) {
        net_trace!("ip: no icmp handler, dropping {}", packet.repr);
    }

    /// Handle a TCP segment.
    fn tcp(&mut self, packet: In) {
        net_trace!("ip: no tcp handler, dropping {}", packet.repr);
    }

    /// Handle a UDP datagram.
    fn udp(&mut self, packet: In) {
        net_trace!("ip: no udp handler, dropping {}", packet.repr);
    }
}
