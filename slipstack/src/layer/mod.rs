//! The process logic of protocol layers.
//!
//! ## Layering
//!
//! Each protocol layer is split into two parts; the packet logic contained in `wire` and the
//! processing part in this module. An endpoint represents the local state of a protocol, such as
//! the address and datagram identifier of the IP layer or the socket table of TCP. This state is
//! open to modification by the user program while no packet is being processed.
//!
//! ## Receiving
//!
//! A complete SLIP frame is handed to [`ip::Endpoint::receive`]. After validation the IP layer
//! routes the datagram to an implementation of [`ip::Recv`] which offers one method per upper
//! protocol. Upper layers get the parsed IP header, the packet, and a [`ip::Handle`] through which
//! they may answer immediately.
//!
//! ## Sending
//!
//! Every transmission starts from an `ip::Handle`. Its `prepare` method constructs the IP header in
//! the shared transmit buffer and yields an `ip::Out` whose payload the upper layer fills before
//! calling `send`. That hands the datagram to an [`ip::Link`], normally the SLIP encoder writing to
//! the serial device.
//!
//! [`ip::Endpoint::receive`]: ip/struct.Endpoint.html#method.receive
//! [`ip::Recv`]: ip/trait.Recv.html
//! [`ip::Handle`]: ip/struct.Handle.html
//! [`ip::Link`]: ip/trait.Link.html
use core::fmt;

pub mod icmp;
pub mod ip;
pub mod slip;
pub mod tcp;
pub mod udp;

/// The result type of the outgoing API.
pub type Result<T> = core::result::Result<T, Error>;

/// Errors of operations requested by the user, never of received packets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Error {
    /// The operation was not permitted.
    ///
    /// Returned when the endpoint or socket does not allow an operation in its current state, for
    /// example sending on a connection that is not established or listening on port zero.
    Illegal,

    /// Not enough space for the requested packet.
    ///
    /// The data does not fit into a single segment or the datagram exceeds the link MTU. In
    /// contrast to `Illegal` this signals that a smaller size may be possible.
    BadSize,

    /// The socket handle no longer refers to a live connection.
    Unreachable,

    /// The action could not be completed because there were not enough resources.
    ///
    /// The main difference towards `Illegal` is that it would have been legal with more
    /// resources, such as a free slot in the listener table.
    Exhausted,

    /// The serial device failed to accept the data.
    Device,
}

/// A standard wrapper for a function implementing receive traits.
///
/// Keeps the type alias overhead low by providing a single wrapper type that implements the
/// receive traits of the layers where a closure is sufficient, such as a UDP port binding.
pub struct FnHandler<F>(pub F);

/// Can convert from a wire error.
///
/// This indicates some layer tried to operate on a packet but failed.
impl From<crate::wire::Error> for Error {
    fn from(_: crate::wire::Error) -> Self {
        Error::Illegal
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Illegal     => write!(f, "operation not permitted"),
            Error::BadSize     => write!(f, "packet size not possible"),
            Error::Unreachable => write!(f, "no such connection"),
            Error::Exhausted   => write!(f, "resources exhausted"),
            Error::Device      => write!(f, "device error"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}
