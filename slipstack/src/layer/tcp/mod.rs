//! The TCP layer.
//!
//! A fixed table of sockets driven purely by arriving segments and the passing of ticks. There is
//! no retransmission and no reordering: segments are accepted strictly in sequence and the
//! application answers from within the callbacks of its [`Service`].
//!
//! ## States
//!
//! The state machine is a subset of RFC 793 without `CLOSE-WAIT` and `TIME-WAIT`. A passive close
//! answers the peer's FIN with FIN+ACK right away and goes to `LastAck`, an active close walks
//! through `FinWait1`, `FinWait2` or `Closing` and ends in `Closed` as soon as the peer's FIN has
//! been acknowledged.
//!
//! ## Connection ids
//!
//! Every socket allocation draws the next value of a wrapping 8-bit counter. The id is added to
//! the top byte of the initial sequence number, so any acknowledgment of our data carries it in
//! the high byte of its offset from the random base. A segment whose acknowledgment encodes a
//! different id belongs to an earlier connection on the same four-tuple and matches no socket.
//!
//! ## Exhaustion
//!
//! When no slot is free for a new connection, the socket idle for the most ticks is evicted,
//! regardless of its state, after its service has been told with `close`.
//!
//! ## Accepting connections
//!
//! Register a [`Service`] for a port with [`Endpoint::listen`]. A SYN to that port allocates a
//! socket, and `open` is invoked when the handshake completes:
//!
//! ```
//! use core::cell::Cell;
//! use slipstack::layer::tcp::{Connection, Endpoint, Service, SocketHandle};
//!
//! /// Answers every request with a short greeting, then closes.
//! struct Hello {
//!     served: Cell<usize>,
//! }
//!
//! impl Service for Hello {
//!     fn recv(&self, conn: &mut Connection, _: &[u8]) {
//!         if conn.send_and_close(b"hello\r\n").is_ok() {
//!             self.served.set(self.served.get() + 1);
//!         }
//!     }
//! }
//!
//! let hello = Hello { served: Cell::new(0) };
//! let mut tcp = Endpoint::new(0x5eed);
//! tcp.listen(80, &hello).expect("port is free");
//! ```
//!
//! [`Service`]: trait.Service.html
//! [`Endpoint::listen`]: struct.Endpoint.html#method.listen
mod connection;
mod endpoint;


pub use connection::Connection;

pub use endpoint::{
    Endpoint,
    SocketHandle,
};

/// Number of sockets, the most connections that can be alive at once.
pub const MAX_SOCKETS: usize = 16;

/// Number of ports that can be listened on at once.
pub const MAX_LISTENERS: usize = 4;

/// The receive window advertised in every segment.
pub const WINDOW: u16 = 536;

/// The largest payload of a single segment.
///
/// Lowered further if the link MTU leaves less room after the headers.
pub const MSS: usize = 536;

/// Number of ticks a socket may be idle before it is closed.
pub const DEFAULT_IDLE_TIMEOUT: u32 = 200;

/// The first ephemeral port used for active opens.
pub const EPHEMERAL_PORTS: u16 = 49152;

/// The state of a socket.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum State {
    /// The slot is free.
    Closed,

    /// Just allocated for an incoming SYN.
    ///
    /// Only observable while the SYN itself is processed.
    Listen,

    /// Connection request we answered, waiting on the ack.
    SynReceived,

    /// An open connection request.
    SynSent,

    /// An open connection.
    Established,

    /// The peer closed and we answered with our FIN, waiting on its ack.
    LastAck,

    /// Closed our side of the connection.
    FinWait1,

    /// Closing connection nicely, initiated by us and acknowledged.
    FinWait2,

    /// Closed both sides but we don't know the other knows.
    Closing,
}

impl Default for State {
    fn default() -> Self {
        State::Closed
    }
}

/// The application side of connections.
///
/// One implementation is registered per listened port, or passed to an active open. The methods
/// are invoked synchronously while a segment is processed and may transmit through the
/// [`Connection`] before returning. All methods default to doing nothing. Keep per-connection
/// state keyed by [`SocketHandle`] behind a `Cell` or `RefCell`.
///
/// [`Connection`]: struct.Connection.html
/// [`SocketHandle`]: struct.SocketHandle.html
pub trait Service {
    /// The handshake completed.
    fn open(&self, _conn: &mut Connection) { }

    /// In-sequence data arrived.
    fn recv(&self, _conn: &mut Connection, _data: &[u8]) { }

    /// The peer can take more data, `window` being its advertised receive window.
    ///
    /// Invoked after data was received and on every acknowledgment without data.
    fn send(&self, _conn: &mut Connection, _window: u16) { }

    /// The connection is going away.
    ///
    /// Invoked exactly once per connection, on an orderly close by either side as well as on a
    /// reset, an idle timeout or an eviction. The handle is no longer usable for sending.
    fn close(&self, _handle: SocketHandle) { }
}
