//! Contains the socket table and the dispatch of segments.
//!
//! Relevant material for reading:
//! Main TCP rfc: https://tools.ietf.org/html/rfc793
//! Reset generation, section 3.4 of the same.
use core::fmt;

use rand::{RngCore, SeedableRng};
use rand::rngs::SmallRng;

use crate::layer::{ip, Error, Result};
use crate::wire::{Checksum, Ipv4Address, Ipv4Repr, TcpFlags, TcpRepr, TcpSeqNumber, tcp_packet};

use super::connection::{self, Connection, Tcb};
use super::{Service, State};
use super::{DEFAULT_IDLE_TIMEOUT, EPHEMERAL_PORTS, MAX_LISTENERS, MAX_SOCKETS, MSS};

/// Handles TCP connection states.
pub struct Endpoint<'a> {
    sockets: [Socket<'a>; MAX_SOCKETS],
    listeners: [Option<Listener<'a>>; MAX_LISTENERS],
    /// Source of initial sequence numbers.
    rng: SmallRng,
    next_conn_id: u8,
    next_port: u16,
    idle_timeout: u32,
    mss: usize,
}

/// The index of a connection.
///
/// Useful for storing in other structs to reference the connection at another point in time. The
/// connection id makes sure a handle is invalidated when its socket is reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SocketHandle {
    index: u8,
    conn_id: u8,
}

#[derive(Clone, Copy)]
struct Socket<'a> {
    tcb: Tcb,
    service: Option<&'a dyn Service>,
}

#[derive(Clone, Copy)]
struct Listener<'a> {
    port: u16,
    service: &'a dyn Service,
}

impl SocketHandle {
    /// The slot in the socket table.
    pub fn index(self) -> usize {
        self.index.into()
    }

    /// The connection id assigned when the socket was allocated.
    pub fn conn_id(self) -> u8 {
        self.conn_id
    }
}

impl fmt::Display for SocketHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "socket {}#{}", self.index, self.conn_id)
    }
}

impl<'a> Socket<'a> {
    fn handle(&self, index: usize) -> SocketHandle {
        SocketHandle {
            index: index as u8,
            conn_id: self.tcb.conn_id,
        }
    }

    /// Free the slot, telling the service if it was not told yet.
    fn release(&mut self, index: usize) {
        self.tcb.state = State::Closed;
        if !self.tcb.notified {
            self.tcb.notified = true;
            if let Some(service) = self.service {
                service.close(self.handle(index));
            }
        }
    }
}

impl<'a> Endpoint<'a> {
    /// Create an endpoint without listeners.
    ///
    /// The seed initializes the generator of initial sequence numbers.
    pub fn new(seed: u64) -> Self {
        Endpoint {
            sockets: [Socket { tcb: Tcb::default(), service: None }; MAX_SOCKETS],
            listeners: [None; MAX_LISTENERS],
            rng: SmallRng::seed_from_u64(seed),
            next_conn_id: 0,
            next_port: EPHEMERAL_PORTS,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            mss: MSS,
        }
    }

    /// Number of ticks after which an idle socket is closed.
    pub fn idle_timeout(&self) -> u32 {
        self.idle_timeout
    }

    /// Change the number of ticks after which an idle socket is closed.
    pub fn set_idle_timeout(&mut self, ticks: u32) {
        self.idle_timeout = ticks;
    }

    /// The largest payload of a segment.
    pub fn mss(&self) -> usize {
        self.mss
    }

    /// Lower the largest payload of a segment, e.g. to fit a small link MTU.
    ///
    /// Values above [`MSS`] are capped.
    ///
    /// [`MSS`]: constant.MSS.html
    pub fn set_mss(&mut self, mss: usize) {
        self.mss = mss.min(MSS);
    }

    /// Accept connections on a port.
    ///
    /// Returns `Err(Error::Illegal)` for port zero or a port that is already listened on and
    /// `Err(Error::Exhausted)` if all listener slots are taken.
    pub fn listen(&mut self, port: u16, service: &'a dyn Service) -> Result<()> {
        if port == 0 || self.is_listening(port) {
            return Err(Error::Illegal);
        }

        let slot = self.listeners.iter_mut()
            .find(|slot| slot.is_none())
            .ok_or(Error::Exhausted)?;
        *slot = Some(Listener { port, service });
        net_debug!("tcp: listening on port {}", port);
        Ok(())
    }

    /// Stop accepting connections on a port.
    ///
    /// Connections accepted before keep running.
    pub fn unlisten(&mut self, port: u16) -> Result<()> {
        let mut found = false;
        for slot in self.listeners.iter_mut() {
            if slot.map(|listener| listener.port) == Some(port) {
                *slot = None;
                found = true;
            }
        }

        if found {
            Ok(())
        } else {
            Err(Error::Illegal)
        }
    }

    /// Whether a listener for the port is registered.
    pub fn is_listening(&self, port: u16) -> bool {
        self.listener(port).is_some()
    }

    /// Actively open a connection.
    ///
    /// Sends the SYN from an ephemeral port, `open` of the service is invoked once the peer
    /// answers. A socket is always found, by eviction if necessary.
    pub fn connect(
        &mut self,
        remote_addr: Ipv4Address,
        remote_port: u16,
        service: &'a dyn Service,
        mut ip: ip::Handle,
    ) -> Result<SocketHandle> {
        if remote_port == 0 || remote_addr.is_unspecified() || remote_addr.is_broadcast() {
            return Err(Error::Illegal);
        }

        let index = self.allocate();
        let local_port = self.ephemeral_port();
        let handle = self.create(index, ip.local_addr(), local_port, remote_addr, remote_port, service);
        net_debug!("tcp: {} connecting to {}:{}", handle, remote_addr, remote_port);

        let mss = self.mss;
        let socket = &mut self.sockets[index];
        let result = Connection::new(&mut socket.tcb, handle, service, ip.borrow_mut(), mss)
            .connect();

        if let Err(err) = result {
            // Nothing went out, free the slot without a close.
            socket.tcb.state = State::Closed;
            socket.tcb.notified = true;
            return Err(err);
        }

        Ok(handle)
    }

    /// Send one segment of data on a connection.
    ///
    /// See [`Connection::send`].
    ///
    /// [`Connection::send`]: struct.Connection.html#method.send
    pub fn send(&mut self, handle: SocketHandle, data: &[u8], mut ip: ip::Handle) -> Result<()> {
        self.connection(handle, ip.borrow_mut())?.send(data)
    }

    /// Close our side of a connection.
    ///
    /// See [`Connection::close`].
    ///
    /// [`Connection::close`]: struct.Connection.html#method.close
    pub fn close(&mut self, handle: SocketHandle, mut ip: ip::Handle) -> Result<()> {
        self.connection(handle, ip.borrow_mut())?.close()
    }

    /// Reset a connection.
    pub fn abort(&mut self, handle: SocketHandle, mut ip: ip::Handle) -> Result<()> {
        self.connection(handle, ip.borrow_mut())?.abort();
        Ok(())
    }

    /// The state of a connection, `None` if the handle is stale.
    pub fn state(&self, handle: SocketHandle) -> Option<State> {
        self.find(handle).map(|index| self.sockets[index].tcb.state)
    }

    /// Handles of all live connections.
    pub fn handles<'s>(&'s self) -> impl Iterator<Item=SocketHandle> + 's {
        self.sockets.iter()
            .enumerate()
            .filter(|(_, socket)| socket.tcb.state != State::Closed)
            .map(|(index, socket)| socket.handle(index))
    }

    /// Process a segment handed up by the ip layer.
    ///
    /// Never fails: segments that are invalid or do not fit any socket are dropped or answered
    /// with a reset.
    pub fn receive(&mut self, packet: ip::In) {
        let ip::In { mut handle, repr: ip_repr, packet } = packet;

        let segment = tcp_packet::new_unchecked(packet.payload_slice());
        let repr = match TcpRepr::parse(segment, ip_repr.src_addr, ip_repr.dst_addr, Checksum::Manual) {
            Ok(repr) => repr,
            Err(err) => {
                net_debug!("tcp: dropping segment from {}: {}", ip_repr.src_addr, err);
                return;
            },
        };
        net_trace!("tcp: received {}", repr);

        let payload = segment.payload_slice();
        match self.lookup(ip_repr.src_addr, &repr) {
            Some(index) => self.arrives(index, &repr, payload, handle.borrow_mut()),
            None => self.arrives_unmatched(ip_repr, &repr, payload, handle.borrow_mut()),
        }
    }

    /// Age all sockets by one processing cycle.
    ///
    /// Sockets idle for longer than the timeout are closed without notifying the peer.
    pub fn tick(&mut self) {
        let idle_timeout = self.idle_timeout;
        for (index, socket) in self.sockets.iter_mut().enumerate() {
            if socket.tcb.state == State::Closed {
                continue;
            }

            socket.tcb.ticks = socket.tcb.ticks.saturating_add(1);
            if socket.tcb.ticks > idle_timeout {
                net_debug!("tcp: {} idle for {} ticks, closing",
                    socket.handle(index), socket.tcb.ticks);
                socket.release(index);
            }
        }
    }

    fn arrives(&mut self, index: usize, segment: &TcpRepr, payload: &[u8], mut ip: ip::Handle) {
        let mss = self.mss;
        let socket = &mut self.sockets[index];
        let service = match socket.service {
            Some(service) => service,
            None => return,
        };
        let handle = socket.handle(index);
        Connection::new(&mut socket.tcb, handle, service, ip.borrow_mut(), mss)
            .arrives(segment, payload);
    }

    fn arrives_unmatched(
        &mut self,
        ip_repr: Ipv4Repr,
        segment: &TcpRepr,
        payload: &[u8],
        mut ip: ip::Handle,
    ) {
        if segment.flags.rst() {
            net_trace!("tcp: dropping unmatched reset");
            return;
        }

        if segment.flags.syn() && segment.ack_number.is_none() {
            if let Some(service) = self.listener(segment.dst_port) {
                let index = self.allocate();
                let handle = self.create(index,
                    ip_repr.dst_addr, segment.dst_port,
                    ip_repr.src_addr, segment.src_port,
                    service);
                net_debug!("tcp: {} accepting {}:{} on port {}",
                    handle, ip_repr.src_addr, segment.src_port, segment.dst_port);
                return self.arrives(index, segment, payload, ip);
            }
        }

        net_debug!("tcp: no socket for {} from {}, resetting", segment, ip_repr.src_addr);
        if let Err(err) = reset(&mut ip, ip_repr.src_addr, segment) {
            net_debug!("tcp: failed to send reset: {}", err);
        }
    }

    fn lookup(&self, remote_addr: Ipv4Address, segment: &TcpRepr) -> Option<usize> {
        self.sockets.iter().position(|socket| {
            let tcb = &socket.tcb;
            tcb.state != State::Closed
                && tcb.local_port == segment.dst_port
                && tcb.remote_addr == remote_addr
                && tcb.remote_port == segment.src_port
                && tcb.accepts_id(segment)
        })
    }

    fn listener(&self, port: u16) -> Option<&'a dyn Service> {
        self.listeners.iter()
            .filter_map(|slot| *slot)
            .find(|listener| listener.port == port)
            .map(|listener| listener.service)
    }

    fn find(&self, handle: SocketHandle) -> Option<usize> {
        let index = handle.index();
        let socket = self.sockets.get(index)?;
        if socket.tcb.state == State::Closed || socket.tcb.conn_id != handle.conn_id {
            return None;
        }
        Some(index)
    }

    fn connection<'c>(&'c mut self, handle: SocketHandle, ip: ip::Handle<'c>)
        -> Result<Connection<'c>>
    {
        let index = self.find(handle).ok_or(Error::Unreachable)?;
        let mss = self.mss;
        let socket = &mut self.sockets[index];
        let service = socket.service.ok_or(Error::Unreachable)?;
        Ok(Connection::new(&mut socket.tcb, handle, service, ip, mss))
    }

    /// Find a free slot, evicting the longest idle socket if there is none.
    fn allocate(&mut self) -> usize {
        if let Some(index) = self.sockets.iter().position(|socket| socket.tcb.state == State::Closed) {
            return index;
        }

        // On equal ticks the lowest index goes.
        let victim = (0..MAX_SOCKETS).rev()
            .max_by_key(|&index| self.sockets[index].tcb.ticks)
            .unwrap_or(0);
        let socket = &mut self.sockets[victim];
        net_debug!("tcp: evicting {} idle for {} ticks", socket.handle(victim), socket.tcb.ticks);
        socket.release(victim);
        victim
    }

    /// Initialize a slot for a new connection, in state `Listen`.
    fn create(
        &mut self,
        index: usize,
        local_addr: Ipv4Address,
        local_port: u16,
        remote_addr: Ipv4Address,
        remote_port: u16,
        service: &'a dyn Service,
    ) -> SocketHandle {
        let conn_id = self.next_conn_id;
        self.next_conn_id = conn_id.wrapping_add(1);

        let isn = self.rng.next_u32();
        let local_seq = isn.wrapping_add(u32::from(conn_id) << 24);

        let socket = &mut self.sockets[index];
        *socket = Socket {
            tcb: Tcb {
                local_addr,
                local_port,
                remote_addr,
                remote_port,
                state: State::Listen,
                conn_id,
                local_isn: TcpSeqNumber::from_u32(isn),
                local_seq: TcpSeqNumber::from_u32(local_seq),
                remote_seq: TcpSeqNumber::default(),
                ticks: 0,
                notified: false,
            },
            service: Some(service),
        };
        socket.handle(index)
    }

    fn ephemeral_port(&mut self) -> u16 {
        loop {
            let port = self.next_port;
            self.next_port = port.checked_add(1).unwrap_or(EPHEMERAL_PORTS);

            let in_use = self.is_listening(port) || self.sockets.iter()
                .any(|socket| socket.tcb.state != State::Closed && socket.tcb.local_port == port);
            if !in_use {
                return port;
            }
        }
    }
}

/// Answer a segment that has no socket.
fn reset(ip: &mut ip::Handle, dst_addr: Ipv4Address, segment: &TcpRepr) -> Result<()> {
    let repr = TcpRepr {
        src_port: segment.dst_port,
        dst_port: segment.src_port,
        flags: TcpFlags::RST | TcpFlags::ACK,
        seq_number: segment.ack_number.unwrap_or_default(),
        ack_number: Some(segment.seq_number + segment.sequence_len()),
        window_len: 0,
        payload_len: 0,
    };
    connection::transmit(ip, dst_addr, repr, &[])
}
