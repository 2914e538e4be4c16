use crate::layer::{ip, Error, Result};
use crate::wire::{IpProtocol, Ipv4Address, TcpFlags, TcpRepr, TcpSeqNumber, tcp_packet};

use super::{Service, SocketHandle, State, WINDOW};

/// The transmission control block of a socket.
///
/// Plain data, owned by the socket table of the endpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub(crate) struct Tcb {
    pub(crate) local_addr: Ipv4Address,
    pub(crate) local_port: u16,
    pub(crate) remote_addr: Ipv4Address,
    pub(crate) remote_port: u16,
    pub(crate) state: State,
    /// The id mixed into the initial sequence number.
    pub(crate) conn_id: u8,
    /// The random base of our sequence numbers, without the id.
    pub(crate) local_isn: TcpSeqNumber,
    /// The sequence number of the next octet we send.
    pub(crate) local_seq: TcpSeqNumber,
    /// The sequence number of the next octet we expect.
    pub(crate) remote_seq: TcpSeqNumber,
    /// Processing cycles since the last accepted segment.
    pub(crate) ticks: u32,
    /// The service was told about the close.
    pub(crate) notified: bool,
}

/// A live connection, handed to the callbacks of a [`Service`].
///
/// Allows sending on and closing the connection while a segment is being processed.
///
/// [`Service`]: trait.Service.html
pub struct Connection<'c> {
    tcb: &'c mut Tcb,
    handle: SocketHandle,
    service: &'c dyn Service,
    ip: ip::Handle<'c>,
    mss: usize,
    /// Whether a segment went out while processing.
    sent: bool,
}

impl Tcb {
    /// Check the connection id encoded in an acknowledgment.
    pub(crate) fn accepts_id(&self, segment: &TcpRepr) -> bool {
        match (self.state, segment.ack_number) {
            (State::Closed, _) | (State::Listen, _) | (_, None) => true,
            (_, Some(ack_number)) => {
                let offset = ack_number.offset_from(self.local_isn);
                (offset >> 24) as u8 == self.conn_id
            },
        }
    }
}

impl<'c> Connection<'c> {
    pub(crate) fn new(
        tcb: &'c mut Tcb,
        handle: SocketHandle,
        service: &'c dyn Service,
        ip: ip::Handle<'c>,
        mss: usize,
    ) -> Self {
        Connection {
            tcb,
            handle,
            service,
            ip,
            mss,
            sent: false,
        }
    }

    /// The handle identifying this connection.
    pub fn handle(&self) -> SocketHandle {
        self.handle
    }

    /// The current state.
    pub fn state(&self) -> State {
        self.tcb.state
    }

    /// Address of the peer.
    pub fn remote_addr(&self) -> Ipv4Address {
        self.tcb.remote_addr
    }

    /// Port of the peer.
    pub fn remote_port(&self) -> u16 {
        self.tcb.remote_port
    }

    /// Our port.
    pub fn local_port(&self) -> u16 {
        self.tcb.local_port
    }

    /// The largest payload accepted by `send`.
    pub fn mss(&self) -> usize {
        self.mss
    }

    /// Send one segment of data.
    ///
    /// Returns `Err(Error::Illegal)` unless the connection is established and
    /// `Err(Error::BadSize)` if the data does not fit into a single segment.
    pub fn send(&mut self, data: &[u8]) -> Result<()> {
        self.check_send(data)?;
        self.segment(TcpFlags::ACK | TcpFlags::PSH, data)?;
        self.tcb.local_seq += data.len();
        Ok(())
    }

    /// Send one last segment of data together with our FIN.
    ///
    /// The service is told with `close` before this returns.
    pub fn send_and_close(&mut self, data: &[u8]) -> Result<()> {
        self.check_send(data)?;
        let sent = self.segment(TcpFlags::ACK | TcpFlags::PSH | TcpFlags::FIN, data);
        self.tcb.local_seq += data.len() + 1;
        self.tcb.state = State::FinWait1;
        self.notify_close();
        sent
    }

    /// Close our side of the connection.
    ///
    /// An established connection sends its FIN, a connection still in its handshake is reset.
    /// Closing a connection that is already closing is an error.
    pub fn close(&mut self) -> Result<()> {
        match self.tcb.state {
            State::Established => {
                let sent = self.segment(TcpFlags::FIN | TcpFlags::ACK, &[]);
                self.tcb.local_seq += 1;
                self.tcb.state = State::FinWait1;
                self.notify_close();
                sent
            },
            State::SynReceived | State::SynSent => {
                self.abort();
                Ok(())
            },
            _ => Err(Error::Illegal),
        }
    }

    /// Reset the connection and free its socket.
    pub fn abort(&mut self) {
        net_debug!("tcp: {} aborting", self.handle);
        self.control(TcpFlags::RST);
        self.tcb.state = State::Closed;
        self.notify_close();
    }

    /// Send our SYN for an active open.
    pub(crate) fn connect(&mut self) -> Result<()> {
        self.tcb.state = State::SynSent;
        self.segment(TcpFlags::SYN, &[])
    }

    /// Process a segment that matched this connection.
    pub(crate) fn arrives(&mut self, segment: &TcpRepr, payload: &[u8]) {
        self.sent = false;

        if segment.flags.rst() {
            net_debug!("tcp: {} reset by peer", self.handle);
            self.tcb.state = State::Closed;
            self.notify_close();
            return;
        }

        match self.tcb.state {
            State::Listen | State::SynSent => (),
            _ if segment.seq_number < self.tcb.remote_seq => {
                net_trace!("tcp: {} dropping duplicate {}", self.handle, segment);
                return;
            },
            _ if segment.seq_number > self.tcb.remote_seq => {
                net_debug!("tcp: {} segment beyond {}", self.handle, self.tcb.remote_seq);
                self.abort();
                return;
            },
            _ => (),
        }

        self.tcb.ticks = 0;

        match self.tcb.state {
            State::Closed => (),
            State::Listen => self.arrives_listen(segment),
            State::SynReceived => self.arrives_syn_received(segment, payload),
            State::SynSent => self.arrives_syn_sent(segment),
            State::Established => self.arrives_established(segment, payload),
            State::LastAck => self.arrives_last_ack(segment),
            State::FinWait1 | State::FinWait2 | State::Closing =>
                self.arrives_closing(segment, payload),
        }
    }

    fn arrives_listen(&mut self, segment: &TcpRepr) {
        if !segment.flags.syn() || segment.ack_number.is_some() {
            return;
        }

        self.tcb.remote_seq = segment.seq_number + 1;
        self.control(TcpFlags::SYN | TcpFlags::ACK);
        self.tcb.local_seq += 1;
        self.set_state(State::SynReceived);
    }

    fn arrives_syn_received(&mut self, segment: &TcpRepr, payload: &[u8]) {
        if segment.flags.syn() || segment.ack_number.is_none() {
            return;
        }

        self.set_state(State::Established);
        let service = self.service;
        service.open(self);

        // The handshake ACK may already carry data or even the FIN.
        if !payload.is_empty() || segment.flags.fin() {
            if self.tcb.state == State::Established {
                self.arrives_established(segment, payload);
            }
        }
    }

    fn arrives_syn_sent(&mut self, segment: &TcpRepr) {
        let expected = self.tcb.local_seq + 1;
        match segment.ack_number {
            Some(ack_number) if segment.flags.syn() && ack_number == expected => (),
            _ => {
                net_trace!("tcp: {} unexpected {} in handshake", self.handle, segment);
                return;
            },
        }

        self.tcb.local_seq += 1;
        self.tcb.remote_seq = segment.seq_number + 1;
        self.control(TcpFlags::ACK);
        self.set_state(State::Established);
        let service = self.service;
        service.open(self);
    }

    fn arrives_established(&mut self, segment: &TcpRepr, payload: &[u8]) {
        let service = self.service;

        self.tcb.remote_seq += payload.len();
        if !payload.is_empty() {
            service.recv(self, payload);
        }

        if segment.flags.fin() {
            self.tcb.remote_seq += 1;
            match self.tcb.state {
                State::Established => {
                    self.control(TcpFlags::FIN | TcpFlags::ACK);
                    self.tcb.local_seq += 1;
                    self.set_state(State::LastAck);
                    self.notify_close();
                },
                // Closed by the service while receiving, our FIN is not acknowledged yet.
                State::FinWait1 => {
                    self.control(TcpFlags::ACK);
                    self.set_state(State::Closing);
                },
                _ => (),
            }
            return;
        }

        if self.tcb.state == State::Established && (segment.flags.ack() || !payload.is_empty()) {
            service.send(self, segment.window_len);
        }

        if !payload.is_empty() && !self.sent {
            self.control(TcpFlags::ACK);
        }
    }

    fn arrives_last_ack(&mut self, segment: &TcpRepr) {
        if segment.flags.ack() {
            self.set_state(State::Closed);
        }
    }

    fn arrives_closing(&mut self, segment: &TcpRepr, payload: &[u8]) {
        if !payload.is_empty() {
            net_trace!("tcp: {} discarding {} bytes after close", self.handle, payload.len());
            self.tcb.remote_seq += payload.len();
        }

        let fin = segment.flags.fin();
        if fin {
            self.tcb.remote_seq += 1;
        }

        if fin || !payload.is_empty() {
            self.control(TcpFlags::ACK);
        }

        let ack = segment.flags.ack();
        let next = match (self.tcb.state, fin, ack) {
            (State::FinWait1, true, true) => State::Closed,
            (State::FinWait1, true, false) => State::Closing,
            (State::FinWait1, false, true) => State::FinWait2,
            (State::FinWait2, true, _) => State::Closed,
            (State::Closing, _, true) => State::Closed,
            (state, _, _) => state,
        };
        self.set_state(next);
    }

    fn check_send(&self, data: &[u8]) -> Result<()> {
        if self.tcb.state != State::Established {
            return Err(Error::Illegal);
        }

        if data.len() > self.mss {
            return Err(Error::BadSize);
        }

        Ok(())
    }

    fn set_state(&mut self, state: State) {
        if self.tcb.state != state {
            net_trace!("tcp: {} {:?} -> {:?}", self.handle, self.tcb.state, state);
            self.tcb.state = state;
        }
    }

    fn notify_close(&mut self) {
        if !self.tcb.notified {
            self.tcb.notified = true;
            self.service.close(self.handle);
        }
    }

    /// Send a segment without data, failures are only logged.
    fn control(&mut self, flags: TcpFlags) {
        if let Err(err) = self.segment(flags, &[]) {
            net_debug!("tcp: {} failed to send [{}]: {}", self.handle, flags, err);
        }
    }

    fn segment(&mut self, flags: TcpFlags, payload: &[u8]) -> Result<()> {
        let tcb = &*self.tcb;
        let repr = TcpRepr {
            src_port: tcb.local_port,
            dst_port: tcb.remote_port,
            flags,
            seq_number: tcb.local_seq,
            ack_number: if flags.ack() { Some(tcb.remote_seq) } else { None },
            window_len: WINDOW,
            payload_len: payload.len(),
        };
        transmit(&mut self.ip, tcb.remote_addr, repr, payload)?;
        self.sent = true;
        Ok(())
    }
}

/// Build a segment in a fresh datagram and send it.
pub(crate) fn transmit(
    ip: &mut ip::Handle,
    dst_addr: Ipv4Address,
    repr: TcpRepr,
    payload: &[u8],
) -> Result<()> {
    let mut out = ip.prepare(ip::Init {
        dst_addr,
        protocol: IpProtocol::Tcp,
        payload: repr.buffer_len(),
    })?;
    let src_addr = out.repr().src_addr;

    let segment = tcp_packet::new_unchecked_mut(out.payload_mut_slice());
    repr.emit(segment);
    segment.payload_mut_slice().copy_from_slice(payload);
    segment.fill_checksum(src_addr, dst_addr);

    net_trace!("tcp: sending {}", repr);
    out.send()
}
