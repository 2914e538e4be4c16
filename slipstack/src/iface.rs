//! Ties the serial device, the framer and all protocol layers together.
//!
//! An [`Interface`] owns every piece of state of the stack. The user program registers its
//! services and then calls [`poll`] repeatedly, for example from its main loop or whenever the
//! serial line signals readable data:
//!
//! ```
//! use slipstack::{Config, Interface};
//! use slipstack::layer::tcp::{Connection, Service};
//! use slipstack::nic::external::External;
//!
//! struct Echo;
//!
//! impl Service for Echo {
//!     fn recv(&self, conn: &mut Connection, data: &[u8]) {
//!         let _ = conn.send(data);
//!     }
//! }
//!
//! let echo = Echo;
//! let mut iface = Interface::new(External::new(), Config::default()).unwrap();
//! iface.listen(7, &echo).unwrap();
//! iface.poll();
//! ```
//!
//! [`Interface`]: struct.Interface.html
//! [`poll`]: struct.Interface.html#method.poll
use crate::layer::{icmp, ip, slip, tcp, udp, Error, Result};
use crate::nic::Device;
use crate::wire::{Ipv4Address, IPV4_HEADER_LEN, TCP_HEADER_LEN};

/// The smallest MTU every IPv4 host must support, RFC 791.
pub const MIN_MTU: usize = 68;

/// The configuration of an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Config {
    /// Our own address on the serial line.
    pub address: Ipv4Address,

    /// Largest datagram sent or accepted, between `MIN_MTU` and `slip::MAX_MTU`.
    pub mtu: usize,

    /// Number of processing cycles after which an idle connection is dropped.
    pub idle_timeout: u32,

    /// Seed of the initial sequence numbers.
    ///
    /// Should differ between restarts of the same host, otherwise a peer may see sequence numbers
    /// of an older incarnation.
    pub seed: u64,
}

/// A SLIP interface with its IPv4, TCP, UDP and ICMP state.
pub struct Interface<'a, D> {
    device: D,
    decoder: slip::Decoder,
    stack: Stack<'a>,
}

/// Everything but the receiving side of the line.
struct Stack<'a> {
    ip: ip::Endpoint,
    tcp: tcp::Endpoint<'a>,
    udp: udp::Endpoint<'a>,
    icmp: icmp::Endpoint,
    /// Datagrams are constructed here.
    tx: [u8; slip::MAX_MTU],
    /// Frames are encoded here.
    scratch: [u8; slip::MAX_ENCODED_LEN],
}

/// The upper layers, borrowed for one datagram.
struct Layers<'s, 'a> {
    tcp: &'s mut tcp::Endpoint<'a>,
    udp: &'s udp::Endpoint<'a>,
    icmp: &'s mut icmp::Endpoint,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            address: Ipv4Address::new(192, 168, 1, 51),
            mtu: 576,
            idle_timeout: tcp::DEFAULT_IDLE_TIMEOUT,
            seed: 0x5eed_cafe_f00d_d00d,
        }
    }
}

impl<'a, D: Device> Interface<'a, D> {
    /// Create an interface on a serial device.
    ///
    /// Returns `Err(Error::BadSize)` if the MTU of the configuration is out of range.
    pub fn new(device: D, config: Config) -> Result<Self> {
        if config.mtu < MIN_MTU || config.mtu > slip::MAX_MTU {
            return Err(Error::BadSize);
        }

        let mut tcp = tcp::Endpoint::new(config.seed);
        tcp.set_idle_timeout(config.idle_timeout);
        tcp.set_mss(config.mtu - IPV4_HEADER_LEN - TCP_HEADER_LEN);

        Ok(Interface {
            device,
            decoder: slip::Decoder::new(config.mtu),
            stack: Stack {
                ip: ip::Endpoint::new(config.address, config.mtu),
                tcp,
                udp: udp::Endpoint::new(),
                icmp: icmp::Endpoint::new(),
                tx: [0; slip::MAX_MTU],
                scratch: [0; slip::MAX_ENCODED_LEN],
            },
        })
    }

    /// Process all pending input, then age the connections by one tick.
    ///
    /// Returns the number of complete frames that were handed to the ip layer.
    pub fn poll(&mut self) -> usize {
        let mut frames = 0;

        while let Some(byte) = self.device.recv() {
            match self.decoder.process_byte(byte) {
                slip::Status::Ok | slip::Status::Skip => continue,
                slip::Status::Done => {
                    self.stack.receive(&mut self.device, self.decoder.frame());
                    frames += 1;
                },
                slip::Status::Reset => {
                    net_debug!("slip: frame exceeds {} bytes, discarding", self.decoder.capacity());
                },
            }
            self.decoder.reset();
        }

        self.stack.tcp.tick();
        frames
    }

    /// Process one datagram that was framed elsewhere.
    pub fn receive_frame(&mut self, frame: &[u8]) {
        self.stack.receive(&mut self.device, frame)
    }

    /// Age the connections without looking at input.
    pub fn tick(&mut self) {
        self.stack.tcp.tick()
    }

    /// Our own address.
    pub fn local_addr(&self) -> Ipv4Address {
        self.stack.ip.local_addr()
    }

    /// Accept TCP connections on a port.
    pub fn listen(&mut self, port: u16, service: &'a dyn tcp::Service) -> Result<()> {
        self.stack.tcp.listen(port, service)
    }

    /// Stop accepting TCP connections on a port.
    pub fn unlisten(&mut self, port: u16) -> Result<()> {
        self.stack.tcp.unlisten(port)
    }

    /// Open a TCP connection to a peer.
    pub fn connect(
        &mut self,
        remote_addr: Ipv4Address,
        remote_port: u16,
        service: &'a dyn tcp::Service,
    ) -> Result<tcp::SocketHandle> {
        self.stack.with(&mut self.device, |layers, ip| {
            layers.tcp.connect(remote_addr, remote_port, service, ip)
        })
    }

    /// Send one segment of data on a connection.
    pub fn send(&mut self, handle: tcp::SocketHandle, data: &[u8]) -> Result<()> {
        self.stack.with(&mut self.device, |layers, ip| layers.tcp.send(handle, data, ip))
    }

    /// Close our side of a connection.
    pub fn close(&mut self, handle: tcp::SocketHandle) -> Result<()> {
        self.stack.with(&mut self.device, |layers, ip| layers.tcp.close(handle, ip))
    }

    /// Reset a connection.
    pub fn abort(&mut self, handle: tcp::SocketHandle) -> Result<()> {
        self.stack.with(&mut self.device, |layers, ip| layers.tcp.abort(handle, ip))
    }

    /// The state of a connection, `None` once it is gone.
    pub fn state(&self, handle: tcp::SocketHandle) -> Option<tcp::State> {
        self.stack.tcp.state(handle)
    }

    /// The TCP endpoint, e.g. to enumerate connections.
    pub fn tcp(&self) -> &tcp::Endpoint<'a> {
        &self.stack.tcp
    }

    /// Deliver UDP datagrams for a port.
    pub fn bind(&mut self, port: u16, recv: &'a dyn udp::Recv) -> Result<()> {
        self.stack.udp.bind(port, recv)
    }

    /// Remove a UDP port binding.
    pub fn unbind(&mut self, port: u16) -> Result<()> {
        self.stack.udp.unbind(port)
    }

    /// Send a single UDP datagram.
    pub fn send_to(
        &mut self,
        src_port: u16,
        dst_addr: Ipv4Address,
        dst_port: u16,
        data: &[u8],
    ) -> Result<()> {
        self.stack.with(&mut self.device, |_, ip| {
            udp::send_to(ip, src_port, dst_addr, dst_port, data)
        })
    }

    /// Send an ICMP echo request.
    pub fn ping(&mut self, dst_addr: Ipv4Address, ident: u16, seq_no: u16, data: &[u8])
        -> Result<()>
    {
        self.stack.with(&mut self.device, |layers, ip| {
            layers.icmp.ping(ip, dst_addr, ident, seq_no, data)
        })
    }

    /// Take the last echo reply received.
    pub fn take_echo_reply(&mut self) -> Option<icmp::Reply> {
        self.stack.icmp.take_reply()
    }

    /// The serial device.
    pub fn device(&self) -> &D {
        &self.device
    }

    /// The serial device, mutably.
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }
}

impl<'a> Stack<'a> {
    fn receive<D: Device>(&mut self, device: &mut D, frame: &[u8]) {
        let Stack { ip, tcp, udp, icmp, tx, scratch } = self;
        let mut link = slip::Encoder::new(device, &mut scratch[..]);
        let mut layers = Layers { tcp, udp, icmp };
        ip.receive(frame, &mut link, &mut tx[..], &mut layers);
    }

    fn with<D: Device, R>(
        &mut self,
        device: &mut D,
        op: impl FnOnce(Layers<'_, 'a>, ip::Handle) -> R,
    ) -> R {
        let Stack { ip, tcp, udp, icmp, tx, scratch } = self;
        let mut link = slip::Encoder::new(device, &mut scratch[..]);
        let handle = ip::Handle::new(ip, &mut link, &mut tx[..]);
        op(Layers { tcp, udp, icmp }, handle)
    }
}

impl ip::Recv for Layers<'_, '_> {
    fn icmp(&mut self, packet: ip::In) {
        self.icmp.receive(packet)
    }

    fn tcp(&mut self, packet: ip::In) {
        self.tcp.receive(packet)
    }

    fn udp(&mut self, packet: ip::In) {
        self.udp.receive(packet)
    }
}

#[cfg(test)]
mod test {
    use core::cell::RefCell;

    use super::*;
    use crate::layer::FnHandler;
    use crate::nic::external::External;
    use crate::wire::{Checksum, Icmpv4Repr, IpProtocol, Ipv4Repr, TcpFlags, TcpRepr, TcpSeqNumber};
    use crate::wire::{icmpv4_packet, ipv4_packet, tcp_packet, UdpRepr, udp_packet};

    const IP_PEER: Ipv4Address = Ipv4Address::new(192, 168, 1, 1);

    /// Collects everything a connection receives and answers each chunk.
    #[derive(Default)]
    struct Shout {
        received: RefCell<Vec<u8>>,
    }

    impl tcp::Service for Shout {
        fn recv(&self, conn: &mut tcp::Connection, data: &[u8]) {
            self.received.borrow_mut().extend_from_slice(data);
            conn.send(&data.to_ascii_uppercase()).unwrap();
        }
    }

    fn datagram(protocol: IpProtocol, payload: &[u8]) -> Vec<u8> {
        let repr = Ipv4Repr {
            src_addr: IP_PEER,
            dst_addr: Config::default().address,
            protocol,
            ident: 0,
            payload_len: payload.len(),
            hop_limit: 64,
        };
        let mut bytes = vec![0; repr.buffer_len() + payload.len()];
        let packet = ipv4_packet::new_unchecked_mut(&mut bytes);
        repr.emit(packet, Checksum::Manual);
        packet.payload_mut_slice().copy_from_slice(payload);
        bytes
    }

    fn segment(flags: TcpFlags, seq: i32, ack_number: Option<TcpSeqNumber>, payload: &[u8]) -> Vec<u8> {
        let repr = TcpRepr {
            src_port: 40000,
            dst_port: 7,
            flags,
            seq_number: TcpSeqNumber(seq),
            ack_number,
            window_len: 1024,
            payload_len: payload.len(),
        };
        let mut bytes = vec![0; repr.buffer_len()];
        let tcp = tcp_packet::new_unchecked_mut(&mut bytes);
        repr.emit(tcp);
        tcp.payload_mut_slice().copy_from_slice(payload);
        tcp.fill_checksum(IP_PEER, Config::default().address);
        datagram(IpProtocol::Tcp, &bytes)
    }

    fn tcp_answers(iface: &mut Interface<External>) -> Vec<(TcpRepr, Vec<u8>)> {
        iface.device_mut().take_datagrams().iter().map(|bytes| {
            let packet = ipv4_packet::new_checked(bytes).unwrap();
            let ip_repr = Ipv4Repr::parse(packet, Checksum::Manual).unwrap();
            let tcp = tcp_packet::new_checked(packet.payload_slice()).unwrap();
            let repr = TcpRepr::parse(tcp, ip_repr.src_addr, ip_repr.dst_addr, Checksum::Manual)
                .unwrap();
            (repr, tcp.payload_slice().to_vec())
        }).collect()
    }

    #[test]
    fn config_mtu_checked() {
        for &mtu in [0, MIN_MTU - 1, slip::MAX_MTU + 1].iter() {
            let config = Config { mtu, ..Config::default() };
            assert!(Interface::new(External::new(), config).is_err());
        }
        let config = Config { mtu: MIN_MTU, ..Config::default() };
        assert!(Interface::new(External::new(), config).is_ok());
    }

    #[test]
    fn tcp_over_serial() {
        let shout = Shout::default();
        let mut iface = Interface::new(External::new(), Config::default()).unwrap();
        iface.listen(7, &shout).unwrap();

        iface.device_mut().push_datagram(&segment(TcpFlags::SYN, 100, None, &[]));
        assert_eq!(iface.poll(), 1);
        let answers = tcp_answers(&mut iface);
        assert_eq!(answers.len(), 1);
        let local_seq = answers[0].0.seq_number + 1;

        iface.device_mut().push_datagram(&segment(TcpFlags::ACK, 101, Some(local_seq), &[]));
        iface.device_mut().push_datagram(&segment(TcpFlags::ACK, 101, Some(local_seq), b"hey"));
        assert_eq!(iface.poll(), 2);

        let answers = tcp_answers(&mut iface);
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].1, b"HEY");
        assert_eq!(answers[0].0.ack_number, Some(TcpSeqNumber(104)));
        assert_eq!(&*shout.received.borrow(), b"hey");

        let handle = iface.tcp().handles().next().unwrap();
        iface.send(handle, b"more").unwrap();
        assert_eq!(tcp_answers(&mut iface)[0].1, b"more");

        // Larger than the segment size of a 576 byte MTU.
        assert_eq!(iface.send(handle, &[0; 537]), Err(Error::BadSize));
    }

    #[test]
    fn idle_connection_aged_by_poll() {
        let shout = Shout::default();
        let config = Config { idle_timeout: 2, ..Config::default() };
        let mut iface = Interface::new(External::new(), config).unwrap();
        iface.listen(7, &shout).unwrap();

        iface.device_mut().push_datagram(&segment(TcpFlags::SYN, 100, None, &[]));
        iface.poll();
        let handle = iface.tcp().handles().next().unwrap();

        iface.poll();
        assert_eq!(iface.state(handle), Some(tcp::State::SynReceived));
        iface.poll();
        assert_eq!(iface.state(handle), None);
    }

    #[test]
    fn oversize_frame_recovers() {
        let config = Config { mtu: 100, ..Config::default() };
        let mut iface = Interface::new(External::new(), config).unwrap();

        let request = Icmpv4Repr::EchoRequest { ident: 1, seq_no: 2, payload: 4 };
        let mut icmp = vec![0; request.buffer_len()];
        let message = icmpv4_packet::new_unchecked_mut(&mut icmp);
        message.payload_mut_slice().copy_from_slice(b"ping");
        request.emit(message, Checksum::Manual);

        iface.device_mut().push_bytes(&[0x55; 150]);
        iface.device_mut().push_datagram(&datagram(IpProtocol::Icmp, &icmp));
        // The tail of the garbage ends at the leading delimiter of the ping.
        assert_eq!(iface.poll(), 2);

        let answers = iface.device_mut().take_datagrams();
        assert_eq!(answers.len(), 1);
        let packet = ipv4_packet::new_checked(&answers[0]).unwrap();
        let reply = icmpv4_packet::new_checked(packet.payload_slice()).unwrap();
        assert_eq!(Icmpv4Repr::parse(reply, Checksum::Manual),
            Ok(Icmpv4Repr::EchoReply { ident: 1, seq_no: 2, payload: 4 }));
    }

    #[test]
    fn udp_binding() {
        let seen = RefCell::new(Vec::new());
        let record = FnHandler(|packet: udp::Packet| {
            seen.borrow_mut().push(packet.payload.to_vec());
        });
        let mut iface = Interface::new(External::new(), Config::default()).unwrap();
        iface.bind(9, &record).unwrap();

        let repr = UdpRepr { src_port: 1000, dst_port: 9, payload_len: 3 };
        let mut udp = vec![0; repr.buffer_len()];
        let datagram_udp = udp_packet::new_unchecked_mut(&mut udp);
        repr.emit(datagram_udp);
        datagram_udp.payload_mut_slice().copy_from_slice(b"abc");
        datagram_udp.fill_checksum(IP_PEER, iface.local_addr());

        iface.receive_frame(&datagram(IpProtocol::Udp, &udp));
        assert_eq!(&*seen.borrow(), &[b"abc".to_vec()]);

        iface.send_to(9, IP_PEER, 1000, b"xyz").unwrap();
        assert_eq!(iface.device_mut().take_datagrams().len(), 1);
    }

    #[test]
    fn broken_device_reported() {
        let shout = Shout::default();
        let mut iface = Interface::new(External::new(), Config::default()).unwrap();
        iface.device_mut().set_broken(true);
        assert_eq!(iface.connect(IP_PEER, 7, &shout), Err(Error::Device));
        assert_eq!(iface.tcp().handles().count(), 0);
        assert_eq!(iface.ping(IP_PEER, 1, 1, b"x"), Err(Error::Device));
    }
}
