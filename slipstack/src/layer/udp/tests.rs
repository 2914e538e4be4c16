use core::cell::RefCell;

use super::*;
use crate::layer::{ip, Error, FnHandler};
use crate::wire::{Checksum, IpProtocol, Ipv4Address, Ipv4Repr, UdpRepr, ipv4_packet, udp_packet};

const IP_HOST: Ipv4Address = Ipv4Address::new(192, 168, 1, 51);
const IP_PEER: Ipv4Address = Ipv4Address::new(192, 168, 1, 1);

static PAYLOAD_BYTES: [u8; 6] = [0xaa, 0x00, 0xc0, 0xdb, 0x00, 0xff];

#[derive(Default)]
struct Capture {
    sent: Vec<Vec<u8>>,
}

impl ip::Link for Capture {
    fn transmit(&mut self, datagram: &[u8]) -> crate::layer::Result<()> {
        self.sent.push(datagram.to_vec());
        Ok(())
    }
}

struct Upper<'u, 'a>(&'u Endpoint<'a>);

impl ip::Recv for Upper<'_, '_> {
    fn udp(&mut self, packet: ip::In) {
        self.0.receive(packet)
    }
}

/// Remembers the sender and data of every datagram.
#[derive(Default)]
struct Record {
    received: RefCell<Vec<(Ipv4Address, u16, Vec<u8>)>>,
}

impl Recv for Record {
    fn receive(&self, packet: Packet) {
        self.received.borrow_mut()
            .push((packet.src_addr, packet.repr.src_port, packet.payload.to_vec()));
    }
}

fn datagram(dst_port: u16, payload: &[u8]) -> Vec<u8> {
    let repr = UdpRepr {
        src_port: 5353,
        dst_port,
        payload_len: payload.len(),
    };
    let ip_repr = Ipv4Repr {
        src_addr: IP_PEER,
        dst_addr: IP_HOST,
        protocol: IpProtocol::Udp,
        ident: 0,
        payload_len: repr.buffer_len(),
        hop_limit: 64,
    };

    let mut bytes = vec![0; ip_repr.buffer_len() + repr.buffer_len()];
    let packet = ipv4_packet::new_unchecked_mut(&mut bytes);
    ip_repr.emit(packet, Checksum::Manual);
    let udp = udp_packet::new_unchecked_mut(packet.payload_mut_slice());
    repr.emit(udp);
    udp.payload_mut_slice().copy_from_slice(payload);
    udp.fill_checksum(IP_PEER, IP_HOST);
    bytes
}

fn receive(udp: &Endpoint, frame: &[u8]) -> Vec<Vec<u8>> {
    let mut ip = ip::Endpoint::new(IP_HOST, 576);
    let mut link = Capture::default();
    let mut buffer = [0; 576];
    ip.receive(frame, &mut link, &mut buffer[..], &mut Upper(udp));
    link.sent
}

#[test]
fn deliver_to_binding() {
    let record = Record::default();
    let other = Record::default();
    let mut udp = Endpoint::new();
    udp.bind(53, &record).unwrap();
    udp.bind(54, &other).unwrap();

    receive(&udp, &datagram(53, &PAYLOAD_BYTES));
    assert_eq!(&*record.received.borrow(), &[(IP_PEER, 5353, PAYLOAD_BYTES.to_vec())]);
    assert!(other.received.borrow().is_empty());

    // Nobody listens here.
    receive(&udp, &datagram(55, &PAYLOAD_BYTES));
    assert_eq!(record.received.borrow().len(), 1);
}

#[test]
fn drop_bad_checksum() {
    let record = Record::default();
    let mut udp = Endpoint::new();
    udp.bind(53, &record).unwrap();

    let mut bytes = datagram(53, &PAYLOAD_BYTES);
    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;
    receive(&udp, &bytes);
    assert!(record.received.borrow().is_empty());

    // A zero checksum means none was computed.
    bytes[26] = 0;
    bytes[27] = 0;
    receive(&udp, &bytes);
    assert_eq!(record.received.borrow().len(), 1);
}

#[test]
fn drop_bad_length() {
    let record = Record::default();
    let mut udp = Endpoint::new();
    udp.bind(53, &record).unwrap();

    let mut bytes = datagram(53, &PAYLOAD_BYTES);
    // Longer than the datagram.
    bytes[25] = 20;
    receive(&udp, &bytes);
    // Shorter than the header.
    bytes[25] = 4;
    receive(&udp, &bytes);
    assert!(record.received.borrow().is_empty());
}

#[test]
fn reply_from_handler() {
    let echo = FnHandler(|mut packet: Packet| {
        let payload = packet.payload;
        packet.reply(payload).unwrap();
    });
    let mut udp = Endpoint::new();
    udp.bind(7, &echo).unwrap();

    let sent = receive(&udp, &datagram(7, &PAYLOAD_BYTES));
    assert_eq!(sent.len(), 1);

    let packet = ipv4_packet::new_checked(&sent[0]).unwrap();
    let ip_repr = Ipv4Repr::parse(packet, Checksum::Manual).unwrap();
    assert_eq!(ip_repr.src_addr, IP_HOST);
    assert_eq!(ip_repr.dst_addr, IP_PEER);
    assert_eq!(ip_repr.protocol, IpProtocol::Udp);

    let udp = udp_packet::new_checked(packet.payload_slice()).unwrap();
    let repr = UdpRepr::parse(udp, IP_HOST, IP_PEER, Checksum::Manual).unwrap();
    assert_eq!(repr, UdpRepr {
        src_port: 7,
        dst_port: 5353,
        payload_len: PAYLOAD_BYTES.len(),
    });
    assert_eq!(udp.payload_slice(), &PAYLOAD_BYTES[..]);
}

#[test]
fn send_to_checks() {
    let mut ip = ip::Endpoint::new(IP_HOST, 68);
    let mut link = Capture::default();
    let mut buffer = [0; 576];
    let mut handle = ip::Handle::new(&mut ip, &mut link, &mut buffer[..]);

    assert_eq!(send_to(handle.borrow_mut(), 1000, IP_PEER, 0, b"x"), Err(Error::Illegal));
    assert_eq!(send_to(handle.borrow_mut(), 1000, IP_PEER, 9, &[0; 41]), Err(Error::BadSize));
    assert_eq!(send_to(handle.borrow_mut(), 1000, IP_PEER, 9, &[0; 40]), Ok(()));
    assert_eq!(link.sent.len(), 1);
}

#[test]
fn bind_errors() {
    let record = Record::default();
    let mut udp = Endpoint::new();

    assert_eq!(udp.bind(0, &record), Err(Error::Illegal));
    for port in 1..=MAX_BINDINGS as u16 {
        udp.bind(port, &record).unwrap();
    }
    assert_eq!(udp.bind(1, &record), Err(Error::Illegal));
    assert_eq!(udp.bind(100, &record), Err(Error::Exhausted));

    udp.unbind(3).unwrap();
    assert_eq!(udp.unbind(3), Err(Error::Illegal));
    assert!(!udp.is_bound(3));
    udp.bind(100, &record).unwrap();
}
