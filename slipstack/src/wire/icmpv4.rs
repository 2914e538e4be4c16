use core::fmt;
use byteorder::{ByteOrder, NetworkEndian};

use super::{Checksum, Error, Result};
use super::checksum;

/// Length of the echo message header.
pub const HEADER_LEN: usize = field::ECHO_SEQNO.end;

enum_with_unknown! {
    /// Internet protocol control message type.
    pub enum Message(u8) {
        /// Echo reply
        EchoReply      =  0,
        /// Destination unreachable
        DstUnreachable =  3,
        /// Echo request
        EchoRequest    =  8,
        /// Time exceeded
        TimeExceeded   = 11,
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Message::EchoReply      => write!(f, "echo reply"),
            Message::DstUnreachable => write!(f, "destination unreachable"),
            Message::EchoRequest    => write!(f, "echo request"),
            Message::TimeExceeded   => write!(f, "time exceeded"),
            Message::Unknown(id) => write!(f, "{}", id),
        }
    }
}

byte_wrapper! {
    /// A byte sequence representing an ICMPv4 message.
    #[derive(Debug, PartialEq, Eq)]
    pub struct icmpv4([u8]);
}

mod field {
    use crate::wire::field::Field;

    pub(crate) const TYPE:       usize = 0;
    pub(crate) const CODE:       usize = 1;
    pub(crate) const CHECKSUM:   Field = 2..4;
    pub(crate) const ECHO_IDENT: Field = 4..6;
    pub(crate) const ECHO_SEQNO: Field = 6..8;
}

impl icmpv4 {
    /// Imbue a raw octet buffer with ICMPv4 structure.
    pub fn new_unchecked(buffer: &[u8]) -> &icmpv4 {
        Self::__from_macro_new_unchecked(buffer)
    }

    /// Imbue a mutable octet buffer with ICMPv4 structure.
    pub fn new_unchecked_mut(buffer: &mut [u8]) -> &mut icmpv4 {
        Self::__from_macro_new_unchecked_mut(buffer)
    }

    /// Shorthand for a combination of [new_unchecked] and [check_len].
    ///
    /// [new_unchecked]: #method.new_unchecked
    /// [check_len]: #method.check_len
    pub fn new_checked(data: &[u8]) -> Result<&icmpv4> {
        let packet = Self::new_unchecked(data);
        packet.check_len()?;
        Ok(packet)
    }

    /// Ensure that no accessor method will panic if called.
    ///
    /// Every message type we know has at least the eight bytes of an echo header.
    pub fn check_len(&self) -> Result<()> {
        if self.0.len() < HEADER_LEN {
            Err(Error::Truncated)
        } else {
            Ok(())
        }
    }

    /// Return the message type field.
    #[inline]
    pub fn msg_type(&self) -> Message {
        Message::from(self.0[field::TYPE])
    }

    /// Return the message code field.
    #[inline]
    pub fn msg_code(&self) -> u8 {
        self.0[field::CODE]
    }

    /// Return the checksum field.
    #[inline]
    pub fn checksum(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::CHECKSUM])
    }

    /// Return the identifier field of an echo message.
    #[inline]
    pub fn echo_ident(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::ECHO_IDENT])
    }

    /// Return the sequence number field of an echo message.
    #[inline]
    pub fn echo_seq_no(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::ECHO_SEQNO])
    }

    /// Validate the checksum over the whole message.
    pub fn verify_checksum(&self) -> bool {
        checksum::checksum(&self.0, 0) == 0
    }

    /// Set the message type field.
    #[inline]
    pub fn set_msg_type(&mut self, value: Message) {
        self.0[field::TYPE] = value.into()
    }

    /// Set the message code field.
    #[inline]
    pub fn set_msg_code(&mut self, value: u8) {
        self.0[field::CODE] = value
    }

    /// Set the checksum field.
    #[inline]
    pub fn set_checksum(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::CHECKSUM], value)
    }

    /// Set the identifier field of an echo message.
    #[inline]
    pub fn set_echo_ident(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::ECHO_IDENT], value)
    }

    /// Set the sequence number field of an echo message.
    #[inline]
    pub fn set_echo_seq_no(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::ECHO_SEQNO], value)
    }

    /// Compute and fill in the checksum over the whole message.
    pub fn fill_checksum(&mut self) {
        self.set_checksum(0);
        let checksum = checksum::checksum(&self.0, 0);
        self.set_checksum(checksum)
    }

    /// Return the data following the echo header.
    pub fn payload_slice(&self) -> &[u8] {
        &self.0[HEADER_LEN..]
    }

    /// Return the data following the echo header, mutably.
    pub fn payload_mut_slice(&mut self) -> &mut [u8] {
        &mut self.0[HEADER_LEN..]
    }
}

/// A high-level representation of the echo messages of ICMPv4.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Repr {
    /// An echo request ("ping").
    EchoRequest {
        /// Identifier chosen by the requester.
        ident:  u16,
        /// Sequence number chosen by the requester.
        seq_no: u16,
        /// Length of the echoed data.
        payload: usize,
    },
    /// The answer to an echo request.
    EchoReply {
        /// Identifier copied from the request.
        ident:  u16,
        /// Sequence number copied from the request.
        seq_no: u16,
        /// Length of the echoed data.
        payload: usize,
    },
}

impl Repr {
    /// Get the echo reply request if this is an echo request.
    pub fn echo_reply(self) -> Option<Repr> {
        match self {
            Repr::EchoRequest { ident, seq_no, payload, } =>
                Some(Repr::EchoReply { ident, seq_no, payload, }),
            _ => None,
        }
    }

    /// Parse an echo message.
    ///
    /// Returns `Err(Error::Unrecognized)` for all other message types.
    pub fn parse(packet: &icmpv4, checksum: Checksum) -> Result<Repr> {
        packet.check_len()?;
        if checksum.manual() && !packet.verify_checksum() { return Err(Error::WrongChecksum) }

        match (packet.msg_type(), packet.msg_code()) {
            (Message::EchoRequest, 0) => Ok(Repr::EchoRequest {
                ident:  packet.echo_ident(),
                seq_no: packet.echo_seq_no(),
                payload: packet.payload_slice().len(),
            }),
            (Message::EchoReply, 0) => Ok(Repr::EchoReply {
                ident:  packet.echo_ident(),
                seq_no: packet.echo_seq_no(),
                payload: packet.payload_slice().len(),
            }),
            _ => Err(Error::Unrecognized),
        }
    }

    /// Return the length of the message that will be emitted, including the data.
    pub fn buffer_len(&self) -> usize {
        match self {
            Repr::EchoRequest { payload, .. } |
            Repr::EchoReply { payload, .. } => HEADER_LEN + payload,
        }
    }

    /// Emit the header into a message buffer.
    ///
    /// The checksum covers the data as well, so the data must already be in place.
    pub fn emit(&self, packet: &mut icmpv4, checksum: Checksum) {
        match *self {
            Repr::EchoRequest { ident, seq_no, payload: _ } => {
                packet.set_msg_type(Message::EchoRequest);
                packet.set_echo_ident(ident);
                packet.set_echo_seq_no(seq_no);
            },
            Repr::EchoReply { ident, seq_no, payload: _ } => {
                packet.set_msg_type(Message::EchoReply);
                packet.set_echo_ident(ident);
                packet.set_echo_seq_no(seq_no);
            },
        }
        packet.set_msg_code(0);

        if checksum.manual() {
            packet.fill_checksum()
        } else {
            packet.set_checksum(0)
        }
    }
}

impl fmt::Display for Repr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Repr::EchoRequest { ident, seq_no, payload } =>
                write!(f, "ICMPv4 echo request id={} seq={} len={}", ident, seq_no, payload),
            Repr::EchoReply { ident, seq_no, payload } =>
                write!(f, "ICMPv4 echo reply id={} seq={} len={}", ident, seq_no, payload),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    static ECHO_PACKET_BYTES: [u8; 12] =
        [0x08, 0x00, 0x8e, 0xfe,
         0x12, 0x34, 0xab, 0xcd,
         0xaa, 0x00, 0x00, 0xff];

    static ECHO_DATA_BYTES: [u8; 4] =
        [0xaa, 0x00, 0x00, 0xff];

    fn echo_packet_repr() -> Repr {
        Repr::EchoRequest {
            ident: 0x1234,
            seq_no: 0xabcd,
            payload: 4,
        }
    }

    #[test]
    fn echo_deconstruct() {
        let packet = icmpv4::new_checked(&ECHO_PACKET_BYTES[..]).unwrap();
        assert_eq!(packet.msg_type(), Message::EchoRequest);
        assert_eq!(packet.msg_code(), 0);
        assert_eq!(packet.checksum(), 0x8efe);
        assert_eq!(packet.echo_ident(), 0x1234);
        assert_eq!(packet.echo_seq_no(), 0xabcd);
        assert_eq!(packet.payload_slice(), &ECHO_DATA_BYTES[..]);
        assert_eq!(packet.verify_checksum(), true);
    }

    #[test]
    fn echo_parse() {
        let packet = icmpv4::new_checked(&ECHO_PACKET_BYTES[..]).unwrap();
        let repr = Repr::parse(packet, Checksum::Manual).unwrap();
        assert_eq!(repr, echo_packet_repr());
    }

    #[test]
    fn echo_emit() {
        let repr = echo_packet_repr();
        let mut bytes = vec![0xa5; repr.buffer_len()];
        let packet = icmpv4::new_unchecked_mut(&mut bytes);
        packet.payload_mut_slice().copy_from_slice(&ECHO_DATA_BYTES[..]);
        repr.emit(packet, Checksum::Manual);
        assert_eq!(&bytes[..], &ECHO_PACKET_BYTES[..]);
    }

    #[test]
    fn reply_mirrors_request() {
        assert_eq!(echo_packet_repr().echo_reply(), Some(Repr::EchoReply {
            ident: 0x1234,
            seq_no: 0xabcd,
            payload: 4,
        }));
    }

    #[test]
    fn other_messages_unrecognized() {
        let mut bytes = ECHO_PACKET_BYTES;
        bytes[0] = Message::TimeExceeded.into();
        let packet = icmpv4::new_unchecked_mut(&mut bytes[..]);
        packet.fill_checksum();
        assert_eq!(Repr::parse(packet, Checksum::Manual), Err(Error::Unrecognized));
    }
}
