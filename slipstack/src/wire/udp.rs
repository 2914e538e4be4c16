use core::fmt;
use byteorder::{ByteOrder, NetworkEndian};

use super::{Checksum, Error, Result};
use super::checksum;
use super::field::Field;
use super::ipv4::{Address, Protocol};

/// Length of the fixed UDP header.
pub const HEADER_LEN: usize = field::CHECKSUM.end;

byte_wrapper! {
    /// A byte sequence representing a UDP datagram.
    #[derive(Debug, PartialEq, Eq)]
    pub struct udp([u8]);
}

mod field {
    use crate::wire::field::Field;

    pub(crate) const SRC_PORT: Field = 0..2;
    pub(crate) const DST_PORT: Field = 2..4;
    pub(crate) const LENGTH:   Field = 4..6;
    pub(crate) const CHECKSUM: Field = 6..8;
}

impl udp {
    /// Imbue a raw octet buffer with UDP datagram structure.
    pub fn new_unchecked(buffer: &[u8]) -> &udp {
        Self::__from_macro_new_unchecked(buffer)
    }

    /// Imbue a mutable octet buffer with UDP datagram structure.
    pub fn new_unchecked_mut(buffer: &mut [u8]) -> &mut udp {
        Self::__from_macro_new_unchecked_mut(buffer)
    }

    /// Shorthand for a combination of [new_unchecked] and [check_len].
    ///
    /// [new_unchecked]: #method.new_unchecked
    /// [check_len]: #method.check_len
    pub fn new_checked(data: &[u8]) -> Result<&udp> {
        let packet = Self::new_unchecked(data);
        packet.check_len()?;
        Ok(packet)
    }

    /// Ensure that no accessor method will panic if called.
    ///
    /// Returns `Err(Error::Truncated)` if the buffer is shorter than the header or the length
    /// field. Returns `Err(Error::Malformed)` if the length field is shorter than the header.
    pub fn check_len(&self) -> Result<()> {
        let buffer_len = self.0.len();
        if buffer_len < HEADER_LEN {
            return Err(Error::Truncated);
        }

        let field_len = usize::from(self.len());
        if field_len < HEADER_LEN {
            Err(Error::Malformed)
        } else if field_len > buffer_len {
            Err(Error::Truncated)
        } else {
            Ok(())
        }
    }

    /// Return the source port field.
    #[inline]
    pub fn src_port(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::SRC_PORT])
    }

    /// Return the destination port field.
    #[inline]
    pub fn dst_port(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::DST_PORT])
    }

    /// Return the length field, header included.
    #[inline]
    pub fn len(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::LENGTH])
    }

    /// Return the checksum field.
    #[inline]
    pub fn checksum(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::CHECKSUM])
    }

    /// Validate the checksum.
    ///
    /// A zero checksum field means the sender did not compute one and always validates.
    pub fn verify_checksum(&self, src_addr: Address, dst_addr: Address) -> bool {
        if self.checksum() == 0 {
            return true;
        }

        let data = &self.0[..usize::from(self.len())];
        let seed = checksum::pseudo_header(src_addr, dst_addr, Protocol::Udp, self.len());
        checksum::checksum(data, seed.into()) == 0
    }

    /// Set the source port field.
    #[inline]
    pub fn set_src_port(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::SRC_PORT], value)
    }

    /// Set the destination port field.
    #[inline]
    pub fn set_dst_port(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::DST_PORT], value)
    }

    /// Set the length field.
    #[inline]
    pub fn set_len(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::LENGTH], value)
    }

    /// Set the checksum field.
    #[inline]
    pub fn set_checksum(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::CHECKSUM], value)
    }

    /// Compute and fill in the checksum.
    ///
    /// A computed value of zero is transmitted as all ones, zero is reserved for "no checksum".
    pub fn fill_checksum(&mut self, src_addr: Address, dst_addr: Address) {
        self.set_checksum(0);
        let len = self.len();
        let seed = checksum::pseudo_header(src_addr, dst_addr, Protocol::Udp, len);
        let checksum = checksum::checksum(&self.0[..usize::from(len)], seed.into());
        self.set_checksum(if checksum == 0 { 0xffff } else { checksum })
    }

    fn payload_range(&self) -> Field {
        HEADER_LEN..usize::from(self.len())
    }

    /// Return the payload as a byte slice.
    pub fn payload_slice(&self) -> &[u8] {
        let range = self.payload_range();
        &self.0[range]
    }

    /// Return the payload as a mutable byte slice.
    pub fn payload_mut_slice(&mut self) -> &mut [u8] {
        let range = self.payload_range();
        &mut self.0[range]
    }
}

/// A high-level representation of a User Datagram Protocol header.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Repr {
    /// The source port.
    pub src_port:    u16,
    /// The destination port.
    pub dst_port:    u16,
    /// The length of the payload.
    pub payload_len: usize,
}

impl Repr {
    /// Parse a User Datagram Protocol packet and return a high-level representation.
    pub fn parse(
        packet: &udp,
        src_addr: Address,
        dst_addr: Address,
        checksum: Checksum,
    ) -> Result<Repr> {
        packet.check_len()?;
        // Destination port cannot be omitted (but source port can be).
        if packet.dst_port() == 0 { return Err(Error::Malformed) }
        if checksum.manual() && !packet.verify_checksum(src_addr, dst_addr) {
            return Err(Error::WrongChecksum)
        }

        Ok(Repr {
            src_port:    packet.src_port(),
            dst_port:    packet.dst_port(),
            payload_len: packet.payload_range().len(),
        })
    }

    /// Return the length of the datagram that will be emitted, including the payload.
    pub fn buffer_len(&self) -> usize {
        HEADER_LEN + self.payload_len
    }

    /// Emit the header into a datagram buffer.
    ///
    /// The checksum is left at zero, fill it after the payload has been written.
    pub fn emit(&self, packet: &mut udp) {
        packet.set_src_port(self.src_port);
        packet.set_dst_port(self.dst_port);
        packet.set_len(self.buffer_len() as u16);
        packet.set_checksum(0);
    }
}

impl fmt::Display for Repr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "UDP src={} dst={} len={}",
               self.src_port, self.dst_port, self.payload_len)
    }
}
