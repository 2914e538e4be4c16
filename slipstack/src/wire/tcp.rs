use core::{cmp, fmt, ops};
use byteorder::{ByteOrder, NetworkEndian};

use super::{Checksum, Error, Result};
use super::checksum;
use super::ipv4::{Address, Protocol};

/// Length of a header without options, the only kind we emit.
pub const HEADER_LEN: usize = field::URGENT.end;

/// A TCP sequence number.
///
/// A sequence number is a monotonically advancing integer modulo 2<sup>32</sup>. Sequence numbers
/// do not have a discontinuity when compared pairwise across a signed overflow.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, Hash)]
pub struct SeqNumber(pub i32);

impl SeqNumber {
    /// Reinterpret an unsigned 32-bit value, e.g. a random initial sequence number.
    pub fn from_u32(value: u32) -> Self {
        SeqNumber(value as i32)
    }

    /// The raw value as it appears on the wire.
    pub fn to_u32(self) -> u32 {
        self.0 as u32
    }

    /// The distance from `base` to `self`, modulo 2<sup>32</sup>.
    pub fn offset_from(self, base: SeqNumber) -> u32 {
        self.0.wrapping_sub(base.0) as u32
    }
}

impl fmt::Display for SeqNumber {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0 as u32)
    }
}

impl ops::Add<usize> for SeqNumber {
    type Output = SeqNumber;

    fn add(self, rhs: usize) -> SeqNumber {
        SeqNumber(self.0.wrapping_add(rhs as i32))
    }
}

impl ops::AddAssign<usize> for SeqNumber {
    fn add_assign(&mut self, rhs: usize) {
        *self = *self + rhs;
    }
}

impl cmp::PartialOrd for SeqNumber {
    fn partial_cmp(&self, other: &SeqNumber) -> Option<cmp::Ordering> {
        self.0.wrapping_sub(other.0).partial_cmp(&0)
    }
}

/// A set of tcp flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Flags(pub u16);

byte_wrapper! {
    /// A byte sequence representing a TCP segment.
    #[derive(Debug, PartialEq, Eq)]
    pub struct tcp([u8]);
}

mod field {
    use crate::wire::field::{Field, Rest};

    pub(crate) const SRC_PORT: Field = 0..2;
    pub(crate) const DST_PORT: Field = 2..4;
    pub(crate) const SEQ_NUM:  Field = 4..8;
    pub(crate) const ACK_NUM:  Field = 8..12;
    pub(crate) const FLAGS:    Field = 12..14;
    pub(crate) const WIN_SIZE: Field = 14..16;
    pub(crate) const CHECKSUM: Field = 16..18;
    pub(crate) const URGENT:   Field = 18..20;
    pub(crate) const OPTIONS:  Rest  = 20..;

    pub(crate) const FLG_FIN: u16 = 0x001;
    pub(crate) const FLG_SYN: u16 = 0x002;
    pub(crate) const FLG_RST: u16 = 0x004;
    pub(crate) const FLG_PSH: u16 = 0x008;
    pub(crate) const FLG_ACK: u16 = 0x010;
    pub(crate) const FLG_URG: u16 = 0x020;
}

impl tcp {
    /// Imbue a raw octet buffer with TCP segment structure.
    pub fn new_unchecked(buffer: &[u8]) -> &tcp {
        Self::__from_macro_new_unchecked(buffer)
    }

    /// Imbue a mutable octet buffer with TCP segment structure.
    pub fn new_unchecked_mut(buffer: &mut [u8]) -> &mut tcp {
        Self::__from_macro_new_unchecked_mut(buffer)
    }

    /// Shorthand for a combination of [new_unchecked] and [check_len].
    ///
    /// [new_unchecked]: #method.new_unchecked
    /// [check_len]: #method.check_len
    pub fn new_checked(data: &[u8]) -> Result<&tcp> {
        let packet = Self::new_unchecked(data);
        packet.check_len()?;
        Ok(packet)
    }

    /// View the segment as a raw byte slice.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Ensure that no header accessor method will panic if called.
    ///
    /// Returns `Err(Error::Truncated)` if the buffer is too short. Returns `Err(Error::Malformed)`
    /// if the data offset is smaller than the minimal header length.
    ///
    /// The result of this check is invalidated by calling [set_header_len].
    ///
    /// [set_header_len]: #method.set_header_len
    pub fn check_len(&self) -> Result<()> {
        let len = self.0.len();
        if len < field::URGENT.end {
            return Err(Error::Truncated);
        }

        let header_len = usize::from(self.header_len());
        if header_len < field::URGENT.end {
            Err(Error::Malformed)
        } else if len < header_len {
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

    /// Return the sequence number field.
    #[inline]
    pub fn seq_number(&self) -> SeqNumber {
        SeqNumber(NetworkEndian::read_i32(&self.0[field::SEQ_NUM]))
    }

    /// Return the acknowledgement number field.
    #[inline]
    pub fn ack_number(&self) -> SeqNumber {
        SeqNumber(NetworkEndian::read_i32(&self.0[field::ACK_NUM]))
    }

    /// Read all flags at once.
    pub fn flags(&self) -> Flags {
        Flags(NetworkEndian::read_u16(&self.0[field::FLAGS]) & 0x1ff)
    }

    /// Return the header length, in octets.
    #[inline]
    pub fn header_len(&self) -> u8 {
        let raw = NetworkEndian::read_u16(&self.0[field::FLAGS]);
        ((raw >> 12) * 4) as u8
    }

    /// Return the window size field.
    #[inline]
    pub fn window_len(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::WIN_SIZE])
    }

    /// Return the checksum field.
    #[inline]
    pub fn checksum(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::CHECKSUM])
    }

    /// Return the urgent pointer field.
    #[inline]
    pub fn urgent_at(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::URGENT])
    }

    /// Return the options, which are never interpreted.
    pub fn options(&self) -> &[u8] {
        let header_len = usize::from(self.header_len());
        &self.0[field::OPTIONS.start..header_len]
    }

    /// Return the payload following the header and options.
    pub fn payload_slice(&self) -> &[u8] {
        let header_len = usize::from(self.header_len());
        &self.0[header_len..]
    }

    /// Validate the checksum over pseudo-header and segment.
    pub fn verify_checksum(&self, src_addr: Address, dst_addr: Address) -> bool {
        let seed = checksum::pseudo_header(src_addr, dst_addr, Protocol::Tcp, self.0.len() as u16);
        checksum::checksum(&self.0, seed.into()) == 0
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

    /// Set the sequence number field.
    #[inline]
    pub fn set_seq_number(&mut self, value: SeqNumber) {
        NetworkEndian::write_i32(&mut self.0[field::SEQ_NUM], value.0)
    }

    /// Set the acknowledgement number field.
    #[inline]
    pub fn set_ack_number(&mut self, value: SeqNumber) {
        NetworkEndian::write_i32(&mut self.0[field::ACK_NUM], value.0)
    }

    /// Set all flags at once, keeping the header length.
    pub fn set_flags(&mut self, Flags(flags): Flags) {
        let raw = NetworkEndian::read_u16(&self.0[field::FLAGS]);
        let raw = (raw & !0x0fff) | (flags & 0x1ff);
        NetworkEndian::write_u16(&mut self.0[field::FLAGS], raw)
    }

    /// Set the header length, in octets.
    #[inline]
    pub fn set_header_len(&mut self, value: u8) {
        let raw = NetworkEndian::read_u16(&self.0[field::FLAGS]);
        let raw = (raw & 0x0fff) | ((u16::from(value) / 4) << 12);
        NetworkEndian::write_u16(&mut self.0[field::FLAGS], raw)
    }

    /// Set the window size field.
    #[inline]
    pub fn set_window_len(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::WIN_SIZE], value)
    }

    /// Set the checksum field.
    #[inline]
    pub fn set_checksum(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::CHECKSUM], value)
    }

    /// Set the urgent pointer field.
    #[inline]
    pub fn set_urgent_at(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::URGENT], value)
    }

    /// Compute and fill in the checksum over pseudo-header and the whole buffer.
    ///
    /// The payload must already be in place.
    pub fn fill_checksum(&mut self, src_addr: Address, dst_addr: Address) {
        self.set_checksum(0);
        let seed = checksum::pseudo_header(src_addr, dst_addr, Protocol::Tcp, self.0.len() as u16);
        let checksum = checksum::checksum(&self.0, seed.into());
        self.set_checksum(checksum)
    }

    /// Return the payload as a mutable byte slice.
    pub fn payload_mut_slice(&mut self) -> &mut [u8] {
        let header_len = usize::from(self.header_len());
        &mut self.0[header_len..]
    }
}

impl AsRef<[u8]> for tcp {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Flags {
    /// The FIN flag alone.
    pub const FIN: Flags = Flags(field::FLG_FIN);
    /// The SYN flag alone.
    pub const SYN: Flags = Flags(field::FLG_SYN);
    /// The RST flag alone.
    pub const RST: Flags = Flags(field::FLG_RST);
    /// The PSH flag alone.
    pub const PSH: Flags = Flags(field::FLG_PSH);
    /// The ACK flag alone.
    pub const ACK: Flags = Flags(field::FLG_ACK);
    /// The URG flag alone.
    pub const URG: Flags = Flags(field::FLG_URG);

    /// Return the FIN flag.
    #[inline]
    pub fn fin(&self) -> bool {
        self.0 & field::FLG_FIN != 0
    }

    /// Return the SYN flag.
    #[inline]
    pub fn syn(&self) -> bool {
        self.0 & field::FLG_SYN != 0
    }

    /// Return the RST flag.
    #[inline]
    pub fn rst(&self) -> bool {
        self.0 & field::FLG_RST != 0
    }

    /// Return the PSH flag.
    #[inline]
    pub fn psh(&self) -> bool {
        self.0 & field::FLG_PSH != 0
    }

    /// Return the ACK flag.
    #[inline]
    pub fn ack(&self) -> bool {
        self.0 & field::FLG_ACK != 0
    }

    /// Return the URG flag.
    #[inline]
    pub fn urg(&self) -> bool {
        self.0 & field::FLG_URG != 0
    }

    /// Set the FIN flag.
    #[inline]
    pub fn set_fin(&mut self, value: bool) {
        self.set(field::FLG_FIN, value)
    }

    /// Set the SYN flag.
    #[inline]
    pub fn set_syn(&mut self, value: bool) {
        self.set(field::FLG_SYN, value)
    }

    /// Set the RST flag.
    #[inline]
    pub fn set_rst(&mut self, value: bool) {
        self.set(field::FLG_RST, value)
    }

    /// Set the PSH flag.
    #[inline]
    pub fn set_psh(&mut self, value: bool) {
        self.set(field::FLG_PSH, value)
    }

    /// Set the ACK flag.
    #[inline]
    pub fn set_ack(&mut self, value: bool) {
        self.set(field::FLG_ACK, value)
    }

    /// Set the URG flag.
    #[inline]
    pub fn set_urg(&mut self, value: bool) {
        self.set(field::FLG_URG, value)
    }

    fn set(&mut self, flag: u16, value: bool) {
        let flag = if value { flag } else { 0 };
        let without = self.0 & !flag;
        self.0 = without | flag;
    }

    /// Return the length of the control flags in sequence space.
    ///
    /// SYN and FIN each occupy one sequence number.
    pub fn sequence_len(self) -> usize {
        usize::from(self.syn()) + usize::from(self.fin())
    }
}

impl ops::BitOr for Flags {
    type Output = Flags;

    fn bitor(self, rhs: Flags) -> Flags {
        Flags(self.0 | rhs.0)
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let names = [
            (self.syn(), "syn"),
            (self.fin(), "fin"),
            (self.rst(), "rst"),
            (self.psh(), "psh"),
            (self.ack(), "ack"),
            (self.urg(), "urg"),
        ];
        let mut first = true;
        for &(set, name) in names.iter() {
            if !set { continue }
            if !first { f.write_str("|")? }
            f.write_str(name)?;
            first = false;
        }
        Ok(())
    }
}

/// A high-level representation of a Transmission Control Protocol segment header.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Repr {
    /// The source port.
    pub src_port:    u16,
    /// The destination port.
    pub dst_port:    u16,
    /// All control flags, including ACK.
    pub flags:       Flags,
    /// The sequence number of the first octet (or of the SYN).
    pub seq_number:  SeqNumber,
    /// The acknowledgment number, present exactly when the ACK flag is.
    pub ack_number:  Option<SeqNumber>,
    /// The advertised receive window.
    pub window_len:  u16,
    /// Number of payload octets after the header.
    pub payload_len: usize,
}

impl Repr {
    /// Parse a Transmission Control Protocol segment and return a high-level representation.
    ///
    /// The addresses are those of the enclosing IPv4 header, used for the pseudo-header checksum.
    pub fn parse(
        packet: &tcp,
        src_addr: Address,
        dst_addr: Address,
        checksum: Checksum,
    ) -> Result<Repr> {
        packet.check_len()?;
        // Source and destination ports must be present.
        if packet.src_port() == 0 { return Err(Error::Malformed) }
        if packet.dst_port() == 0 { return Err(Error::Malformed) }

        if checksum.manual() && !packet.verify_checksum(src_addr, dst_addr) {
            return Err(Error::WrongChecksum)
        }

        let flags = packet.flags();
        let ack_number = if flags.ack() {
            Some(packet.ack_number())
        } else {
            None
        };

        // The URG flag and the urgent pointer are ignored.
        Ok(Repr {
            src_port:    packet.src_port(),
            dst_port:    packet.dst_port(),
            flags,
            seq_number:  packet.seq_number(),
            ack_number,
            window_len:  packet.window_len(),
            payload_len: packet.payload_slice().len(),
        })
    }

    /// Return the length of the header that will be emitted.
    pub fn header_len(&self) -> usize {
        HEADER_LEN
    }

    /// Return the length of the segment that will be emitted, including the payload.
    pub fn buffer_len(&self) -> usize {
        self.header_len() + self.payload_len
    }

    /// Emit the header into a segment buffer.
    ///
    /// The checksum is left at zero, fill it with [`tcp::fill_checksum`] after the payload has
    /// been written.
    ///
    /// [`tcp::fill_checksum`]: struct.tcp.html#method.fill_checksum
    pub fn emit(&self, packet: &mut tcp) {
        packet.set_src_port(self.src_port);
        packet.set_dst_port(self.dst_port);
        packet.set_seq_number(self.seq_number);
        packet.set_ack_number(self.ack_number.unwrap_or(SeqNumber(0)));
        packet.set_header_len(HEADER_LEN as u8);
        let mut flags = self.flags;
        flags.set_ack(self.ack_number.is_some());
        packet.set_flags(flags);
        packet.set_window_len(self.window_len);
        packet.set_checksum(0);
        packet.set_urgent_at(0);
    }

    /// Return the length of the segment, in terms of sequence space.
    pub fn sequence_len(&self) -> usize {
        self.payload_len + self.flags.sequence_len()
    }
}

impl fmt::Display for Repr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "TCP src={} dst={} [{}] seq={}",
               self.src_port, self.dst_port, self.flags, self.seq_number)?;
        if let Some(ack_number) = self.ack_number {
            write!(f, " ack={}", ack_number)?;
        }
        write!(f, " win={} len={}", self.window_len, self.payload_len)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const SRC_ADDR: Address = Address([192, 168, 1, 1]);
    const DST_ADDR: Address = Address([192, 168, 1, 2]);

    static PACKET_BYTES: [u8; 28] =
        [0xbf, 0x00, 0x00, 0x50,
         0x01, 0x23, 0x45, 0x67,
         0x89, 0xab, 0xcd, 0xef,
         0x60, 0x35, 0x01, 0x23,
         0x01, 0xb6, 0x02, 0x01,
         0x03, 0x03, 0x0c, 0x01,
         0xaa, 0x00, 0x00, 0xff];

    static OPTION_BYTES: [u8; 4] =
        [0x03, 0x03, 0x0c, 0x01];

    static SYN_PACKET_BYTES: [u8; 24] =
        [0xbf, 0x00, 0x00, 0x50,
         0x01, 0x23, 0x45, 0x67,
         0x00, 0x00, 0x00, 0x00,
         0x50, 0x02, 0x01, 0x23,
         0x7a, 0x8d, 0x00, 0x00,
         0xaa, 0x00, 0x00, 0xff];

    static PAYLOAD_BYTES: [u8; 4] =
        [0xaa, 0x00, 0x00, 0xff];

    fn syn_repr() -> Repr {
        Repr {
            src_port:    48896,
            dst_port:    80,
            flags:       Flags::SYN,
            seq_number:  SeqNumber(0x01234567),
            ack_number:  None,
            window_len:  0x0123,
            payload_len: PAYLOAD_BYTES.len(),
        }
    }

    #[test]
    fn deconstruct() {
        let packet = tcp::new_checked(&PACKET_BYTES[..]).unwrap();
        assert_eq!(packet.src_port(), 48896);
        assert_eq!(packet.dst_port(), 80);
        assert_eq!(packet.seq_number(), SeqNumber(0x01234567));
        assert_eq!(packet.ack_number(), SeqNumber(0x89abcdefu32 as i32));
        assert_eq!(packet.header_len(), 24);
        assert_eq!(packet.flags().fin(), true);
        assert_eq!(packet.flags().syn(), false);
        assert_eq!(packet.flags().rst(), true);
        assert_eq!(packet.flags().psh(), false);
        assert_eq!(packet.flags().ack(), true);
        assert_eq!(packet.flags().urg(), true);
        assert_eq!(packet.window_len(), 0x0123);
        assert_eq!(packet.urgent_at(), 0x0201);
        assert_eq!(packet.checksum(), 0x01b6);
        assert_eq!(packet.options(), &OPTION_BYTES[..]);
        assert_eq!(packet.payload_slice(), &PAYLOAD_BYTES[..]);
        assert_eq!(packet.verify_checksum(SRC_ADDR, DST_ADDR), true);
    }

    #[test]
    fn options_are_skipped() {
        let packet = tcp::new_checked(&PACKET_BYTES[..]).unwrap();
        let repr = Repr::parse(packet, SRC_ADDR, DST_ADDR, Checksum::Manual).unwrap();
        assert_eq!(repr.payload_len, PAYLOAD_BYTES.len());
        assert_eq!(repr.ack_number, Some(SeqNumber(0x89abcdefu32 as i32)));
        assert_eq!(repr.flags, Flags::FIN | Flags::RST | Flags::ACK | Flags::URG);
    }

    #[test]
    fn truncated() {
        assert_eq!(tcp::new_checked(&PACKET_BYTES[..19]), Err(Error::Truncated));
        // Data offset claims 24 bytes.
        assert_eq!(tcp::new_checked(&PACKET_BYTES[..23]), Err(Error::Truncated));
    }

    #[test]
    fn impossible_len() {
        let mut bytes = vec![0; 20];
        tcp::new_unchecked_mut(&mut bytes).set_header_len(16);
        assert_eq!(tcp::new_unchecked(&bytes).check_len(), Err(Error::Malformed));
    }

    #[test]
    fn parse() {
        let packet = tcp::new_checked(&SYN_PACKET_BYTES[..]).unwrap();
        let repr = Repr::parse(packet, SRC_ADDR, DST_ADDR, Checksum::Manual).unwrap();
        assert_eq!(repr, syn_repr());
        assert_eq!(packet.payload_slice(), &PAYLOAD_BYTES[..]);
    }

    #[test]
    fn parse_wrong_checksum() {
        let mut bytes = SYN_PACKET_BYTES;
        bytes[23] = 0xfe;
        let packet = tcp::new_checked(&bytes[..]).unwrap();
        assert_eq!(
            Repr::parse(packet, SRC_ADDR, DST_ADDR, Checksum::Manual),
            Err(Error::WrongChecksum));
        // The pseudo-header covers the addresses as well.
        let packet = tcp::new_checked(&SYN_PACKET_BYTES[..]).unwrap();
        assert_eq!(
            Repr::parse(packet, DST_ADDR, Address([192, 168, 1, 3]), Checksum::Manual),
            Err(Error::WrongChecksum));
    }

    #[test]
    fn emit() {
        let repr = syn_repr();
        let mut bytes = vec![0xa5; repr.buffer_len()];
        let packet = tcp::new_unchecked_mut(&mut bytes);
        repr.emit(packet);
        packet.payload_mut_slice().copy_from_slice(&PAYLOAD_BYTES);
        packet.fill_checksum(SRC_ADDR, DST_ADDR);
        assert_eq!(&bytes[..], &SYN_PACKET_BYTES[..]);
    }

    #[test]
    fn seq_number_wraps() {
        let near_end = SeqNumber::from_u32(0xffff_fffe);
        let wrapped = near_end + 4;
        assert_eq!(wrapped.to_u32(), 2);
        assert!(near_end < wrapped);
        assert_eq!(wrapped.offset_from(near_end), 4);
        assert_eq!(SeqNumber::from_u32(0x0500_0000).offset_from(SeqNumber(0)) >> 24, 5);
    }

    #[test]
    fn flags_display() {
        let flags = Flags::SYN | Flags::ACK;
        assert_eq!(format!("{}", flags), "syn|ack");
        assert_eq!(flags.sequence_len(), 1);
        assert_eq!((Flags::SYN | Flags::FIN).sequence_len(), 2);
    }
}
