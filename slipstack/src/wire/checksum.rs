//! The Internet checksum of RFC 1071.
//!
//! Every header checksum in the stack (IPv4, TCP, UDP, ICMP) is the one's complement of the one's
//! complement sum of big-endian 16-bit words. The pieces are exposed separately so that a
//! pseudo-header sum can be used as the seed of a segment checksum.
//!
//! When the checksum field itself lies inside the summed range of a correct packet,
//! [`checksum`] returns exactly zero.
//!
//! [`checksum`]: fn.checksum.html
use byteorder::{ByteOrder, NetworkEndian};

use super::ipv4::{Address, Protocol};

fn propagate_carries(word: u32) -> u16 {
    let sum = (word >> 16) + (word & 0xffff);
    ((sum >> 16) as u16) + (sum as u16)
}

/// Compute the checksum of `data` on top of a partial sum `seed`.
///
/// The seed may be any 32-bit partial sum, typically zero or the result of [`pseudo_header`].
/// A trailing odd byte counts as the high byte of a final word padded with zero.
///
/// ```
/// # use slipstack::wire::checksum::checksum;
/// assert_eq!(checksum(&[0; 20], 0), 0xffff);
/// ```
///
/// [`pseudo_header`]: fn.pseudo_header.html
pub fn checksum(data: &[u8], seed: u32) -> u16 {
    !combine(&[propagate_carries(seed), self::data(data)])
}

/// Compute the folded one's complement sum of `data`, without the final complement.
pub fn data(mut data: &[u8]) -> u16 {
    let mut accum = 0;

    // Sum in chunks so the compiler can unroll the inner loop.
    const CHUNK_SIZE: usize = 32;
    while data.len() >= CHUNK_SIZE {
        let mut d = &data[..CHUNK_SIZE];
        while d.len() >= 2 {
            accum += NetworkEndian::read_u16(d) as u32;
            d = &d[2..];
        }

        data = &data[CHUNK_SIZE..];
        // A chunk adds at most 16 * 0xffff, fold early to keep room.
        accum = propagate_carries(accum) as u32;
    }

    while data.len() >= 2 {
        accum += NetworkEndian::read_u16(data) as u32;
        data = &data[2..];
    }

    if let Some(&value) = data.first() {
        accum += (value as u32) << 8;
    }

    propagate_carries(accum)
}

/// Combine several folded sums.
pub fn combine(checksums: &[u16]) -> u16 {
    let mut accum: u32 = 0;
    for &word in checksums {
        accum += word as u32;
    }
    propagate_carries(accum)
}

/// Compute the partial sum of the IPv4 pseudo-header.
///
/// The pseudo-header is source and destination address, a zero byte, the protocol number and the
/// length of the transport segment (header and payload).
pub fn pseudo_header(src_addr: Address, dst_addr: Address, protocol: Protocol, length: u16)
    -> u16
{
    let mut proto_len = [0u8; 4];
    proto_len[1] = protocol.into();
    NetworkEndian::write_u16(&mut proto_len[2..4], length);

    combine(&[
        data(src_addr.as_bytes()),
        data(dst_addr.as_bytes()),
        data(&proto_len[..]),
    ])
}

#[cfg(test)]
mod test {
    use super::*;

    static IP_HEADER: [u8; 20] =
        [0x45, 0x00, 0x00, 0x1e,
         0x01, 0x02, 0x62, 0x03,
         0x1a, 0x01, 0xd5, 0x6e,
         0x11, 0x12, 0x13, 0x14,
         0x21, 0x22, 0x23, 0x24];

    static TCP_SYN: [u8; 24] =
        [0xbf, 0x00, 0x00, 0x50,
         0x01, 0x23, 0x45, 0x67,
         0x00, 0x00, 0x00, 0x00,
         0x50, 0x02, 0x01, 0x23,
         0x7a, 0x8d, 0x00, 0x00,
         0xaa, 0x00, 0x00, 0xff];

    #[test]
    fn zeroes() {
        for len in (0..64).step_by(2) {
            assert_eq!(checksum(&vec![0; len], 0), 0xffff);
        }
    }

    #[test]
    fn correct_header_sums_to_zero() {
        assert_eq!(checksum(&IP_HEADER, 0), 0);

        let mut broken = IP_HEADER;
        broken[8] = 0x1b;
        assert_ne!(checksum(&broken, 0), 0);
    }

    #[test]
    fn seeded_with_pseudo_header() {
        let seed = pseudo_header(
            Address::new(192, 168, 1, 1),
            Address::new(192, 168, 1, 2),
            Protocol::Tcp,
            TCP_SYN.len() as u16);
        assert_eq!(checksum(&TCP_SYN, seed.into()), 0);
    }

    #[test]
    fn odd_length() {
        // The trailing byte is the high half of a word.
        assert_eq!(data(&[0x12]), 0x1200);
        assert_eq!(data(&[0x00, 0x01, 0xf2]), 0xf201);
        assert_eq!(checksum(&[0x00, 0x01, 0xf2], 0), !0xf201);
    }

    #[test]
    fn carries_wrap_around() {
        assert_eq!(data(&[0xff, 0xff, 0x00, 0x01]), 0x0001);
        assert_eq!(combine(&[0xffff, 0xffff]), 0xffff);
        assert_eq!(checksum(&[], 0x0001_fffe), 0);
    }

    #[test]
    fn long_buffers() {
        let ones = vec![0xff; 1500];
        assert_eq!(data(&ones), 0xffff);
        assert_eq!(checksum(&ones, 0), 0);
    }
}
