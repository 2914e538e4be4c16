//! Framing of IP datagrams on a serial line, RFC 1055.
//!
//! A frame is the datagram with every special byte escaped, enclosed by `END` delimiters. The
//! leading delimiter is not required by the RFC but flushes line noise accumulated on the peer.
//!
//! Receiving is a byte-at-a-time state machine, the [`Decoder`], since the serial device delivers
//! single bytes as they arrive. Sending encodes a whole datagram in one go into a scratch buffer,
//! through the [`Encoder`] which is the `ip::Link` of the stack.
//!
//! [`Decoder`]: struct.Decoder.html
//! [`Encoder`]: struct.Encoder.html
mod decoder;

#[cfg(test)]
mod tests;

use crate::layer::{ip, Error, Result};
use crate::nic::Device;

pub use self::decoder::{Decoder, Status};

/// Frame delimiter.
pub const END: u8 = 0xc0;
/// Escape introducer.
pub const ESC: u8 = 0xdb;
/// Escaped representation of `END`, following `ESC`.
pub const ESC_END: u8 = 0xdc;
/// Escaped representation of `ESC`, following `ESC`.
pub const ESC_ESC: u8 = 0xdd;

/// The largest datagram the framer will handle in either direction.
pub const MAX_MTU: usize = 1500;

/// Size of a buffer that can hold the encoding of any datagram of `MAX_MTU` bytes.
pub const MAX_ENCODED_LEN: usize = 2*MAX_MTU + 2;

/// The exact length of the encoding of `payload`, both delimiters included.
pub fn encoded_len(payload: &[u8]) -> usize {
    let escaped = payload.iter()
        .filter(|&&byte| byte == END || byte == ESC)
        .count();
    payload.len() + escaped + 2
}

/// Encode a datagram into a frame.
///
/// Returns the number of bytes written to `out`, or `Err(Error::BadSize)` if the buffer is too
/// short. A buffer of `2 * payload.len() + 2` bytes is always sufficient.
pub fn encode(payload: &[u8], out: &mut [u8]) -> Result<usize> {
    if out.len() < encoded_len(payload) {
        return Err(Error::BadSize);
    }

    let mut len = 0;
    let mut push = |byte: u8| {
        out[len] = byte;
        len += 1;
    };

    push(END);
    for &byte in payload {
        match byte {
            END => { push(ESC); push(ESC_END) },
            ESC => { push(ESC); push(ESC_ESC) },
            other => push(other),
        }
    }
    push(END);

    Ok(len)
}

/// The link sending datagrams as SLIP frames to a serial device.
pub struct Encoder<'a, D: ?Sized> {
    device: &'a mut D,
    scratch: &'a mut [u8],
}

impl<'a, D: Device + ?Sized> Encoder<'a, D> {
    /// Create an encoder writing frames to `device`.
    ///
    /// The scratch buffer must be large enough for the encoding of the largest datagram that will
    /// be sent, see [`MAX_ENCODED_LEN`].
    ///
    /// [`MAX_ENCODED_LEN`]: constant.MAX_ENCODED_LEN.html
    pub fn new(device: &'a mut D, scratch: &'a mut [u8]) -> Self {
        Encoder {
            device,
            scratch,
        }
    }
}

impl<D: Device + ?Sized> ip::Link for Encoder<'_, D> {
    fn transmit(&mut self, datagram: &[u8]) -> Result<()> {
        let len = encode(datagram, self.scratch)?;
        self.device.send(&self.scratch[..len])
    }
}
