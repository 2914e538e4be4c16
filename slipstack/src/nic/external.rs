//! A stub serial line whose bytes come from and go to memory.
use std::collections::VecDeque;
use std::vec::Vec;

use crate::layer::{slip, Error, Result};
use super::Device;

/// An in-memory serial device.
///
/// Bytes queued with [`push_bytes`] or [`push_datagram`] are received one at a time, everything the
/// stack sends is appended to a single output buffer.
///
/// [`push_bytes`]: #method.push_bytes
/// [`push_datagram`]: #method.push_datagram
#[derive(Debug, Default)]
pub struct External {
    /// Bytes pending to be received.
    input: VecDeque<u8>,

    /// All bytes sent so far.
    output: Vec<u8>,

    /// Refuse to send when set.
    broken: bool,
}

impl External {
    /// A new device without input.
    pub fn new() -> Self {
        External::default()
    }

    /// Queue raw bytes to be received.
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.input.extend(bytes.iter().cloned());
    }

    /// Queue a datagram to be received as a SLIP frame.
    pub fn push_datagram(&mut self, datagram: &[u8]) {
        let mut frame = vec![0; slip::encoded_len(datagram)];
        if let Ok(len) = slip::encode(datagram, &mut frame) {
            self.push_bytes(&frame[..len]);
        }
    }

    /// Remaining number of bytes to receive.
    pub fn to_recv(&self) -> usize {
        self.input.len()
    }

    /// All bytes sent since the last `take_datagrams`.
    pub fn sent(&self) -> &[u8] {
        &self.output
    }

    /// Decode the sent bytes into datagrams and clear the output.
    pub fn take_datagrams(&mut self) -> Vec<Vec<u8>> {
        let mut decoder = slip::Decoder::new(slip::MAX_MTU);
        let mut datagrams = Vec::new();
        for &byte in self.output.iter() {
            match decoder.process_byte(byte) {
                slip::Status::Done => {
                    datagrams.push(decoder.frame().to_vec());
                    decoder.reset();
                },
                slip::Status::Reset => decoder.reset(),
                slip::Status::Ok | slip::Status::Skip => (),
            }
        }
        self.output.clear();
        datagrams
    }

    /// Make every following send fail, or work again.
    pub fn set_broken(&mut self, broken: bool) {
        self.broken = broken;
    }
}

impl Device for External {
    fn recv(&mut self) -> Option<u8> {
        self.input.pop_front()
    }

    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        if self.broken {
            return Err(Error::Device);
        }

        self.output.extend_from_slice(bytes);
        Ok(())
    }
}
