use super::{END, ESC, ESC_END, ESC_ESC, MAX_MTU};

/// The outcome of feeding one byte to the decoder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Status {
    /// The byte was consumed, the frame is not complete yet.
    Ok,

    /// A delimiter before any data, ignored.
    Skip,

    /// A frame is complete and available through [`Decoder::frame`].
    ///
    /// [`Decoder::frame`]: struct.Decoder.html#method.frame
    Done,

    /// The frame outgrew the buffer and was discarded.
    Reset,
}

/// Reassembles frames from single bytes.
///
/// After `Done` or `Reset` the caller must call [`reset`] before feeding the next byte, the
/// decoder keeps the completed frame around until then.
///
/// [`reset`]: #method.reset
pub struct Decoder {
    buffer: [u8; MAX_MTU],
    capacity: usize,
    len: usize,
    escaped: bool,
}

impl Decoder {
    /// Create a decoder accepting frames of at most `mtu` bytes.
    ///
    /// The capacity is capped at [`MAX_MTU`].
    ///
    /// [`MAX_MTU`]: constant.MAX_MTU.html
    pub fn new(mtu: usize) -> Self {
        Decoder {
            buffer: [0; MAX_MTU],
            capacity: mtu.min(MAX_MTU),
            len: 0,
            escaped: false,
        }
    }

    /// Feed a single byte from the line.
    pub fn process_byte(&mut self, byte: u8) -> Status {
        if self.escaped {
            self.escaped = false;
            let byte = match byte {
                ESC_END => END,
                ESC_ESC => ESC,
                // Protocol violation, keep the byte as is.
                other => other,
            };
            return self.store(byte);
        }

        match byte {
            END if self.len == 0 => Status::Skip,
            END => Status::Done,
            ESC => {
                self.escaped = true;
                Status::Ok
            },
            other => self.store(other),
        }
    }

    /// The bytes accumulated so far, the complete datagram after `Done`.
    pub fn frame(&self) -> &[u8] {
        &self.buffer[..self.len]
    }

    /// The maximum number of bytes in a frame.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Discard the current frame and prepare for the next.
    pub fn reset(&mut self) {
        self.len = 0;
        self.escaped = false;
    }

    fn store(&mut self, byte: u8) -> Status {
        if self.len == self.capacity {
            return Status::Reset;
        }

        self.buffer[self.len] = byte;
        self.len += 1;
        Status::Ok
    }
}
