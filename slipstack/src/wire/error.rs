use core::fmt;

/// The error type for parsing packets off the serial line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Error {
    /// The buffer was shorter than the header or the lengths it claims.
    Truncated,

    /// The packet failed its checksum.
    WrongChecksum,

    /// The packet carries an identifier we have no handler for.
    ///
    /// For example an IP datagram of an unknown protocol or an ICMP message that is not an echo.
    Unrecognized,

    /// The packet was recognized but contradicts itself.
    ///
    /// Examples: an IP header length below five words, a TCP data offset pointing past the end
    /// of the segment, a UDP length field smaller than its header.
    Malformed,

    /// The packet uses a feature the stack does not implement.
    ///
    /// This covers IP versions other than 4 and fragmented datagrams.
    Unsupported,
}

/// The result type for parsing.
pub type Result<T> = core::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Truncated     => write!(f, "truncated packet"),
            Error::WrongChecksum => write!(f, "checksum error"),
            Error::Unrecognized  => write!(f, "unrecognized packet"),
            Error::Malformed     => write!(f, "malformed packet"),
            Error::Unsupported   => write!(f, "unsupported packet"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}
