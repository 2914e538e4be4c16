//! Encapsulates the serial line.
//!
//! Also permits software emulation of one as well, of course. The in-memory [`External`] device
//! is what the tests of this crate are written against.
//!
//! [`External`]: external/struct.External.html
#[cfg(any(feature = "std", test))]
pub mod external;

#[cfg(feature = "sys")]
#[path="sys/mod.rs"]
mod sys_internal;

use crate::layer::Result;

#[cfg(feature = "sys")]
pub use self::sys_internal::exports as sys;

/// A byte oriented, full duplex transport.
///
/// Receiving never blocks: a device without pending input returns `None` and the interface
/// returns from its poll. Sending hands over a complete encoded frame which the device should
/// write out in full before returning.
pub trait Device {
    /// Take the next received byte, if any.
    fn recv(&mut self) -> Option<u8>;

    /// Write all of `bytes` to the line.
    fn send(&mut self, bytes: &[u8]) -> Result<()>;
}

impl<D: Device + ?Sized> Device for &'_ mut D {
    fn recv(&mut self) -> Option<u8> {
        (**self).recv()
    }

    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).send(bytes)
    }
}
