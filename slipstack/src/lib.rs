//! A small IPv4 and TCP stack for hosts that talk over a serial line.
//!
//! ## Table of contents
//!
//! 1. [Design](#design)
//! 2. [The wire module](wire/index.html)
//! 3. [The layers](layer/index.html)
//!    1. [SLIP framing](layer/slip/index.html)
//!    1. [IPv4](layer/ip/index.html)
//!    1. [TCP](layer/tcp/index.html)
//!    1. [UDP](layer/udp/index.html) and [ICMP](layer/icmp/index.html)
//! 4. [Serial devices](nic/index.html)
//! 5. [Driving everything](iface/index.html)
//!
//! ## Design
//!
//! Bytes arrive one at a time from a [`nic::Device`]. The SLIP decoder collects them until a frame
//! delimiter, the IP layer validates the datagram and hands the payload to TCP, UDP or ICMP. TCP
//! keeps a fixed table of sockets and calls into application code through the [`tcp::Service`]
//! trait. Those callbacks may answer immediately, which sends a datagram back through IP and the
//! SLIP encoder onto the device before the next input byte is looked at.
//!
//! Nothing in the library allocates. All tables (sockets, listeners, port bindings) are arrays of
//! fixed size that live inside the [`Interface`] value. Running out of sockets is resolved by
//! evicting the connection that has been idle the longest, never by failing.
//!
//! Processing is single threaded and runs to completion. The caller decides how often to
//! [`poll`], each call being one processing cycle that also ages idle connections by one tick.
//!
//! [`nic::Device`]: nic/trait.Device.html
//! [`tcp::Service`]: layer/tcp/trait.Service.html
//! [`Interface`]: iface/struct.Interface.html
//! [`poll`]: iface/struct.Interface.html#method.poll
#![warn(missing_docs)]
#![warn(unreachable_pub)]

// tests should be able to use `std`
#![cfg_attr(all(
    not(feature = "std"),
    not(test)),
no_std)]

#[macro_use] mod macros;
pub mod iface;
pub mod layer;
pub mod nic;
pub mod wire;

pub use iface::{Config, Interface};
