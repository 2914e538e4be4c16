//! Receiving and sending Icmp messages.
//!
//! Only the echo messages of Icmpv4 are supported. Echo requests are answered immediately from
//! the receive path with a reply carrying the same identifier, sequence number and data. Echo
//! replies to our own requests are remembered for the user to inspect. All other message types
//! are silently discarded.
mod endpoint;

pub use endpoint::{
    Endpoint,
    Reply,
};
