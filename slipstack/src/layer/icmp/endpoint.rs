use crate::layer::{ip, Result};
use crate::wire::{Checksum, Icmpv4Repr, IpProtocol, Ipv4Address, icmpv4_packet};

/// The icmp endpoint state.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint {
    /// Number of echo requests answered.
    answered: usize,

    /// The most recent echo reply.
    reply: Option<Reply>,
}

/// An echo reply received in answer to a ping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Reply {
    /// The host that answered.
    pub src_addr: Ipv4Address,
    /// The identifier of the request.
    pub ident: u16,
    /// The sequence number of the request.
    pub seq_no: u16,
    /// Length of the echoed data.
    pub len: usize,
}

impl Endpoint {
    /// Create an endpoint that has not seen any message.
    pub fn new() -> Self {
        Endpoint::default()
    }

    /// Number of echo requests that were answered.
    pub fn answered(&self) -> usize {
        self.answered
    }

    /// Take the last received echo reply.
    pub fn take_reply(&mut self) -> Option<Reply> {
        self.reply.take()
    }

    /// Process a message handed up by the ip layer.
    pub fn receive(&mut self, packet: ip::In) {
        let ip::In { mut handle, repr: ip_repr, packet } = packet;

        let message = icmpv4_packet::new_unchecked(packet.payload_slice());
        let repr = match Icmpv4Repr::parse(message, Checksum::Manual) {
            Ok(repr) => repr,
            Err(err) => {
                net_trace!("icmp: dropping message from {}: {}", ip_repr.src_addr, err);
                return;
            },
        };
        net_trace!("icmp: received {}", repr);

        match repr {
            Icmpv4Repr::EchoRequest { .. } => {
                let answer = repr.echo_reply().map(|reply| {
                    send(&mut handle, ip_repr.src_addr, reply, message.payload_slice())
                });

                match answer {
                    Some(Ok(())) => self.answered += 1,
                    Some(Err(err)) => net_debug!("icmp: failed to answer echo request: {}", err),
                    None => (),
                }
            },
            Icmpv4Repr::EchoReply { ident, seq_no, payload } => {
                self.reply = Some(Reply {
                    src_addr: ip_repr.src_addr,
                    ident,
                    seq_no,
                    len: payload,
                });
            },
        }
    }

    /// Send an echo request.
    ///
    /// Forgets any reply to an earlier request.
    pub fn ping(
        &mut self,
        mut ip: ip::Handle,
        dst_addr: Ipv4Address,
        ident: u16,
        seq_no: u16,
        data: &[u8],
    ) -> Result<()> {
        let repr = Icmpv4Repr::EchoRequest {
            ident,
            seq_no,
            payload: data.len(),
        };
        self.reply = None;
        send(&mut ip, dst_addr, repr, data)
    }
}

fn send(ip: &mut ip::Handle, dst_addr: Ipv4Address, repr: Icmpv4Repr, data: &[u8]) -> Result<()> {
    let mut out = ip.prepare(ip::Init {
        dst_addr,
        protocol: IpProtocol::Icmp,
        payload: repr.buffer_len(),
    })?;

    let message = icmpv4_packet::new_unchecked_mut(out.payload_mut_slice());
    message.payload_mut_slice().copy_from_slice(data);
    repr.emit(message, Checksum::Manual);

    net_trace!("icmp: sending {}", repr);
    out.send()
}
