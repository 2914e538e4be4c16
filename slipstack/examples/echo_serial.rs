//! An echo host on a serial line.
//!
//! Opens a tty, speaks SLIP on it and echoes everything sent to TCP or UDP port 7. Pings are
//! answered as well. Attach the other end with `slattach` and try `nc 192.168.1.51 7`.
use std::cell::Cell;
use std::io;
use std::net;
use std::thread;
use std::time::Duration;
use structopt::StructOpt;

use slipstack::{Config as IfaceConfig, Interface};
use slipstack::layer::{tcp, udp, FnHandler};
use slipstack::nic::sys::SerialPort;

/// Echoes every segment back on the same connection.
struct Echo {
    connections: Cell<usize>,
}

impl tcp::Service for Echo {
    fn open(&self, conn: &mut tcp::Connection) {
        let count = self.connections.get() + 1;
        self.connections.set(count);
        eprintln!("{}: connection #{} from {}:{}",
            conn.handle(), count, conn.remote_addr(), conn.remote_port());
    }

    fn recv(&self, conn: &mut tcp::Connection, data: &[u8]) {
        if let Err(err) = conn.send(data) {
            eprintln!("{}: echo failed: {}", conn.handle(), err);
        }
    }

    fn close(&self, handle: tcp::SocketHandle) {
        eprintln!("{}: closed", handle);
    }
}

fn main() -> io::Result<()> {
    let Config {
        device,
        address,
        mtu,
        baud,
        port,
        idle_timeout,
    } = Config::from_args();

    let mut serial = SerialPort::open(&device)?;
    serial.set_baud_rate(baud)?;

    let config = IfaceConfig {
        address: address.into(),
        mtu,
        seed: rand_seed(),
        idle_timeout,
        ..IfaceConfig::default()
    };

    let echo = Echo { connections: Cell::new(0) };
    let udp_echo = FnHandler(|mut packet: udp::Packet| {
        let payload = packet.payload;
        let _ = packet.reply(payload);
    });

    let mut iface = Interface::new(serial, config)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;

    iface.listen(port, &echo)
        .map_err(|err| io::Error::new(io::ErrorKind::AddrInUse, err))?;
    iface.bind(port, &udp_echo)
        .map_err(|err| io::Error::new(io::ErrorKind::AddrInUse, err))?;
    eprintln!("echo on {}:{} over {}", address, port, device);

    loop {
        if iface.poll() == 0 {
            thread::sleep(Duration::from_millis(10));
        }

        if let Some(errno) = iface.device_mut().last_err() {
            return Err(errno.into());
        }
    }
}

/// Differs between runs, which is all initial sequence numbers need.
fn rand_seed() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos() as u64)
        .unwrap_or(0)
}

#[derive(StructOpt)]
struct Config {
    /// The tty of the serial line.
    device: String,

    /// Our address on the line.
    #[structopt(short = "a", long = "address", default_value = "192.168.1.51")]
    address: net::Ipv4Addr,

    #[structopt(long = "mtu", default_value = "576")]
    mtu: usize,

    #[structopt(short = "b", long = "baud", default_value = "115200")]
    baud: u32,

    /// The port served for TCP and UDP.
    #[structopt(short = "p", long = "port", default_value = "7")]
    port: u16,

    /// Polls without traffic before a connection is dropped. The loop polls about every 10ms.
    #[structopt(long = "idle-timeout", default_value = "30000")]
    idle_timeout: u32,
}
