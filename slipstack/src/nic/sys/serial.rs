use std::ffi::CString;
use std::mem;
use std::os::unix::io::{AsRawFd, RawFd};

use libc;
use super::{Errno, FdResult, IoLenResult, LibcResult};

use crate::layer::{Error, Result};
use crate::nic::Device;

const READ_CHUNK: usize = 256;

/// A tty in raw mode, usable as the serial device of an interface.
///
/// The descriptor is non-blocking. Reads are done in chunks and handed out byte by byte, writes
/// wait for the line to become writable until the whole frame has been written.
#[derive(Debug)]
pub struct SerialPort {
    fd: libc::c_int,
    rx: [u8; READ_CHUNK],
    rx_pos: usize,
    rx_len: usize,
    last_err: Option<Errno>,
}

impl SerialPort {
    /// Open a tty such as `/dev/ttyUSB0` and switch it to raw mode.
    pub fn open(path: &str) -> std::result::Result<SerialPort, Errno> {
        let path = CString::new(path)
            .map_err(|_| Errno(libc::EINVAL))?;
        let fd = unsafe {
            libc::open(
                path.as_ptr(),
                libc::O_RDWR | libc::O_NONBLOCK | libc::O_NOCTTY)
        };

        FdResult(fd).errno()?;

        let port = SerialPort {
            fd,
            rx: [0; READ_CHUNK],
            rx_pos: 0,
            rx_len: 0,
            last_err: None,
        };
        port.make_raw()?;
        Ok(port)
    }

    /// Set input and output speed of the line.
    ///
    /// Only the standard rates from 9600 to 115200 baud are supported.
    pub fn set_baud_rate(&mut self, baud: u32) -> std::result::Result<(), Errno> {
        let speed = match baud {
            9600 => libc::B9600,
            19200 => libc::B19200,
            38400 => libc::B38400,
            57600 => libc::B57600,
            115200 => libc::B115200,
            _ => return Err(Errno(libc::EINVAL)),
        };

        let mut termios = self.attributes()?;
        unsafe {
            FdResult(libc::cfsetispeed(&mut termios, speed)).errno()?;
            FdResult(libc::cfsetospeed(&mut termios, speed)).errno()?;
        }
        self.set_attributes(&termios)
    }

    /// Take the last io error returned by the OS.
    pub fn last_err(&mut self) -> Option<Errno> {
        self.last_err.take()
    }

    fn make_raw(&self) -> std::result::Result<(), Errno> {
        let mut termios = self.attributes()?;
        unsafe { libc::cfmakeraw(&mut termios) };
        termios.c_cflag |= libc::CLOCAL | libc::CREAD;
        self.set_attributes(&termios)
    }

    fn attributes(&self) -> std::result::Result<libc::termios, Errno> {
        unsafe {
            let mut termios = mem::MaybeUninit::<libc::termios>::uninit();
            FdResult(libc::tcgetattr(self.fd, termios.as_mut_ptr())).errno()?;
            Ok(termios.assume_init())
        }
    }

    fn set_attributes(&self, termios: &libc::termios) -> std::result::Result<(), Errno> {
        let res = unsafe { libc::tcsetattr(self.fd, libc::TCSANOW, termios) };
        FdResult(res).errno()
    }

    fn fill(&mut self) -> std::result::Result<usize, Errno> {
        let len = unsafe {
            libc::read(
                self.fd,
                self.rx.as_mut_ptr() as *mut libc::c_void,
                self.rx.len())
        };
        IoLenResult(len).errno()?;
        self.rx_pos = 0;
        self.rx_len = len as usize;
        Ok(self.rx_len)
    }

    fn write(&mut self, bytes: &[u8]) -> std::result::Result<usize, Errno> {
        let len = unsafe {
            libc::write(
                self.fd,
                bytes.as_ptr() as *const libc::c_void,
                bytes.len())
        };
        IoLenResult(len).errno()?;
        Ok(len as usize)
    }

    fn wait_writable(&self) -> std::result::Result<(), Errno> {
        let mut pollfd = libc::pollfd {
            fd: self.fd,
            events: libc::POLLOUT,
            revents: 0,
        };
        let res = unsafe { libc::poll(&mut pollfd, 1, -1) };
        FdResult(res).errno()
    }

    fn store_err(&mut self, err: Errno) -> Error {
        net_debug!("serial line error {}", err.0);
        self.last_err = Some(err);
        Error::Device
    }
}

impl AsRawFd for SerialPort {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl Drop for SerialPort {
    fn drop(&mut self) {
        unsafe { libc::close(self.fd); }
    }
}

impl Device for SerialPort {
    fn recv(&mut self) -> Option<u8> {
        if self.rx_pos == self.rx_len {
            match self.fill() {
                Ok(0) => return None,
                Ok(_) => (),
                Err(ref err) if err.would_block() || err.interrupted() => return None,
                Err(err) => {
                    self.store_err(err);
                    return None;
                },
            }
        }

        let byte = self.rx[self.rx_pos];
        self.rx_pos += 1;
        Some(byte)
    }

    fn send(&mut self, mut bytes: &[u8]) -> Result<()> {
        while !bytes.is_empty() {
            match self.write(bytes) {
                Ok(len) => bytes = &bytes[len..],
                Err(ref err) if err.interrupted() => (),
                Err(ref err) if err.would_block() => {
                    if let Err(err) = self.wait_writable() {
                        if !err.interrupted() {
                            return Err(self.store_err(err));
                        }
                    }
                },
                Err(err) => return Err(self.store_err(err)),
            }
        }
        Ok(())
    }
}
