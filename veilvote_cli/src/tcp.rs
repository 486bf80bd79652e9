//! Length-prefixed TCP framing behind the core's `Channel` seam.

use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use veilvote::{Channel, Error};

pub struct TcpChannel {
    stream: TcpStream,
}

impl TcpChannel {
    pub fn new(stream: TcpStream) -> Self {
        TcpChannel { stream }
    }

    pub fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self, Error> {
        Ok(TcpChannel {
            stream: TcpStream::connect(addr)?,
        })
    }
}

impl Channel for TcpChannel {
    fn send(&mut self, frame: &[u8]) -> Result<(), Error> {
        let len = u32::try_from(frame.len()).map_err(|_| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "frame too large",
            ))
        })?;
        self.stream.write_all(&len.to_be_bytes())?;
        self.stream.write_all(frame)?;
        self.stream.flush()?;
        Ok(())
    }

    fn read(&mut self) -> Result<Vec<u8>, Error> {
        let mut len = [0u8; 4];
        self.stream.read_exact(&mut len)?;
        let mut frame = vec![0u8; u32::from_be_bytes(len) as usize];
        self.stream.read_exact(&mut frame)?;
        Ok(frame)
    }

    fn close(&mut self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}
