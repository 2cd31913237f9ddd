// Copyright 2021 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! TCP session wrapper. A `Session` is one accepted connection: it is
//! pushed onto the handoff queue by the acceptor and then owned by exactly
//! one worker for its whole lifetime.
//!
//! Requests are read with a single `recv` into a fixed buffer one byte
//! larger than the maximum request, so an oversized request is detected
//! without any buffer growth.

use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;

use crate::protocol::MAX_REQUEST_SIZE;

/// Bound on any single socket read or write.
pub const IO_TIMEOUT: Duration = Duration::from_secs(1);

pub struct Session {
    stream: TcpStream,
    addr: SocketAddr,
    buffer: Box<[u8; MAX_REQUEST_SIZE + 1]>,
}

impl Session {
    /// Wrap an accepted stream, applying the per-connection receive and
    /// send timeouts.
    pub fn new(stream: TcpStream, addr: SocketAddr) -> Result<Self, std::io::Error> {
        stream.set_read_timeout(Some(IO_TIMEOUT))?;
        stream.set_write_timeout(Some(IO_TIMEOUT))?;
        Ok(Self {
            stream,
            addr,
            buffer: Box::new([0; MAX_REQUEST_SIZE + 1]),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Issue one `recv` for up to `MAX_REQUEST_SIZE + 1` bytes and return
    /// the number read. A result larger than `MAX_REQUEST_SIZE` means the
    /// request is oversized; zero means the peer closed the connection. A
    /// timeout surfaces as `WouldBlock`/`TimedOut`.
    pub fn receive(&mut self) -> Result<usize, std::io::Error> {
        self.stream.read(&mut self.buffer[..])
    }

    /// The bytes of the last `receive`.
    pub fn payload(&self, len: usize) -> &[u8] {
        &self.buffer[..len]
    }

    /// Discard whatever else the client has to send. Used before
    /// rejecting an oversized request so the error message is not lost in
    /// the client's backlog; stops on close, timeout or error.
    pub fn drain(&mut self) {
        while let Ok(bytes) = self.stream.read(&mut self.buffer[..]) {
            if bytes == 0 {
                break;
            }
        }
    }

    /// Write a full response. Failures are reported but the caller treats
    /// them as soft: the session closes either way.
    pub fn send(&mut self, response: &[u8]) -> Result<(), std::io::Error> {
        self.stream.write_all(response)
    }

    /// Shut the connection down. Dropping the session closes the
    /// descriptor too; the explicit shutdown makes the close visible to
    /// the peer immediately.
    pub fn close(self) {
        trace!("closing session: {}", self.addr);
        let _ = self.stream.shutdown(Shutdown::Both);
    }

    /// True when a read error indicates the 1-second receive timeout
    /// rather than a broken connection.
    pub fn is_timeout(error: &std::io::Error) -> bool {
        matches!(error.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
    }
}
